//! Reading and writing one graph (a node hash plus a link list).

use std::collections::HashSet;

use ontograph_core::{OntologyData, Result};
use tracing::warn;

use crate::backend::Connected;
use crate::record::{link_entries, node_entries, parse_links, parse_nodes};

/// How a write treats the links already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkWrite {
    /// Delete the stored list, then write the incoming links.
    Replace,
    /// Append to the stored list.
    Append,
}

pub(crate) struct GraphKeys {
    pub nodes: String,
    pub links: String,
}

/// Upsert nodes by id and write links. Each collection is skipped when its
/// input is empty. Links whose endpoints are neither incoming nor stored
/// node ids are dropped; in `Replace` mode the stored list is still replaced
/// by whatever survives. Returns whether anything was written.
pub(crate) async fn write_graph(
    kv: &Connected<'_>,
    keys: &GraphKeys,
    data: &OntologyData,
    mode: LinkWrite,
) -> Result<bool> {
    let mut wrote = false;

    if !data.nodes.is_empty() {
        kv.hset(&keys.nodes, &node_entries(&data.nodes)).await?;
        wrote = true;
    }

    if !data.links.is_empty() {
        let mut known: HashSet<String> = data.nodes.iter().map(|n| n.id.clone()).collect();
        if data
            .links
            .iter()
            .any(|l| !known.contains(&l.source) || !known.contains(&l.target))
        {
            known.extend(kv.hgetall(&keys.nodes).await?.into_iter().map(|(id, _)| id));
        }

        let links: Vec<_> = data
            .links
            .iter()
            .filter(|link| {
                let ok = known.contains(&link.source) && known.contains(&link.target);
                if !ok {
                    warn!(
                        "Skipping invalid link {} -> {} at {}: endpoint not found",
                        link.source, link.target, keys.links
                    );
                }
                ok
            })
            .cloned()
            .collect();

        // A replace with incoming links clears the stored list even when
        // every incoming link was dropped.
        let entries = link_entries(&links);
        match mode {
            LinkWrite::Replace => {
                kv.replace_list(&keys.links, &entries).await?;
                wrote = true;
            }
            LinkWrite::Append if !entries.is_empty() => {
                kv.rpush(&keys.links, &entries).await?;
                wrote = true;
            }
            LinkWrite::Append => {}
        }
    }

    Ok(wrote)
}

pub(crate) async fn read_graph(kv: &Connected<'_>, keys: &GraphKeys) -> Result<OntologyData> {
    let nodes = parse_nodes(&keys.nodes, kv.hgetall(&keys.nodes).await?);
    let links = parse_links(&keys.links, kv.lrange(&keys.links, 0, -1).await?);
    Ok(OntologyData::new(nodes, links))
}
