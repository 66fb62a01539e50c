//! Graph merge engine.

use std::collections::{HashMap, HashSet};

use ontograph_core::{
    GraphLink, GraphNode, LinkIdentity, OntologyData, DEFAULT_LINK_VALUE, DEFAULT_NODE_VAL,
};
use serde::Serialize;
use tracing::{debug, warn};

/// Knobs for a merge.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub link_identity: LinkIdentity,
}

/// Why an incoming link was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DropReason {
    /// Source or target does not resolve to a node in the merged set.
    DanglingEndpoint,
    /// An equivalent link is already present.
    Duplicate,
}

/// Per-call bookkeeping returned alongside the merged graph.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    /// Batch-local node id -> id of the node it now lives under.
    pub id_remap: HashMap<String, String>,
    pub nodes_added: usize,
    pub nodes_reused: usize,
    pub links_added: usize,
    pub links_dropped: Vec<(GraphLink, DropReason)>,
}

/// Result of the pure [`merge`] function.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub graph: OntologyData,
    pub report: MergeReport,
}

/// Comparison form of a node name: all whitespace removed, case folded.
/// The display name is never rewritten.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Merge `incoming` into a copy of `accumulated`.
pub fn merge(accumulated: &OntologyData, incoming: &OntologyData, opts: &MergeOptions) -> MergeOutcome {
    let mut graph = accumulated.clone();
    let report = merge_into(&mut graph, incoming, opts);
    MergeOutcome { graph, report }
}

/// Fold `incoming` into `graph` in place.
///
/// An incoming node whose normalized name matches a node already in `graph`
/// bumps that node's `val` by one and is remapped onto it; otherwise it is
/// appended with the default weight. Links are rewired through the remap,
/// then admitted only if both endpoints exist and no equivalent link does.
/// Admitted links always carry weight 1.
pub fn merge_into(graph: &mut OntologyData, incoming: &OntologyData, opts: &MergeOptions) -> MergeReport {
    let mut report = MergeReport::default();

    let mut by_name: HashMap<String, usize> = HashMap::with_capacity(graph.nodes.len());
    let mut ids: HashSet<String> = HashSet::with_capacity(graph.nodes.len());
    for (idx, node) in graph.nodes.iter().enumerate() {
        by_name.entry(normalize_name(&node.name)).or_insert(idx);
        ids.insert(node.id.clone());
    }

    for node in &incoming.nodes {
        let key = normalize_name(&node.name);
        if let Some(&idx) = by_name.get(&key) {
            let existing = &mut graph.nodes[idx];
            existing.val = Some(existing.weight() + 1.0);
            report.id_remap.insert(node.id.clone(), existing.id.clone());
            report.nodes_reused += 1;
            continue;
        }

        let id = unique_id(&node.id, &ids);
        if id != node.id {
            debug!("Node id {} already taken by another name; using {}", node.id, id);
        }

        let added = GraphNode {
            id: id.clone(),
            val: Some(DEFAULT_NODE_VAL),
            color: Some(node.display_color().to_string()),
            ..node.clone()
        };
        by_name.insert(key, graph.nodes.len());
        ids.insert(id.clone());
        graph.nodes.push(added);
        report.id_remap.insert(node.id.clone(), id);
        report.nodes_added += 1;
    }

    let mut present: HashSet<LinkKey> = graph
        .links
        .iter()
        .map(|l| LinkKey::of(&l.source, &l.target, l.label.as_deref(), opts.link_identity))
        .collect();

    for link in &incoming.links {
        let source = resolve(&report.id_remap, &link.source);
        let target = resolve(&report.id_remap, &link.target);

        if !ids.contains(&source) || !ids.contains(&target) {
            warn!("Skipping invalid link: {} -> {}", source, target);
            report.links_dropped.push((link.clone(), DropReason::DanglingEndpoint));
            continue;
        }

        let key = LinkKey::of(&source, &target, link.label.as_deref(), opts.link_identity);
        if !present.insert(key) {
            report.links_dropped.push((link.clone(), DropReason::Duplicate));
            continue;
        }

        graph.links.push(GraphLink {
            source,
            target,
            value: Some(DEFAULT_LINK_VALUE),
            ..link.clone()
        });
        report.links_added += 1;
    }

    report
}

/// Apply display defaults to stored data: `val` 5, `color` from the node
/// type, link `value` 1. Present values are kept.
pub fn hydrate(data: &mut OntologyData) {
    for node in &mut data.nodes {
        if node.val.is_none() {
            node.val = Some(DEFAULT_NODE_VAL);
        }
        if node.color.is_none() {
            node.color = Some(node.node_type.color().to_string());
        }
    }
    for link in &mut data.links {
        if link.value.is_none() {
            link.value = Some(DEFAULT_LINK_VALUE);
        }
    }
}

fn resolve(remap: &HashMap<String, String>, id: &str) -> String {
    remap.get(id).cloned().unwrap_or_else(|| id.to_string())
}

/// First of `id`, `id#2`, `id#3`, ... not already in `taken`.
fn unique_id(id: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(id) {
        return id.to_string();
    }
    (2..)
        .map(|n| format!("{}#{}", id, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| id.to_string())
}

#[derive(Hash, PartialEq, Eq)]
struct LinkKey {
    source: String,
    target: String,
    label: Option<String>,
}

impl LinkKey {
    fn of(source: &str, target: &str, label: Option<&str>, identity: LinkIdentity) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            label: match identity {
                LinkIdentity::Endpoints => None,
                LinkIdentity::EndpointsAndLabel => label.map(str::to_string),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontograph_core::NodeType;

    fn node(id: &str, name: &str) -> GraphNode {
        GraphNode::new(id, name, NodeType::Concept)
    }

    fn link(source: &str, target: &str, label: &str) -> GraphLink {
        GraphLink::new(source, target).with_label(label)
    }

    fn base() -> OntologyData {
        let mut graph = OntologyData::new(vec![node("existing-5", "Trust"), node("existing-6", "Fear")], vec![]);
        hydrate(&mut graph);
        graph
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name(" Trust "), "trust");
        assert_eq!(normalize_name("TRUST"), "trust");
        assert_eq!(normalize_name("Social  Media"), "socialmedia");
    }

    #[test]
    fn test_name_variants_dedup_and_bump_weight() {
        let mut graph = base();
        let opts = MergeOptions::default();

        for (i, variant) in [" trust ", "TRUST", "Trust"].iter().enumerate() {
            let batch = OntologyData::new(vec![node(&format!("n{}", i), variant)], vec![]);
            let report = merge_into(&mut graph, &batch, &opts);
            assert_eq!(report.nodes_reused, 1);
            assert_eq!(report.nodes_added, 0);
        }

        let trust: Vec<&GraphNode> = graph.nodes.iter().filter(|n| n.name == "Trust").collect();
        assert_eq!(trust.len(), 1);
        assert_eq!(trust[0].val, Some(DEFAULT_NODE_VAL + 3.0));
        assert_eq!(graph.nodes.len(), 2);
    }

    #[test]
    fn test_display_name_preserved() {
        let mut graph = base();
        let batch = OntologyData::new(vec![node("n1", "  trust")], vec![]);
        merge_into(&mut graph, &batch, &MergeOptions::default());
        assert!(graph.nodes.iter().any(|n| n.name == "Trust"));
        assert!(!graph.nodes.iter().any(|n| n.name == "  trust"));
    }

    #[test]
    fn test_link_endpoint_remap() {
        let batch = OntologyData::new(
            vec![node("n1", "trust"), node("n2", "Hope")],
            vec![link("n1", "n2", "enables")],
        );
        let outcome = merge(&base(), &batch, &MergeOptions::default());

        assert_eq!(outcome.report.id_remap["n1"], "existing-5");
        assert_eq!(outcome.report.id_remap["n2"], "n2");
        let added = outcome.graph.links.last().unwrap();
        assert_eq!(added.source, "existing-5");
        assert_eq!(added.target, "n2");
        assert_eq!(added.value, Some(DEFAULT_LINK_VALUE));
    }

    #[test]
    fn test_dangling_link_dropped_without_aborting() {
        let batch = OntologyData::new(
            vec![node("n1", "Hope")],
            vec![link("n1", "ghost", "haunts"), link("n1", "existing-6", "calms")],
        );
        let outcome = merge(&base(), &batch, &MergeOptions::default());

        assert_eq!(outcome.graph.links.len(), 1);
        assert_eq!(outcome.report.links_added, 1);
        assert_eq!(outcome.report.links_dropped.len(), 1);
        assert_eq!(outcome.report.links_dropped[0].1, DropReason::DanglingEndpoint);
    }

    #[test]
    fn test_duplicate_pair_suppressed_regardless_of_label() {
        let mut graph = base();
        let opts = MergeOptions::default();
        merge_into(
            &mut graph,
            &OntologyData::new(vec![], vec![link("existing-5", "existing-6", "causes")]),
            &opts,
        );
        let report = merge_into(
            &mut graph,
            &OntologyData::new(vec![], vec![link("existing-5", "existing-6", "prevents")]),
            &opts,
        );

        assert_eq!(graph.links.len(), 1);
        assert_eq!(graph.links[0].label.as_deref(), Some("causes"));
        assert_eq!(report.links_dropped[0].1, DropReason::Duplicate);
    }

    #[test]
    fn test_duplicate_check_is_direction_sensitive() {
        let mut graph = base();
        let batch = OntologyData::new(
            vec![],
            vec![link("existing-5", "existing-6", "a"), link("existing-6", "existing-5", "b")],
        );
        merge_into(&mut graph, &batch, &MergeOptions::default());
        assert_eq!(graph.links.len(), 2);
    }

    #[test]
    fn test_label_identity_keeps_distinct_relationships() {
        let mut graph = base();
        let opts = MergeOptions {
            link_identity: LinkIdentity::EndpointsAndLabel,
        };
        let batch = OntologyData::new(
            vec![],
            vec![
                link("existing-5", "existing-6", "causes"),
                link("existing-5", "existing-6", "prevents"),
                link("existing-5", "existing-6", "causes"),
            ],
        );
        merge_into(&mut graph, &batch, &opts);
        assert_eq!(graph.links.len(), 2);
    }

    #[test]
    fn test_repeated_link_weight_stays_one() {
        let mut graph = base();
        let batch = OntologyData::new(vec![], vec![link("existing-5", "existing-6", "causes")]);
        merge_into(&mut graph, &batch, &MergeOptions::default());
        merge_into(&mut graph, &batch, &MergeOptions::default());
        assert_eq!(graph.links.len(), 1);
        assert_eq!(graph.links[0].value, Some(DEFAULT_LINK_VALUE));
    }

    #[test]
    fn test_new_node_gets_defaults() {
        let mut incoming = node("n1", "Courage");
        incoming.node_type = NodeType::Action;
        incoming.val = Some(42.0);
        let outcome = merge(
            &OntologyData::default(),
            &OntologyData::new(vec![incoming], vec![]),
            &MergeOptions::default(),
        );
        let added = &outcome.graph.nodes[0];
        assert_eq!(added.val, Some(DEFAULT_NODE_VAL));
        assert_eq!(added.color.as_deref(), Some("#00ffaa"));
    }

    #[test]
    fn test_colliding_batch_id_is_renamed() {
        // The extractor reuses "existing-5" for an unrelated concept.
        let batch = OntologyData::new(
            vec![node("existing-5", "Justice")],
            vec![link("existing-5", "existing-6", "opposes")],
        );
        let outcome = merge(&base(), &batch, &MergeOptions::default());

        let ids: HashSet<&str> = outcome.graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids.len(), outcome.graph.nodes.len());
        assert_eq!(outcome.report.id_remap["existing-5"], "existing-5#2");
        assert_eq!(outcome.graph.links[0].source, "existing-5#2");
    }

    #[test]
    fn test_same_name_twice_in_one_batch() {
        let batch = OntologyData::new(vec![node("n1", "Hope"), node("n2", "hope")], vec![]);
        let outcome = merge(&OntologyData::default(), &batch, &MergeOptions::default());
        assert_eq!(outcome.graph.nodes.len(), 1);
        assert_eq!(outcome.graph.nodes[0].val, Some(DEFAULT_NODE_VAL + 1.0));
        assert_eq!(outcome.report.id_remap["n2"], "n1");
    }

    #[test]
    fn test_merge_leaves_input_untouched() {
        let accumulated = base();
        let batch = OntologyData::new(vec![node("n1", "trust")], vec![]);
        let _ = merge(&accumulated, &batch, &MergeOptions::default());
        assert_eq!(accumulated, base());
    }

    #[test]
    fn test_hydrate_keeps_present_values() {
        let mut data = OntologyData::new(
            vec![GraphNode {
                val: Some(9.0),
                ..node("a", "A")
            }],
            vec![GraphLink {
                value: Some(3.0),
                ..link("a", "a", "self")
            }],
        );
        hydrate(&mut data);
        assert_eq!(data.nodes[0].val, Some(9.0));
        assert_eq!(data.nodes[0].color.as_deref(), Some("#00d2ff"));
        assert_eq!(data.links[0].value, Some(3.0));
    }
}
