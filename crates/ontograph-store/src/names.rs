//! Cross-session node-name index used for extraction reuse hints.
//!
//! Every node name written by a flat session is folded into one global set.
//! Callers pick the scope explicitly: the names of a single session, or the
//! global set.

use std::collections::HashSet;

use ontograph_core::keys::flat;
use ontograph_core::Result;
use tracing::debug;

use crate::backend::{Backend, Connected};
use crate::record::parse_nodes;

/// Which names a hint lookup should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameScope {
    /// Names of nodes stored for one session.
    Session(String),
    /// Every name written by any flat session.
    Global,
}

impl NameScope {
    /// Session scope when an id is given, global otherwise.
    pub fn for_session(session_id: Option<&str>) -> Self {
        match session_id {
            Some(id) if !id.is_empty() => Self::Session(id.to_string()),
            _ => Self::Global,
        }
    }
}

#[derive(Clone)]
pub struct NodeNameIndex {
    backend: Backend,
}

impl NodeNameIndex {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Known node names in `scope`. Session names keep storage order with
    /// repeats removed; global names are sorted. Empty when the backend is
    /// unavailable.
    pub async fn names(&self, scope: &NameScope) -> Vec<String> {
        let Ok(kv) = self.backend.connect().await else {
            return Vec::new();
        };
        let result = match scope {
            NameScope::Session(id) => session_names(&kv, id).await,
            NameScope::Global => global_names(&kv).await,
        };
        self.backend.recover("get existing node names", result, Vec::new())
    }

    pub(crate) async fn record(&self, kv: &Connected<'_>, names: &[String]) -> Result<()> {
        debug!("Recording {} node names", names.len());
        kv.sadd(flat::GLOBAL_NODES, names).await
    }
}

async fn session_names(kv: &Connected<'_>, session_id: &str) -> Result<Vec<String>> {
    let key = flat::session_nodes(session_id);
    let nodes = parse_nodes(&key, kv.hgetall(&key).await?);
    let mut seen = HashSet::new();
    Ok(nodes
        .into_iter()
        .map(|n| n.name)
        .filter(|name| seen.insert(name.clone()))
        .collect())
}

async fn global_names(kv: &Connected<'_>) -> Result<Vec<String>> {
    let mut names = kv.smembers(flat::GLOBAL_NODES).await?;
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_for_session() {
        assert_eq!(NameScope::for_session(Some("s1")), NameScope::Session("s1".into()));
        assert_eq!(NameScope::for_session(Some("")), NameScope::Global);
        assert_eq!(NameScope::for_session(None), NameScope::Global);
    }
}
