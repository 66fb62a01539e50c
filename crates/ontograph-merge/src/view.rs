//! Per-session transient merged views.
//!
//! A view starts from whatever the store held for the session and absorbs
//! each later batch through [`merge_into`]. Views live only in memory and
//! are never written back; raw batches are persisted by the store as received.

use dashmap::DashMap;
use ontograph_core::{now_millis, OntologyData};
use serde::Serialize;
use tracing::debug;

use crate::merge::{hydrate, merge_into, MergeOptions, MergeReport};

/// Merged graph for one session.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub graph: OntologyData,
    /// Number of batches folded since the view was seeded.
    pub batches: usize,
    pub updated_at: i64,
}

/// Concurrent registry of session views keyed by session id.
pub struct SessionViews {
    views: DashMap<String, SessionView>,
    opts: MergeOptions,
}

impl SessionViews {
    pub fn new(opts: MergeOptions) -> Self {
        Self {
            views: DashMap::new(),
            opts,
        }
    }

    pub fn options(&self) -> MergeOptions {
        self.opts
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.views.contains_key(session_id)
    }

    /// Install `stored` as the starting graph unless a view already exists.
    /// Returns whether the seed was used.
    pub fn seed(&self, session_id: &str, mut stored: OntologyData) -> bool {
        if self.views.contains_key(session_id) {
            return false;
        }
        hydrate(&mut stored);
        let mut inserted = false;
        let _ = self.views.entry(session_id.to_string()).or_insert_with(|| {
            inserted = true;
            SessionView {
                graph: stored,
                batches: 0,
                updated_at: now_millis(),
            }
        });
        if inserted {
            debug!("Seeded view for session {}", session_id);
        }
        inserted
    }

    /// Fold one batch into the session's view, creating an empty view first
    /// if none exists. Batches for one session are applied one at a time.
    pub fn fold(&self, session_id: &str, batch: &OntologyData) -> MergeReport {
        let mut view = self.views.entry(session_id.to_string()).or_default();
        let report = merge_into(&mut view.graph, batch, &self.opts);
        view.batches += 1;
        view.updated_at = now_millis();
        debug!(
            "Folded batch into session {}: +{} nodes, {} reused, +{} links, {} dropped",
            session_id,
            report.nodes_added,
            report.nodes_reused,
            report.links_added,
            report.links_dropped.len()
        );
        report
    }

    pub fn get(&self, session_id: &str) -> Option<SessionView> {
        self.views.get(session_id).map(|v| v.clone())
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.views.remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl Default for SessionViews {
    fn default() -> Self {
        Self::new(MergeOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontograph_core::{GraphLink, GraphNode, NodeType, DEFAULT_NODE_VAL};

    fn stored() -> OntologyData {
        OntologyData::new(
            vec![
                GraphNode::new("s1", "Trust", NodeType::Concept),
                GraphNode::new("s2", "Market", NodeType::Entity),
            ],
            vec![GraphLink::new("s1", "s2").with_label("underpins")],
        )
    }

    #[test]
    fn test_seed_hydrates_and_is_first_wins() {
        let views = SessionViews::default();
        assert!(views.seed("x", stored()));
        assert!(!views.seed("x", OntologyData::default()));

        let view = views.get("x").unwrap();
        assert_eq!(view.graph.nodes.len(), 2);
        assert_eq!(view.graph.nodes[0].val, Some(DEFAULT_NODE_VAL));
        assert_eq!(view.graph.links[0].value, Some(1.0));
    }

    #[test]
    fn test_fold_accumulates() {
        let views = SessionViews::default();
        views.seed("x", stored());

        let batch = OntologyData::new(
            vec![GraphNode::new("b1", "trust", NodeType::Concept)],
            vec![GraphLink::new("b1", "s2").with_label("again")],
        );
        let report = views.fold("x", &batch);
        assert_eq!(report.nodes_reused, 1);

        let view = views.get("x").unwrap();
        assert_eq!(view.batches, 1);
        assert_eq!(view.graph.nodes.len(), 2);
        assert_eq!(view.graph.links.len(), 1);
        assert_eq!(view.graph.nodes[0].val, Some(DEFAULT_NODE_VAL + 1.0));
    }

    #[test]
    fn test_fold_without_seed_starts_empty() {
        let views = SessionViews::default();
        views.fold("fresh", &stored());
        assert_eq!(views.get("fresh").unwrap().graph.nodes.len(), 2);
        assert!(views.remove("fresh"));
        assert!(views.is_empty());
    }
}
