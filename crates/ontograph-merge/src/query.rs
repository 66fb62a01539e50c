//! Read-only graph queries backed by petgraph.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ontograph_core::{NodeType, OntologyData};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

/// Size summary of a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub node_count: usize,
    pub link_count: usize,
    /// Node count per type, keyed by type name.
    pub nodes_by_type: BTreeMap<String, usize>,
}

impl GraphStats {
    pub fn of(data: &OntologyData) -> Self {
        let mut nodes_by_type: BTreeMap<String, usize> = NodeType::all()
            .iter()
            .map(|t| (t.to_string(), 0))
            .collect();
        for node in &data.nodes {
            *nodes_by_type.entry(node.node_type.to_string()).or_default() += 1;
        }
        Self {
            node_count: data.nodes.len(),
            link_count: data.links.len(),
            nodes_by_type,
        }
    }
}

fn build(data: &OntologyData) -> (DiGraph<&str, ()>, HashMap<&str, NodeIndex>) {
    let mut graph = DiGraph::with_capacity(data.nodes.len(), data.links.len());
    let mut index = HashMap::with_capacity(data.nodes.len());
    for node in &data.nodes {
        index
            .entry(node.id.as_str())
            .or_insert_with(|| graph.add_node(node.id.as_str()));
    }
    for link in &data.links {
        if let (Some(&s), Some(&t)) = (index.get(link.source.as_str()), index.get(link.target.as_str())) {
            graph.add_edge(s, t, ());
        }
    }
    (graph, index)
}

/// The node itself plus every node one link away in either direction.
/// Empty if `node_id` is not in the graph.
pub fn connected_node_ids(data: &OntologyData, node_id: &str) -> BTreeSet<String> {
    let (graph, index) = build(data);
    let Some(&start) = index.get(node_id) else {
        return BTreeSet::new();
    };

    let mut connected = BTreeSet::new();
    connected.insert(node_id.to_string());
    for dir in [Direction::Outgoing, Direction::Incoming] {
        for neighbor in graph.neighbors_directed(start, dir) {
            connected.insert(graph[neighbor].to_string());
        }
    }
    connected
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontograph_core::{GraphLink, GraphNode};

    fn sample() -> OntologyData {
        OntologyData::new(
            vec![
                GraphNode::new("a", "A", NodeType::Concept),
                GraphNode::new("b", "B", NodeType::Entity),
                GraphNode::new("c", "C", NodeType::Emotion),
                GraphNode::new("d", "D", NodeType::Concept),
            ],
            vec![GraphLink::new("a", "b"), GraphLink::new("c", "a"), GraphLink::new("b", "d")],
        )
    }

    #[test]
    fn test_connected_both_directions() {
        let ids = connected_node_ids(&sample(), "a");
        let expected: BTreeSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_connected_unknown_node() {
        assert!(connected_node_ids(&sample(), "zzz").is_empty());
    }

    #[test]
    fn test_stats() {
        let stats = GraphStats::of(&sample());
        assert_eq!(stats.node_count, 4);
        assert_eq!(stats.link_count, 3);
        assert_eq!(stats.nodes_by_type["Concept"], 2);
        assert_eq!(stats.nodes_by_type["Action"], 0);
    }
}
