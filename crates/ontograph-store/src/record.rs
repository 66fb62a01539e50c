//! Conversion between stored records and typed values.
//!
//! Metadata lives in string-valued hashes. Nodes are stored as JSON values in
//! a hash keyed by node id; links as JSON values in a list. Malformed node and
//! link entries are skipped with a warning so one bad write cannot hide the
//! rest of a graph.

use std::collections::HashMap;

use ontograph_core::{
    GraphLink, GraphNode, LayerMeta, LayeredSessionConfig, SessionConfig, SessionStatus,
};
use tracing::warn;

/// Flattened hash fields, as returned by HGETALL.
pub type Fields = Vec<(String, String)>;

fn field_map(fields: Fields) -> HashMap<String, String> {
    fields.into_iter().collect()
}

fn int_field(map: &HashMap<String, String>, name: &str) -> i64 {
    map.get(name).and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

fn str_field(map: &mut HashMap<String, String>, name: &str) -> String {
    map.remove(name).unwrap_or_default()
}

/// Take the non-empty id field, or `None` if the record is absent or malformed.
fn id_field(map: &mut HashMap<String, String>, name: &str) -> Option<String> {
    map.remove(name).filter(|id| !id.is_empty())
}

pub fn session_fields(session: &SessionConfig) -> Fields {
    vec![
        ("sessionId".into(), session.session_id.clone()),
        ("topic".into(), session.topic.clone()),
        ("createdAt".into(), session.created_at.to_string()),
        ("updatedAt".into(), session.updated_at.to_string()),
        ("status".into(), session.status.as_str().into()),
    ]
}

pub fn parse_session(fields: Fields) -> Option<SessionConfig> {
    let mut map = field_map(fields);
    let session_id = id_field(&mut map, "sessionId")?;
    Some(SessionConfig {
        session_id,
        topic: str_field(&mut map, "topic"),
        created_at: int_field(&map, "createdAt"),
        updated_at: int_field(&map, "updatedAt"),
        status: SessionStatus::parse_lenient(&str_field(&mut map, "status")),
    })
}

pub fn layered_session_fields(session: &LayeredSessionConfig) -> Fields {
    vec![
        ("sessionId".into(), session.session_id.clone()),
        ("topic".into(), session.topic.clone()),
        ("createdAt".into(), session.created_at.to_string()),
        ("updatedAt".into(), session.updated_at.to_string()),
        ("status".into(), session.status.as_str().into()),
        ("layerCount".into(), session.layer_count.to_string()),
    ]
}

pub fn parse_layered_session(fields: Fields) -> Option<LayeredSessionConfig> {
    let mut map = field_map(fields);
    let session_id = id_field(&mut map, "sessionId")?;
    Some(LayeredSessionConfig {
        session_id,
        topic: str_field(&mut map, "topic"),
        created_at: int_field(&map, "createdAt"),
        updated_at: int_field(&map, "updatedAt"),
        status: SessionStatus::parse_lenient(&str_field(&mut map, "status")),
        layer_count: int_field(&map, "layerCount").max(0) as usize,
    })
}

pub fn layer_fields(meta: &LayerMeta) -> Fields {
    vec![
        ("layerId".into(), meta.layer_id.clone()),
        ("timestamp".into(), meta.timestamp.to_string()),
        ("agentType".into(), meta.agent_type.clone()),
        ("originalText".into(), meta.original_text.clone()),
    ]
}

pub fn parse_layer(fields: Fields) -> Option<LayerMeta> {
    let mut map = field_map(fields);
    let layer_id = id_field(&mut map, "layerId")?;
    Some(LayerMeta {
        layer_id,
        timestamp: int_field(&map, "timestamp"),
        agent_type: str_field(&mut map, "agentType"),
        original_text: str_field(&mut map, "originalText"),
    })
}

/// Hash entries `node id -> node JSON`. Later duplicates of an id win.
pub fn node_entries(nodes: &[GraphNode]) -> Fields {
    let mut entries: Fields = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Ok(json) = serde_json::to_string(node) else {
            continue;
        };
        match entries.iter_mut().find(|(id, _)| *id == node.id) {
            Some(slot) => slot.1 = json,
            None => entries.push((node.id.clone(), json)),
        }
    }
    entries
}

pub fn link_entries(links: &[GraphLink]) -> Vec<String> {
    links
        .iter()
        .filter_map(|link| serde_json::to_string(link).ok())
        .collect()
}

pub fn parse_nodes(key: &str, entries: Fields) -> Vec<GraphNode> {
    entries
        .into_iter()
        .filter_map(|(id, json)| match serde_json::from_str::<GraphNode>(&json) {
            Ok(node) => Some(node),
            Err(e) => {
                warn!("Skipping malformed node {} at {}: {}", id, key, e);
                None
            }
        })
        .collect()
}

pub fn parse_links(key: &str, entries: Vec<String>) -> Vec<GraphLink> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, json)| match serde_json::from_str::<GraphLink>(&json) {
            Ok(link) => Some(link),
            Err(e) => {
                warn!("Skipping malformed link #{} at {}: {}", i, key, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontograph_core::NodeType;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_session_requires_id() {
        assert!(parse_session(Vec::new()).is_none());
        assert!(parse_session(fields(&[("topic", "x"), ("sessionId", "")])).is_none());
        // A hash holding only an updatedAt refresh is not a session.
        assert!(parse_session(fields(&[("updatedAt", "5")])).is_none());
    }

    #[test]
    fn test_session_lenient_fields() {
        let session = parse_session(fields(&[
            ("sessionId", "s1"),
            ("createdAt", "abc"),
            ("updatedAt", "42"),
            ("status", "completed"),
        ]))
        .unwrap();
        assert_eq!(session.topic, "");
        assert_eq!(session.created_at, 0);
        assert_eq!(session.updated_at, 42);
        assert_eq!(session.status, SessionStatus::Completed);
    }

    #[test]
    fn test_layered_session_count() {
        let session = parse_layered_session(fields(&[("sessionId", "s1"), ("layerCount", "3")])).unwrap();
        assert_eq!(session.layer_count, 3);
        let session = parse_layered_session(fields(&[("sessionId", "s1"), ("layerCount", "-2")])).unwrap();
        assert_eq!(session.layer_count, 0);
    }

    #[test]
    fn test_layer_fields_parse_back() {
        let meta = LayerMeta {
            layer_id: "l1".into(),
            timestamp: 1700,
            agent_type: "BOB".into(),
            original_text: "hello: world".into(),
        };
        assert_eq!(parse_layer(layer_fields(&meta)), Some(meta));
    }

    #[test]
    fn test_node_entries_last_id_wins() {
        let nodes = vec![
            GraphNode::new("n1", "First", NodeType::Concept),
            GraphNode::new("n2", "Other", NodeType::Entity),
            GraphNode::new("n1", "Second", NodeType::Concept),
        ];
        let entries = node_entries(&nodes);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].1.contains("Second"));
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let nodes = parse_nodes(
            "k",
            fields(&[
                ("n1", r#"{"id":"n1","name":"A","type":"Concept"}"#),
                ("n2", "{not json"),
                ("n3", r#"{"id":"n3","name":"C","type":"Planet"}"#),
            ]),
        );
        assert_eq!(nodes.len(), 1);

        let links = parse_links(
            "k",
            vec![r#"{"source":"a","target":"b"}"#.to_string(), "[]".to_string()],
        );
        assert_eq!(links.len(), 1);
    }
}
