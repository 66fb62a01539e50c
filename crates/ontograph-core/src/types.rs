//! Ontology graph and session data types.
//!
//! Field names serialize in camelCase to match the JSON shape the
//! visualization frontend and the extraction service exchange.

use serde::{Deserialize, Serialize};

/// Default display weight of a node that has been mentioned once.
pub const DEFAULT_NODE_VAL: f64 = 5.0;

/// Weight assigned to every link admitted by a merge.
pub const DEFAULT_LINK_VALUE: f64 = 1.0;

/// Closed set of node kinds the extraction service may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Concept,
    Entity,
    Action,
    Emotion,
}

impl NodeType {
    pub fn all() -> &'static [NodeType] {
        &[Self::Concept, Self::Entity, Self::Action, Self::Emotion]
    }

    /// Display colour used when a node carries none of its own.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Concept => "#00d2ff",
            Self::Entity => "#ff0055",
            Self::Action => "#00ffaa",
            Self::Emotion => "#ffff00",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Concept => write!(f, "Concept"),
            Self::Entity => write!(f, "Entity"),
            Self::Action => write!(f, "Action"),
            Self::Emotion => write!(f, "Emotion"),
        }
    }
}

/// A node in an ontology graph.
///
/// `id` is only unique within the extraction batch that produced it;
/// `name` is the identity used when batches are merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type,
            val: None,
            color: None,
            description: None,
        }
    }

    pub fn weight(&self) -> f64 {
        self.val.unwrap_or(DEFAULT_NODE_VAL)
    }

    pub fn display_color(&self) -> &str {
        self.color.as_deref().unwrap_or_else(|| self.node_type.color())
    }
}

/// A directed, labeled relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl GraphLink {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            value: None,
            label: None,
            description: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A batch of nodes and links: one extraction result, or one storage read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OntologyData {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub links: Vec<GraphLink>,
}

impl OntologyData {
    pub fn new(nodes: Vec<GraphNode>, links: Vec<GraphLink>) -> Self {
        Self { nodes, links }
    }

    /// True when the batch carries neither nodes nor links.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Parse a stored status, treating anything unrecognised as active.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            _ => Self::Active,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata of a flat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub session_id: String,
    #[serde(default)]
    pub topic: String,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub status: SessionStatus,
}

/// Metadata of a layered session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayeredSessionConfig {
    pub session_id: String,
    #[serde(default)]
    pub topic: String,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub status: SessionStatus,
    /// Cardinality of the session's layer index at the last layer write.
    #[serde(default)]
    pub layer_count: usize,
}

/// Metadata of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerMeta {
    pub layer_id: String,
    /// Epoch millis; also the layer's sort key within its session.
    pub timestamp: i64,
    #[serde(default)]
    pub agent_type: String,
    #[serde(default)]
    pub original_text: String,
}

/// Caller-supplied partial layer metadata. Missing id and timestamp are
/// assigned at creation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDraft {
    pub layer_id: Option<String>,
    pub timestamp: Option<i64>,
    pub agent_type: Option<String>,
    pub original_text: Option<String>,
}

/// A layer with its graph data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerData {
    pub meta: LayerMeta,
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_json_shape() {
        let node = GraphNode::new("n1", "Trust", NodeType::Concept);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "Concept");
        assert!(json.get("val").is_none());
        assert!(json.get("color").is_none());
    }

    #[test]
    fn test_node_type_is_closed() {
        let parsed: std::result::Result<GraphNode, _> =
            serde_json::from_str(r#"{"id":"a","name":"b","type":"Place"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_display_defaults() {
        let mut node = GraphNode::new("n1", "Joy", NodeType::Emotion);
        assert_eq!(node.weight(), DEFAULT_NODE_VAL);
        assert_eq!(node.display_color(), "#ffff00");
        node.color = Some("#123456".into());
        assert_eq!(node.display_color(), "#123456");
    }

    #[test]
    fn test_session_config_camel_case() {
        let session = SessionConfig {
            session_id: "s1".into(),
            topic: String::new(),
            created_at: 1,
            updated_at: 2,
            status: SessionStatus::Active,
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["createdAt"], 1);
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn test_status_parse_lenient() {
        assert_eq!(SessionStatus::parse_lenient("completed"), SessionStatus::Completed);
        assert_eq!(SessionStatus::parse_lenient(""), SessionStatus::Active);
        assert_eq!(SessionStatus::parse_lenient("bogus"), SessionStatus::Active);
    }
}
