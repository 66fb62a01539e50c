//! Timeline summaries of a layered session.

use ontograph_core::LayerData;
use serde::Serialize;

/// Preview length in characters.
pub const PREVIEW_CHARS: usize = 100;

const DEFAULT_AGENT_COLOR: &str = "#00d2ff";

/// Display colour for an agent type; matching ignores case.
pub fn agent_color(agent_type: &str) -> &'static str {
    match agent_type.to_uppercase().as_str() {
        "FRITZ" => "#ff6b6b",
        "BOB" => "#4ecdc4",
        "DONNA" => "#ffe66d",
        "BEN" => "#95e1d3",
        "JOHN" => "#dfe6e9",
        "MODERATOR" => "#a29bfe",
        _ => DEFAULT_AGENT_COLOR,
    }
}

/// First [`PREVIEW_CHARS`] characters of `text`, with `...` appended when cut.
pub fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// One row of a session timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub layer_id: String,
    pub timestamp: i64,
    pub agent_type: String,
    pub agent_color: &'static str,
    pub node_count: usize,
    pub link_count: usize,
    pub preview: String,
}

impl TimelineEntry {
    pub fn of(layer: &LayerData) -> Self {
        Self {
            layer_id: layer.meta.layer_id.clone(),
            timestamp: layer.meta.timestamp,
            agent_type: layer.meta.agent_type.clone(),
            agent_color: agent_color(&layer.meta.agent_type),
            node_count: layer.nodes.len(),
            link_count: layer.links.len(),
            preview: preview(&layer.meta.original_text),
        }
    }
}

/// Timeline of `layers`, in the order given.
pub fn timeline(layers: &[LayerData]) -> Vec<TimelineEntry> {
    layers.iter().map(TimelineEntry::of).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ontograph_core::LayerMeta;

    #[test]
    fn test_agent_color() {
        assert_eq!(agent_color("bob"), "#4ecdc4");
        assert_eq!(agent_color("Moderator"), "#a29bfe");
        assert_eq!(agent_color(""), DEFAULT_AGENT_COLOR);
        assert_eq!(agent_color("someone"), DEFAULT_AGENT_COLOR);
    }

    #[test]
    fn test_preview_cut() {
        assert_eq!(preview("short"), "short");
        let exact = "x".repeat(PREVIEW_CHARS);
        assert_eq!(preview(&exact), exact);

        let long = "é".repeat(PREVIEW_CHARS + 5);
        let cut = preview(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn test_entry_keeps_full_text_out() {
        let layer = LayerData {
            meta: LayerMeta {
                layer_id: "l1".into(),
                timestamp: 10,
                agent_type: "FRITZ".into(),
                original_text: "y".repeat(300),
            },
            nodes: Vec::new(),
            links: Vec::new(),
        };
        let entries = timeline(std::slice::from_ref(&layer));
        assert_eq!(entries[0].agent_color, "#ff6b6b");
        assert_eq!(entries[0].preview.len(), PREVIEW_CHARS + 3);
        assert_eq!(layer.meta.original_text.len(), 300);

        let json = serde_json::to_value(&entries[0]).unwrap();
        assert_eq!(json["layerId"], "l1");
        assert_eq!(json["nodeCount"], 0);
    }
}
