//! Storage key scheme.
//!
//! Every key is a pure function of a session id (and, for layers, a layer
//! id). Ids are escaped before they are embedded so that `:` inside an id can
//! never forge a segment boundary: `%` becomes `%25` and `:` becomes `%3A`.
//! UUIDs pass through unchanged.

use std::borrow::Cow;

fn escape(id: &str) -> Cow<'_, str> {
    if !id.contains([':', '%']) {
        return Cow::Borrowed(id);
    }
    let mut out = String::with_capacity(id.len() + 4);
    for c in id.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Keys of the flat session scheme.
pub mod flat {
    use super::escape;

    /// Sorted set of session ids scored by creation time.
    pub const SESSIONS_LIST: &str = "sessions:list";

    /// Set of every node name written by any flat session.
    pub const GLOBAL_NODES: &str = "ontology:nodes";

    pub fn session_meta(session_id: &str) -> String {
        format!("session:{}:meta", escape(session_id))
    }

    pub fn session_nodes(session_id: &str) -> String {
        format!("session:{}:nodes", escape(session_id))
    }

    pub fn session_links(session_id: &str) -> String {
        format!("session:{}:links", escape(session_id))
    }
}

/// Keys of the layered session scheme.
pub mod layered {
    use super::escape;

    /// Sorted set of layered session ids scored by creation time.
    pub const SESSIONS_LIST: &str = "layered-sessions:list";

    pub fn session_meta(session_id: &str) -> String {
        format!("layered-session:{}:meta", escape(session_id))
    }

    /// Sorted set of layer ids scored by layer timestamp.
    pub fn session_layers(session_id: &str) -> String {
        format!("layered-session:{}:layers", escape(session_id))
    }

    pub fn layer_meta(session_id: &str, layer_id: &str) -> String {
        format!(
            "layered-session:{}:layer:{}:meta",
            escape(session_id),
            escape(layer_id)
        )
    }

    pub fn layer_nodes(session_id: &str, layer_id: &str) -> String {
        format!(
            "layered-session:{}:layer:{}:nodes",
            escape(session_id),
            escape(layer_id)
        )
    }

    pub fn layer_links(session_id: &str, layer_id: &str) -> String {
        format!(
            "layered-session:{}:layer:{}:links",
            escape(session_id),
            escape(layer_id)
        )
    }
}
