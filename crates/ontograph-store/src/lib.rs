//! Ontograph Store: session and layer persistence over a key-value backend.
//!
//! Every public store operation degrades instead of failing: when the
//! backend is not configured, unreachable, or errors mid-operation, reads
//! return empty values and writes return `false`/`None`, with a log line.

pub mod backend;
mod graph;
pub mod layered;
pub mod memory;
pub mod names;
pub mod record;
pub mod redis_backend;
pub mod session;
pub mod timeline;

pub use backend::{Availability, Backend, Connected, KvBackend, RangeOrder, Unavailable};
pub use layered::{LayeredSessionStore, LayeredSnapshot};
pub use memory::MemoryBackend;
pub use names::{NameScope, NodeNameIndex};
pub use redis_backend::RedisBackend;
pub use session::{SessionSnapshot, SessionStore};
pub use timeline::{timeline, TimelineEntry};

/// Outcome of a composite read that must tell "absent" from "unreachable".
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot<T> {
    Found(T),
    NotFound,
    Unavailable,
}

impl<T> Snapshot<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            _ => None,
        }
    }
}

/// Default page size for session listings.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Generate a fresh session or layer id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Inclusive stop index for the first `limit` entries of a range query.
/// Limits beyond `isize::MAX` are clamped.
pub(crate) fn range_stop(limit: usize) -> isize {
    isize::try_from(limit).unwrap_or(isize::MAX).saturating_sub(1)
}
