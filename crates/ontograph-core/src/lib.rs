//! Ontograph Core: graph data model, storage key scheme, configuration.

pub mod config;
pub mod error;
pub mod keys;
pub mod types;

pub use config::{LinkIdentity, OntographConfig};
pub use error::{Error, Result};
pub use types::*;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
