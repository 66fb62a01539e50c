//! Ontograph Merge: folds extraction batches into an accumulated graph.
//!
//! Nodes are deduplicated by normalized name, link endpoints are rewired
//! through the resulting id remap, and dangling or duplicate links are
//! dropped. The merged graph is a transient view: nothing here performs I/O.

pub mod merge;
pub mod query;
pub mod view;

pub use merge::{hydrate, merge, merge_into, normalize_name, DropReason, MergeOptions, MergeOutcome, MergeReport};
pub use query::{connected_node_ids, GraphStats};
pub use view::{SessionView, SessionViews};
