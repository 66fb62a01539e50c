//! Ontograph server: HTTP API over the session stores, the extraction
//! client and the merged session views.

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::{open_backend, AppState};
