//! Strangler Gateway Server Library
//!
//! HTTP front end of the strangler gateway: operational endpoints plus a
//! catch-all proxy that hands every other request to the relay layer.

pub mod app;
pub mod middleware;
#[cfg(feature = "observability")]
pub mod observability;
pub mod router;

pub use app::{create_app, start_server, AppState};
