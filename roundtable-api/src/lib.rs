//! Roundtable HTTP API
//!
//! The HTTP edge over roundtable-core: routing, authentication,
//! request validation and wire formats. The binary in `main.rs` wires
//! this into a running service.

pub mod api;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;
pub mod types;

pub use api::build_router;
pub use state::AppState;
