//! HTTP server wiring.
//!
//! - [`AppState`]: services shared by every handler
//! - [`build_router`]: routes plus the tower-http middleware stack
//! - Health and readiness probes

pub mod health;
pub mod routes;
pub mod state;

pub use health::{health_check, readiness_check};
pub use routes::build_router;
pub use state::{AppState, Dependencies};
