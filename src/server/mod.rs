//! HTTP server: router, shared state, probes, response middleware.

pub mod health;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
