//! HTTP surface: axum router, bearer-token middleware, handlers and the OpenAPI document.

pub mod auth;
pub mod errors;
pub mod extract;
pub mod openapi;
pub mod routes;
pub mod startup;
pub mod state;

pub use startup::{build_app, build_state, run, run_scheduler, run_worker, TaskInfra};
pub use state::ServerState;
