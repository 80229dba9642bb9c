//! HTTP surface: shared state, error mapping and axum routes

mod error;
pub mod routes;
mod state;

pub use error::ApiErrorResponse;
pub use routes::{api_routes, resolve_route};
pub use state::AppState;
