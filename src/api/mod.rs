//! HTTP routes

pub mod stats;
pub mod webhook;

use axum::{Router, routing};

use crate::SharedState;

pub use stats::{root, status};
pub use webhook::handle_push;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(root))
        .route("/status", routing::get(status))
        .route("/push", routing::post(handle_push))
        .with_state(state)
}
