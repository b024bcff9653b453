//! Liveness and status endpoints

use axum::{Json, extract::State as AxumState};
use serde::Serialize;
use std::sync::atomic::Ordering;

use crate::SharedState;

#[derive(Debug, Serialize)]
pub struct DeliveryStats {
    pub received: u64,
    pub decode_failures: u64,
    pub resolve_failures: u64,
    pub published: u64,
    pub publish_failures: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub name: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub topic: String,
    pub deliveries: DeliveryStats,
}

/// GET /
pub async fn root() -> &'static str {
    "artifact_relay is running"
}

/// GET /status - uptime and delivery counters
pub async fn status(AxumState(state): AxumState<SharedState>) -> Json<StatusResponse> {
    let stats = &state.stats;
    Json(StatusResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        started_at: state.started_at.to_rfc3339(),
        topic: state.topic.clone(),
        deliveries: DeliveryStats {
            received: stats.received.load(Ordering::Relaxed),
            decode_failures: stats.decode_failures.load(Ordering::Relaxed),
            resolve_failures: stats.resolve_failures.load(Ordering::Relaxed),
            published: stats.published.load(Ordering::Relaxed),
            publish_failures: stats.publish_failures.load(Ordering::Relaxed),
        },
    })
}
