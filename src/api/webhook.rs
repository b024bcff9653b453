//! Push webhook: resolve the artifact URL, then republish the payload

use axum::{
    Json,
    body::Bytes,
    extract::State as AxumState,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::webhook::UpdaterPayload;
use crate::SharedState;

fn bad_request() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "status": "error",
            "message": "Error parsing request"
        })),
    )
        .into_response()
}

/// Handles POST /push.
///
/// Blocks until the artifact URL is resolved or the backoff schedule runs
/// out. A publish failure is logged but still answered with 200.
pub async fn handle_push(AxumState(state): AxumState<SharedState>, body: Bytes) -> Response {
    let delivery_id = Uuid::now_v7();
    process_push(state, body)
        .instrument(info_span!("push", %delivery_id))
        .await
}

async fn process_push(state: SharedState, body: Bytes) -> Response {
    state.stats.record_received();

    let payload = match UpdaterPayload::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            info!("Could not decode push body: {}", e);
            state.stats.record_decode_failure();
            return bad_request();
        }
    };
    info!(
        "Push for {} at {}: waiting on artifact '{}'",
        payload.repository, payload.commit_sha, payload.artifact_name
    );

    let url = match state
        .retry
        .resolve_with_retries(
            state.resolver.as_ref(),
            &payload.repository,
            &payload.artifact_name,
        )
        .await
    {
        Ok(url) => url,
        Err(e) => {
            error!(
                "Giving up on artifact '{}' for {}: {}",
                payload.artifact_name, payload.repository, e
            );
            state.stats.record_resolve_failure();
            return bad_request();
        }
    };

    let payload = payload.with_download_url(url);
    let published = match payload.to_message() {
        Ok(message) => state.publisher.publish(&state.topic, message).await,
        Err(e) => Err(e),
    };
    match published {
        Ok(()) => {
            info!("Published '{}' to '{}'", payload.artifact_name, state.topic);
            state.stats.record_published();
        }
        Err(e) => {
            error!("Failed to publish to '{}': {}", state.topic, e);
            state.stats.record_publish_failure();
        }
    }

    (StatusCode::OK, Json(json!({ "status": "success" }))).into_response()
}
