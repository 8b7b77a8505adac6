//! Internal coordination endpoints, called back by the per-node agents.
//!
//! Registration commits to the store first; external exposure through the
//! proxy is best-effort on top and never fails a registration.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, info, warn};

use floragrid_state::{ClientNode, RegisterClientRequest, RegisterServerRequest, ServerNode};

use crate::ApiState;

/// Blocking window of `GET /api/flower/server`; client agents poll inside it.
const SERVER_INFO_TIMEOUT: Duration = Duration::from_secs(300);

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// POST /api/flower/server
pub async fn register_server(
    State(state): State<ApiState>,
    payload: Result<Json<RegisterServerRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Ok(Json(req)) = payload else {
        return bad_request("invalid request body");
    };
    if req.ip.is_empty() {
        return bad_request("ip must not be empty");
    }

    let node = ServerNode::ready(&req);
    let ip = node.ip.clone();
    let control_port = node.control_api_port;
    if let Err(e) = state.store.register_server(node) {
        error!(error = %e, "server registration rejected");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response();
    }
    info!(%ip, control_port, "server node registered");

    // Expose the Control API through the proxy; failure is logged and shows
    // up in monitoring, the registration stands either way.
    let proxy = state.proxy.clone();
    let target = ip.clone();
    let exposure =
        tokio::task::spawn_blocking(move || proxy.expose(control_port, &target, control_port))
            .await;
    match exposure {
        Ok(Ok(())) => info!(control_port, "control API exposed through the proxy"),
        Ok(Err(e)) => warn!(error = %e, control_port, "control API exposure failed"),
        Err(e) => warn!(error = %e, "proxy task failed"),
    }

    Json(json!({ "status": "registered" })).into_response()
}

/// GET /api/flower/server — blocks until the server descriptor is ready.
pub async fn server_info(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.wait_for_server_ready(SERVER_INFO_TIMEOUT).await {
        Ok(node) => Json(node).into_response(),
        Err(e) => (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}

/// POST /api/flower/client
pub async fn register_client(
    State(state): State<ApiState>,
    payload: Result<Json<RegisterClientRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Ok(Json(req)) = payload else {
        return bad_request("invalid request body");
    };
    if req.ip.is_empty() {
        return bad_request("ip must not be empty");
    }

    let node = ClientNode::ready(&req.ip);
    let node_id = node.node_id.clone();
    if let Err(e) = state.store.register_client(node) {
        error!(error = %e, "client registration rejected");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response();
    }

    info!(%node_id, ip = %req.ip, port = req.port, "client node registered");
    Json(json!({ "status": "registered" })).into_response()
}
