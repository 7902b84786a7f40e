//! Public (non-upgrade) HTTP routes: liveness only (§6 "A `/health` route
//! outside the WebSocket upgrade answers liveness checks without a
//! socket").

use axum::Json;
use axum::response::IntoResponse;
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok", "service": "mindmesh-gateway"}))
}
