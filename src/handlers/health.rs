//! Liveness handlers
//!
//! Neither endpoint touches the database.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
}

/// Public health check response
#[derive(Debug, Serialize)]
pub struct PingResponse {
    /// Status indicator (always "ok")
    pub status: String,
}

/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Hello, World!".to_string(),
    })
}

/// GET /api/v1/ping
///
/// # Example
/// ```bash
/// curl http://localhost:8000/api/v1/ping
/// # Returns: {"status":"ok"}
/// ```
pub async fn ping() -> Json<PingResponse> {
    tracing::debug!("Ping requested");
    Json(PingResponse {
        status: "ok".to_string(),
    })
}
