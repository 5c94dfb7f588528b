// handlers/public/status.rs - GET / and GET /health

use axum::extract::State;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

pub async fn root() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Multi-tenant school site API",
    }))
}

/// Liveness plus a storage round trip. 503 when storage is unreachable.
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    if let Err(e) = state.registry.list().await {
        warn!("Health check storage probe failed: {}", e);
        return Err(ApiError::ServiceUnavailable("Storage unavailable".to_string()));
    }
    Ok(ApiResponse::success(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
