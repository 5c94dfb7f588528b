// handlers/public/login.rs - POST /api/login handler

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::AppState;
use crate::auth::Principal;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

const INVALID_CREDENTIALS: &str = "Invalid credentials.";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: Principal,
}

/**
 * POST /api/login - Exchange credentials for a signed access token
 *
 * Expected Input:
 * ```json
 * { "email": "admin@school.edu", "password": "..." }
 * ```
 * `username` may be sent instead of `email`. Every failure cause reads
 * "Invalid credentials." so callers cannot probe which accounts exist.
 */
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<LoginResponse> {
    let Json(request) = payload?;

    let identifier = request
        .email
        .as_deref()
        .or(request.username.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::required("email"))?;
    let password = request
        .password
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::required("password"))?;

    let Some(principal) = state.credentials.authenticate(identifier, password).await? else {
        warn!("Failed login attempt");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    let token = state.codec().issue(&principal)?;
    info!("User {} logged in as {}", principal.subject_id, principal.role);

    Ok(ApiResponse::success(LoginResponse {
        token,
        expires_in: state.codec().ttl().num_seconds(),
        user: principal,
    })
    .with_message("Login successful!"))
}
