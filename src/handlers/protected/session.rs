// handlers/protected/session.rs - POST /api/logout and GET /api/whoami

use axum::extract::State;
use axum::Extension;
use serde_json::{json, Value};
use tracing::info;

use crate::app::AppState;
use crate::authz::Decision;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// Revokes the presented token until its natural expiry.
pub async fn logout(
    State(state): State<AppState>,
    Extension(decision): Extension<Decision>,
) -> ApiResult<Value> {
    let token = decision
        .token
        .as_ref()
        .ok_or_else(|| ApiError::unauthorized("Authorization token required"))?;

    state.revocations.revoke(&token.jti, token.expires_at);
    if let Some(principal) = &decision.principal {
        info!("User {} logged out", principal.subject_id);
    }

    Ok(ApiResponse::success(json!({ "revoked": true })).with_message("Logged out successfully."))
}

/**
 * GET /api/whoami - The caller's identity and the tenant this request
 * resolved to.
 */
pub async fn whoami(Extension(decision): Extension<Decision>) -> ApiResult<Value> {
    let principal = decision
        .principal
        .as_ref()
        .ok_or_else(|| ApiError::unauthorized("Authorization token required"))?;

    Ok(ApiResponse::success(json!({
        "user": principal,
        "tenant": {
            "resolvedOrganizationId": decision.resolved_organization_id,
            "isSuperAdminBypass": decision.is_super_admin_bypass,
        },
    })))
}
