// handlers/elevated/dashboard.rs - GET /api/super-admin/dashboard and /health

use axum::extract::State;
use chrono::Utc;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};

const RECENT_USERS: usize = 10;
const RECENT_ORGANIZATIONS: usize = 5;

/**
 * Platform-wide counters for the operator dashboard.
 *
 * `activeOrganizations` counts organizations whose subscription is active
 * and unexpired right now.
 */
pub async fn overview(State(state): State<AppState>) -> ApiResult<Value> {
    let now = Utc::now();

    let mut organizations = state.registry.list().await?;
    let active = organizations.iter().filter(|o| o.is_usable(now)).count();
    let by_plan = state.registry.stats(now).await?;
    let by_role = state.users.stats().await?;
    let recent_users = state.users.recent(RECENT_USERS).await?;
    let total_users: usize = by_role.iter().map(|r| r.count).sum();

    let total_organizations = organizations.len();
    organizations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    organizations.truncate(RECENT_ORGANIZATIONS);

    Ok(ApiResponse::success(json!({
        "totalOrganizations": total_organizations,
        "activeOrganizations": active,
        "totalUsers": total_users,
        "organizationsByPlan": by_plan,
        "usersByRole": by_role,
        "recentUsers": recent_users,
        "recentOrganizations": organizations,
    })))
}

pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    let now = Utc::now();
    let expired = state.registry.expired_count(now).await?;

    Ok(ApiResponse::success(json!({
        "status": "healthy",
        "expiredSubscriptions": expired,
        "timestamp": now.to_rfc3339(),
    })))
}
