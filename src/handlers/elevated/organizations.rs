// handlers/elevated/organizations.rs - /api/super-admin/organizations

use axum::extract::{rejection::JsonRejection, Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::app::AppState;
use crate::auth::Role;
use crate::database::models::{
    NewOrganization, NewUser, Organization, OrganizationSettings, OrganizationUpdate, Plan, SubscriptionUpdate, User,
};
use crate::database::CascadeReport;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// Create payload: the organization plus its first school admin.
///
/// Client supplied `features` or `subscription` keys are ignored. Features
/// always come from the plan.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub settings: Option<OrganizationSettings>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub admin_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrganization {
    pub organization: Organization,
    pub admin_user: User,
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Organization>> {
    Ok(ApiResponse::success(state.registry.list().await?))
}

/**
 * POST /api/super-admin/organizations - Provision a tenant
 *
 * Creates the organization, then a school_admin bound to it. When the admin
 * cannot be created the organization is removed again so no tenant is left
 * without an operator.
 */
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrganizationRequest>, JsonRejection>,
) -> ApiResult<CreatedOrganization> {
    let Json(request) = payload?;

    let name = required(request.name, "name")?;
    let admin_email = required(request.admin_email, "adminEmail")?;
    let admin_password = required(request.admin_password, "adminPassword")?;

    let organization = state
        .registry
        .create(NewOrganization {
            name,
            domain: request.domain,
            plan: request.plan,
            settings: request.settings,
            expires_at: request.expires_at,
        })
        .await?;

    let admin = NewUser {
        username: None,
        email: admin_email,
        password: admin_password,
        role: Some(Role::SchoolAdmin),
        organization_id: Some(organization.organization_id.clone()),
        permissions: None,
        name: request.admin_name,
        phone: None,
        avatar: None,
        is_active: Some(true),
    };

    let admin_user = match state.users.create(admin).await {
        Ok(user) => user,
        Err(err) => {
            if let Err(cleanup) = state.registry.delete(&organization.organization_id).await {
                error!(
                    "Failed to roll back organization '{}': {}",
                    organization.organization_id, cleanup
                );
            }
            return Err(err.into());
        }
    };

    info!(
        "Provisioned organization '{}' on plan {}",
        organization.organization_id,
        organization.subscription.plan.as_str()
    );
    Ok(ApiResponse::created(CreatedOrganization {
        organization,
        admin_user,
    })
    .with_message("Organization created successfully."))
}

pub async fn show(State(state): State<AppState>, Path(org_id): Path<String>) -> ApiResult<Organization> {
    Ok(ApiResponse::success(state.registry.find_by_id(&org_id).await?))
}

/// PUT /api/super-admin/organizations/:org_id - name, domain and settings only
pub async fn update(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    payload: Result<Json<OrganizationUpdate>, JsonRejection>,
) -> ApiResult<Organization> {
    let Json(changes) = payload?;
    let organization = state.registry.update(&org_id, changes).await?;
    Ok(ApiResponse::success(organization).with_message("Organization updated successfully."))
}

/// PUT /api/super-admin/organizations/:org_id/subscription
///
/// Features are recomputed from the plan.
pub async fn update_subscription(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    payload: Result<Json<SubscriptionUpdate>, JsonRejection>,
) -> ApiResult<Organization> {
    let Json(changes) = payload?;
    let organization = state.registry.update_subscription(&org_id, changes).await?;
    Ok(ApiResponse::success(organization).with_message("Subscription updated successfully."))
}

/// DELETE /api/super-admin/organizations/:org_id - cascades to users and records
pub async fn remove(State(state): State<AppState>, Path(org_id): Path<String>) -> ApiResult<CascadeReport> {
    let report = state.registry.delete(&org_id).await?;
    Ok(ApiResponse::success(report).with_message("Organization and all related data deleted successfully."))
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::required(field))
}
