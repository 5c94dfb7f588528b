// handlers/elevated/users.rs - /api/super-admin/users

use axum::extract::{rejection::JsonRejection, Path, Query, State};
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{NewUser, User, UserQuery, UserUpdate};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::UserPage;

/// GET /api/super-admin/users?organizationId=&role=&page=&limit=
pub async fn list(State(state): State<AppState>, Query(query): Query<UserQuery>) -> ApiResult<UserPage> {
    Ok(ApiResponse::success(state.users.list(&query).await?))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<User> {
    let Json(request) = payload?;
    let user = state.users.create(request).await?;
    Ok(ApiResponse::created(user).with_message("User created successfully."))
}

pub async fn show(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult<User> {
    let id = parse_user_id(&user_id)?;
    Ok(ApiResponse::success(state.users.get(id).await?))
}

/// PUT /api/super-admin/users/:user_id - a role change resets permissions
/// unless new ones are supplied
pub async fn update(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<UserUpdate>, JsonRejection>,
) -> ApiResult<User> {
    let id = parse_user_id(&user_id)?;
    let Json(changes) = payload?;
    let user = state.users.update(id, changes).await?;
    Ok(ApiResponse::success(user).with_message("User updated successfully."))
}

pub async fn remove(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult<Value> {
    let id = parse_user_id(&user_id)?;
    state.users.delete(id).await?;
    Ok(ApiResponse::success(json!({ "id": id })).with_message("User deleted successfully."))
}

pub async fn toggle_status(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult<User> {
    let id = parse_user_id(&user_id)?;
    let user = state.users.toggle_status(id).await?;
    let message = if user.is_active {
        "User activated successfully."
    } else {
        "User deactivated successfully."
    };
    Ok(ApiResponse::success(user).with_message(message))
}

fn parse_user_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid user id: {}", raw)))
}
