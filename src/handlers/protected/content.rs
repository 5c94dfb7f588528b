// handlers/protected/content.rs - tenant-scoped CRUD for every content collection
//
// Mounted once per collection under `/api/{prefix}` and
// `/api/org/:org_id/{prefix}`. The collection arrives as an extension and the
// tenant scope comes from the authorization decision. A record belonging to
// another organization is indistinguishable from a missing one.

use std::collections::HashMap;

use axum::extract::{rejection::JsonRejection, Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Decision;
use crate::database::models::Collection;
use crate::database::Record;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::scope::{Predicate, RecordError, ScopeError, ScopeFilterBuilder};

/// GET /api/{prefix} - every record visible to the caller
pub async fn list(
    State(state): State<AppState>,
    Extension(collection): Extension<&'static Collection>,
    Extension(decision): Extension<Decision>,
) -> ApiResult<Vec<Record>> {
    let predicate = ScopeFilterBuilder::new(&decision).read()?;
    let records = state.content.find(collection.name, &predicate).await?;
    debug!("Listed {} '{}' records", records.len(), collection.name);
    Ok(ApiResponse::success(records))
}

/// GET /api/{prefix}/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(collection): Extension<&'static Collection>,
    Extension(decision): Extension<Decision>,
    Path(params): Path<HashMap<String, String>>,
) -> ApiResult<Record> {
    let id = record_id(&params)?;
    let predicate = ScopeFilterBuilder::new(&decision).find_one(id)?;
    let record = find_first(&state, collection, &predicate).await?;
    Ok(ApiResponse::success(record))
}

/**
 * POST /api/{prefix} - Create a record in the caller's organization
 *
 * Any client-supplied `id`, `_id` or `organizationId` is replaced. Only a
 * super admin may target an organization other than the resolved one.
 */
pub async fn create(
    State(state): State<AppState>,
    Extension(collection): Extension<&'static Collection>,
    Extension(decision): Extension<Decision>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Record> {
    let body = object_body(payload)?;

    let mut record = ScopeFilterBuilder::new(&decision).create(body)?;
    let now = json!(Utc::now());
    record.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
    record.insert("createdAt".to_string(), now.clone());
    record.insert("updatedAt".to_string(), now);

    let stored = state.content.insert_one(collection.name, record).await?;
    let id = stored.get("id").and_then(Value::as_str).unwrap_or_default();
    info!("Created '{}' record {}", collection.name, id);
    Ok(ApiResponse::created(stored).with_message("Record created successfully."))
}

/// PUT /api/{prefix}/:id - shallow merge; identity and ownership fields are ignored
pub async fn update(
    State(state): State<AppState>,
    Extension(collection): Extension<&'static Collection>,
    Extension(decision): Extension<Decision>,
    Path(params): Path<HashMap<String, String>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Record> {
    let id = record_id(&params)?;
    let body = object_body(payload)?;

    let (predicate, mut patch) = ScopeFilterBuilder::new(&decision).update(id, body)?;
    patch.insert("updatedAt".to_string(), json!(Utc::now()));

    let matched = state.content.update_one(collection.name, &predicate, patch).await?;
    if matched == 0 {
        return Err(RecordError::NotFound.into());
    }

    let record = find_first(&state, collection, &predicate).await?;
    Ok(ApiResponse::success(record).with_message("Record updated successfully."))
}

/// DELETE /api/{prefix}/:id
pub async fn remove(
    State(state): State<AppState>,
    Extension(collection): Extension<&'static Collection>,
    Extension(decision): Extension<Decision>,
    Path(params): Path<HashMap<String, String>>,
) -> ApiResult<Value> {
    let id = record_id(&params)?;
    let predicate = ScopeFilterBuilder::new(&decision).delete(id)?;

    let deleted = state.content.delete_one(collection.name, &predicate).await?;
    if deleted == 0 {
        return Err(RecordError::NotFound.into());
    }

    info!("Deleted '{}' record {}", collection.name, id);
    Ok(ApiResponse::success(json!({ "id": id })).with_message("Record deleted successfully."))
}

fn record_id(params: &HashMap<String, String>) -> Result<&str, ApiError> {
    params
        .get("id")
        .map(String::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Record id is required"))
}

fn object_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, ApiError> {
    match payload? {
        Json(Value::Object(map)) => Ok(map),
        Json(_) => Err(ScopeError::NotAnObject.into()),
    }
}

async fn find_first(
    state: &AppState,
    collection: &Collection,
    predicate: &Predicate,
) -> Result<Record, ApiError> {
    state
        .content
        .find(collection.name, predicate)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RecordError::NotFound.into())
}
