// handlers/public/submissions.rs - public admission and contact forms
//
// Anonymous callers. The tenant comes from the request signals and the
// organization must be usable.

use axum::extract::{rejection::JsonRejection, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Decision;
use crate::database::models::collection::{CONTACTS, STUDENTS};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::scope::{ScopeError, ScopeFilterBuilder};

/// POST /submit-admission - store an admission application as a student record
pub async fn submit_admission(
    State(state): State<AppState>,
    Extension(decision): Extension<Decision>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;
    let Value::Object(form) = body else {
        return Err(ScopeError::NotAnObject.into());
    };

    let id = store_submission(&state, &decision, STUDENTS.name, form).await?;
    Ok(ApiResponse::created(json!({ "id": id })).with_message("Admission submitted successfully."))
}

/// POST /submit-contact - `name`, `email` and `message` are required
pub async fn submit_contact(
    State(state): State<AppState>,
    Extension(decision): Extension<Decision>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(body) = payload?;

    let mut form = Map::new();
    for field in ["name", "email", "message"] {
        let value = body
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::required(field))?;
        form.insert(field.to_string(), Value::String(value.to_string()));
    }

    let id = store_submission(&state, &decision, CONTACTS.name, form).await?;
    Ok(ApiResponse::created(json!({ "id": id })).with_message("Message received successfully."))
}

/// Returns the new record id.
async fn store_submission(
    state: &AppState,
    decision: &Decision,
    collection: &str,
    form: Map<String, Value>,
) -> Result<String, ApiError> {
    let id = Uuid::new_v4().to_string();
    let mut record = ScopeFilterBuilder::new(decision).create(form)?;
    record.insert("id".to_string(), Value::String(id.clone()));
    record.insert("submittedAt".to_string(), json!(Utc::now()));

    state.content.insert_one(collection, record).await?;
    info!(
        "Public submission stored in '{}' for {}",
        collection,
        decision.resolved_organization_id.as_deref().unwrap_or("-")
    );
    Ok(id)
}
