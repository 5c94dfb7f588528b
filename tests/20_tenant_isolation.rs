mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{Call, TestApp, GREENWOOD, RIVERSIDE};

async fn create_student(app: &TestApp, token: &str, body: Value) -> Result<Value> {
    let (status, body) = app.send(Call::post("/api/students").bearer(token).json(body)).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    Ok(body["data"].clone())
}

#[tokio::test]
async fn create_pins_owner_and_replaces_client_identity() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token_for(&app.greenwood_admin);

    let record = create_student(
        &app,
        &token,
        json!({ "name": "Ana", "grade": 4, "id": "chosen", "_id": "legacy", "organizationId": RIVERSIDE }),
    )
    .await?;

    assert_eq!(record["organizationId"], GREENWOOD);
    assert_eq!(record["name"], "Ana");
    assert_ne!(record["id"], "chosen");
    assert!(record.get("_id").is_none());
    assert!(record["createdAt"].is_string());
    Ok(())
}

#[tokio::test]
async fn other_tenant_cannot_read_update_or_delete() -> Result<()> {
    let app = TestApp::spawn().await?;
    let greenwood = app.token_for(&app.greenwood_admin);
    let riverside = app.token_for(&app.riverside_admin);

    let record = create_student(&app, &greenwood, json!({ "name": "Ana" })).await?;
    let uri = format!("/api/students/{}", record["id"].as_str().unwrap());

    let (status, body) = app.send(Call::get(&uri).bearer(&riverside).empty()).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Record not found");

    let (status, _) = app
        .send(Call::put(&uri).bearer(&riverside).json(json!({ "name": "Hijacked" })))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send(Call::delete(&uri).bearer(&riverside).empty()).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.send(Call::get(&uri).bearer(&greenwood).empty()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ana");
    assert_eq!(body["data"]["organizationId"], GREENWOOD);
    Ok(())
}

#[tokio::test]
async fn list_only_returns_own_records() -> Result<()> {
    let app = TestApp::spawn().await?;
    let greenwood = app.token_for(&app.greenwood_admin);
    let riverside = app.token_for(&app.riverside_admin);

    create_student(&app, &greenwood, json!({ "name": "Ana" })).await?;
    create_student(&app, &greenwood, json!({ "name": "Ben" })).await?;
    create_student(&app, &riverside, json!({ "name": "Cleo" })).await?;

    let (status, body) = app.send(Call::get("/api/students").bearer(&riverside).empty()).await?;
    assert_eq!(status, StatusCode::OK);
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["name"], "Cleo");
    Ok(())
}

#[tokio::test]
async fn update_cannot_move_record_between_tenants() -> Result<()> {
    let app = TestApp::spawn().await?;
    let greenwood = app.token_for(&app.greenwood_admin);

    let record = create_student(&app, &greenwood, json!({ "name": "Ana" })).await?;
    let id = record["id"].as_str().unwrap().to_string();
    let uri = format!("/api/students/{}", id);

    let (status, body) = app
        .send(Call::put(&uri).bearer(&greenwood).json(json!({
            "name": "Ana Maria",
            "organizationId": RIVERSIDE,
            "id": "other",
        })))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], "Ana Maria");
    assert_eq!(body["data"]["organizationId"], GREENWOOD);
    assert_eq!(body["data"]["id"], id.as_str());
    Ok(())
}

#[tokio::test]
async fn explicit_foreign_tenant_is_forbidden() -> Result<()> {
    let app = TestApp::spawn().await?;
    let greenwood = app.token_for(&app.greenwood_admin);

    let (status, body) = app
        .send(Call::get(&format!("/api/org/{}/students", RIVERSIDE)).bearer(&greenwood).empty())
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "CROSS_TENANT_FORBIDDEN");

    let (status, body) = app
        .send(
            Call::get("/api/students")
                .bearer(&greenwood)
                .header("x-organization-id", RIVERSIDE)
                .empty(),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "CROSS_TENANT_FORBIDDEN");

    // Naming your own organization explicitly is fine.
    let (status, _) = app
        .send(Call::get(&format!("/api/org/{}/students", GREENWOOD)).bearer(&greenwood).empty())
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn path_organization_beats_header() -> Result<()> {
    let app = TestApp::spawn().await?;
    let greenwood = app.token_for(&app.greenwood_admin);
    let riverside = app.token_for(&app.riverside_admin);
    let root = app.token_for(&app.super_admin);

    create_student(&app, &greenwood, json!({ "name": "Ana" })).await?;
    create_student(&app, &riverside, json!({ "name": "Cleo" })).await?;

    let (status, body) = app
        .send(
            Call::get(&format!("/api/org/{}/students", GREENWOOD))
                .bearer(&root)
                .header("x-organization-id", RIVERSIDE)
                .empty(),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["name"], "Ana");
    Ok(())
}

#[tokio::test]
async fn subdomain_resolves_tenant_for_super_admin() -> Result<()> {
    let app = TestApp::spawn().await?;
    let riverside = app.token_for(&app.riverside_admin);
    let root = app.token_for(&app.super_admin);

    create_student(&app, &riverside, json!({ "name": "Cleo" })).await?;

    let (status, body) = app
        .send(
            Call::get("/api/students")
                .bearer(&root)
                .header("host", "riverside.schools.example.com:8080")
                .empty(),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .send(Call::get("/api/whoami").bearer(&root).header("host", "www.schools.example.com").empty())
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tenant"]["isSuperAdminBypass"], true);
    Ok(())
}

#[tokio::test]
async fn super_admin_bypass_sees_every_tenant() -> Result<()> {
    let app = TestApp::spawn().await?;
    let greenwood = app.token_for(&app.greenwood_admin);
    let riverside = app.token_for(&app.riverside_admin);
    let root = app.token_for(&app.super_admin);

    let ana = create_student(&app, &greenwood, json!({ "name": "Ana" })).await?;
    create_student(&app, &riverside, json!({ "name": "Cleo" })).await?;

    let (status, body) = app.send(Call::get("/api/students").bearer(&root).empty()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let uri = format!("/api/students/{}", ana["id"].as_str().unwrap());
    let (status, _) = app.send(Call::delete(&uri).bearer(&root).empty()).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn super_admin_create_needs_an_owner() -> Result<()> {
    let app = TestApp::spawn().await?;
    let root = app.token_for(&app.super_admin);

    let (status, body) = app
        .send(Call::post("/api/programs").bearer(&root).json(json!({ "title": "Robotics" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_TENANT_CONTEXT");

    let (status, body) = app
        .send(
            Call::post("/api/programs")
                .bearer(&root)
                .json(json!({ "title": "Robotics", "organizationId": RIVERSIDE })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["organizationId"], RIVERSIDE);
    Ok(())
}

#[tokio::test]
async fn features_gate_collections_by_plan() -> Result<()> {
    let app = TestApp::spawn().await?;
    let greenwood = app.token_for(&app.greenwood_admin);
    let riverside = app.token_for(&app.riverside_admin);

    let (status, body) = app.send(Call::get("/api/newsEvents").bearer(&riverside).empty()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FEATURE_NOT_ENTITLED");

    let (status, _) = app.send(Call::get("/api/faculty").bearer(&riverside).empty()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(Call::get("/api/newsEvents").bearer(&greenwood).empty()).await?;
    assert_eq!(status, StatusCode::OK);

    // Gallery is available on every plan.
    let (status, _) = app.send(Call::get("/api/gallery").bearer(&riverside).empty()).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn writes_require_collection_permission() -> Result<()> {
    let app = TestApp::spawn().await?;
    let staff = app.token_for(&app.greenwood_staff);

    let (status, _) = app.send(Call::get("/api/students").bearer(&staff).empty()).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Call::post("/api/students").bearer(&staff).json(json!({ "name": "Ana" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "MISSING_PERMISSION");

    let (status, _) = app
        .send(Call::post("/api/programs").bearer(&staff).json(json!({ "title": "Chess" })))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn non_object_body_is_rejected() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.token_for(&app.greenwood_admin);

    let (status, _) = app
        .send(Call::post("/api/programs").bearer(&token).json(json!(["not", "an", "object"])))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
