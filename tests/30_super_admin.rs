mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use schoolsite_api::auth::{Permission, Role};
use schoolsite_api::database::UserStore;

use common::{Call, TestApp, GREENWOOD, PASSWORD, RIVERSIDE};

#[tokio::test]
async fn create_organization_with_admin_derives_features_from_plan() -> Result<()> {
    let app = TestApp::spawn().await?;
    let root = app.token_for(&app.super_admin);

    let (status, body) = app
        .send(Call::post("/api/super-admin/organizations").bearer(&root).json(json!({
            "name": "Hillcrest Prep",
            "domain": "Hillcrest.edu",
            "plan": "premium",
            "features": ["api_access", "advanced_analytics"],
            "adminEmail": "Principal@Hillcrest.edu",
            "adminPassword": "s3cret!",
            "adminName": "Pat Principal",
        })))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);

    let organization = &body["data"]["organization"];
    let features: Vec<&str> = organization["subscription"]["features"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f.as_str())
        .collect();
    assert!(features.contains(&"events"));
    assert!(!features.contains(&"api_access"));
    assert_eq!(organization["domain"], "hillcrest.edu");
    assert_eq!(organization["subscription"]["status"], "active");

    let admin = &body["data"]["adminUser"];
    assert_eq!(admin["role"], "school_admin");
    assert_eq!(admin["email"], "principal@hillcrest.edu");
    assert_eq!(admin["organizationId"], organization["organizationId"]);
    assert!(admin.get("passwordHash").is_none());

    // The new admin can log in and lands in the new tenant.
    let (status, body) = app
        .send(Call::post("/api/login").json(json!({ "email": "principal@hillcrest.edu", "password": "s3cret!" })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["organizationId"], organization["organizationId"]);
    Ok(())
}

#[tokio::test]
async fn create_organization_requires_admin_credentials() -> Result<()> {
    let app = TestApp::spawn().await?;
    let root = app.token_for(&app.super_admin);

    let (status, body) = app
        .send(
            Call::post("/api/super-admin/organizations")
                .bearer(&root)
                .json(json!({ "name": "Hillcrest Prep", "adminEmail": "p@hillcrest.edu" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fieldErrors"]["adminPassword"].is_string());

    let organizations = app.state.registry.list().await?;
    assert_eq!(organizations.len(), 2);
    Ok(())
}

#[tokio::test]
async fn failed_admin_creation_rolls_back_organization() -> Result<()> {
    let app = TestApp::spawn().await?;
    let root = app.token_for(&app.super_admin);

    // Email already taken by an existing account.
    let (status, _) = app
        .send(Call::post("/api/super-admin/organizations").bearer(&root).json(json!({
            "name": "Hillcrest Prep",
            "adminEmail": common::GREENWOOD_ADMIN_EMAIL,
            "adminPassword": PASSWORD,
        })))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.state.registry.list().await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn super_admin_surface_is_closed_to_school_admins() -> Result<()> {
    let app = TestApp::spawn().await?;
    let greenwood = app.token_for(&app.greenwood_admin);

    let (status, body) = app
        .send(Call::get("/api/super-admin/organizations").bearer(&greenwood).empty())
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "SUPER_ADMIN_REQUIRED");

    let (status, _) = app.send(Call::get("/api/super-admin/users").bearer(&greenwood).empty()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(Call::get("/api/super-admin/organizations").empty()).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn platform_permission_tags_do_not_make_a_super_admin() -> Result<()> {
    let app = TestApp::spawn().await?;

    let mut staff = common::user("tagged@greenwood.test", Role::Staff, Some(GREENWOOD));
    staff.permissions.insert(Permission::ManageOrganizations);
    staff.permissions.insert(Permission::ManageAllUsers);
    let users: &dyn UserStore = app.store.as_ref();
    users.insert(&staff).await?;
    let token = app.token_for(&staff);

    let (status, body) = app
        .send(Call::get("/api/super-admin/organizations").bearer(&token).empty())
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "SUPER_ADMIN_REQUIRED");

    let (status, _) = app
        .send(Call::post("/api/super-admin/users").bearer(&token).json(json!({
            "email": "second-root@platform.test",
            "password": PASSWORD,
            "role": "super_admin",
        })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(users.find_by_identifier("second-root@platform.test").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn user_list_survives_huge_page_numbers() -> Result<()> {
    let app = TestApp::spawn().await?;
    let root = app.token_for(&app.super_admin);

    let (status, body) = app
        .send(
            Call::get(&format!("/api/super-admin/users?page={}&limit=500", usize::MAX))
                .bearer(&root)
                .empty(),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["data"]["users"].as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn suspended_subscription_blocks_tenant_routes() -> Result<()> {
    let app = TestApp::spawn().await?;
    let root = app.token_for(&app.super_admin);
    let greenwood = app.token_for(&app.greenwood_admin);

    let (status, body) = app
        .send(
            Call::put(&format!("/api/super-admin/organizations/{}/subscription", GREENWOOD))
                .bearer(&root)
                .json(json!({ "plan": "premium", "status": "suspended" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["subscription"]["status"], "suspended");

    let (status, body) = app.send(Call::get("/api/students").bearer(&greenwood).empty()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ORGANIZATION_INACTIVE");

    // Super admins are held to the same rule once a tenant is named.
    let (status, _) = app
        .send(Call::get(&format!("/api/org/{}/students", GREENWOOD)).bearer(&root).empty())
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn expired_subscription_blocks_tenant_routes() -> Result<()> {
    let app = TestApp::spawn().await?;
    let root = app.token_for(&app.super_admin);
    let riverside = app.token_for(&app.riverside_admin);

    let (status, _) = app
        .send(
            Call::put(&format!("/api/super-admin/organizations/{}/subscription", RIVERSIDE))
                .bearer(&root)
                .json(json!({ "plan": "basic", "status": "active", "expiresAt": "2020-01-01T00:00:00Z" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(Call::get("/api/programs").bearer(&riverside).empty()).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ORGANIZATION_INACTIVE");

    let (status, body) = app.send(Call::get("/api/super-admin/health").bearer(&root).empty()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["expiredSubscriptions"], 1);
    Ok(())
}

#[tokio::test]
async fn delete_organization_cascades() -> Result<()> {
    let app = TestApp::spawn().await?;
    let root = app.token_for(&app.super_admin);
    let riverside = app.token_for(&app.riverside_admin);
    let greenwood = app.token_for(&app.greenwood_admin);

    for name in ["Cleo", "Dev"] {
        let (status, _) = app
            .send(Call::post("/api/students").bearer(&riverside).json(json!({ "name": name })))
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = app
        .send(Call::post("/api/students").bearer(&greenwood).json(json!({ "name": "Ana" })))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .send(Call::delete(&format!("/api/super-admin/organizations/{}", RIVERSIDE)).bearer(&root).empty())
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["users"], 1);
    assert_eq!(body["data"]["records"], 2);

    let (status, _) = app
        .send(Call::get(&format!("/api/super-admin/organizations/{}", RIVERSIDE)).bearer(&root).empty())
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Greenwood data is untouched.
    let (status, body) = app.send(Call::get("/api/students").bearer(&greenwood).empty()).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // The deleted tenant's admin can no longer log in.
    let (status, _) = app
        .send(Call::post("/api/login").json(json!({ "email": common::RIVERSIDE_ADMIN_EMAIL, "password": PASSWORD })))
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn update_organization_keeps_subscription() -> Result<()> {
    let app = TestApp::spawn().await?;
    let root = app.token_for(&app.super_admin);

    let (status, body) = app
        .send(
            Call::put(&format!("/api/super-admin/organizations/{}", RIVERSIDE))
                .bearer(&root)
                .json(json!({ "name": "Riverside High School", "subscription": { "plan": "enterprise" } })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["name"], "Riverside High School");
    assert_eq!(body["data"]["subscription"]["plan"], "basic");
    Ok(())
}

#[tokio::test]
async fn user_management_round() -> Result<()> {
    let app = TestApp::spawn().await?;
    let root = app.token_for(&app.super_admin);

    let (status, body) = app
        .send(Call::post("/api/super-admin/users").bearer(&root).json(json!({
            "email": "coach@greenwood.test",
            "password": "abcdef",
            "role": "staff",
            "organizationId": GREENWOOD,
        })))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(Call::get(&format!("/api/super-admin/users?organizationId={}", GREENWOOD)).bearer(&root).empty())
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);

    let (status, body) = app
        .send(Call::put(&format!("/api/super-admin/users/{}/toggle-status", id)).bearer(&root).empty())
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isActive"], false);

    let (status, _) = app
        .send(Call::delete(&format!("/api/super-admin/users/{}", id)).bearer(&root).empty())
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(Call::get(&format!("/api/super-admin/users/{}", id)).bearer(&root).empty())
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Call::get("/api/super-admin/users/not-a-uuid").bearer(&root).empty())
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn user_bound_to_unknown_organization_is_rejected() -> Result<()> {
    let app = TestApp::spawn().await?;
    let root = app.token_for(&app.super_admin);

    let (status, _) = app
        .send(Call::post("/api/super-admin/users").bearer(&root).json(json!({
            "email": "x@nowhere.test",
            "password": "abcdef",
            "role": "school_admin",
            "organizationId": "nowhere",
        })))
        .await?;
    assert!(status.is_client_error());
    Ok(())
}

#[tokio::test]
async fn dashboard_reports_platform_totals() -> Result<()> {
    let app = TestApp::spawn().await?;
    let root = app.token_for(&app.super_admin);

    let (status, body) = app.send(Call::get("/api/super-admin/dashboard").bearer(&root).empty()).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["totalOrganizations"], 2);
    assert_eq!(body["data"]["activeOrganizations"], 2);
    assert_eq!(body["data"]["totalUsers"], 4);
    assert_eq!(body["data"]["organizationsByPlan"].as_array().unwrap().len(), 3);
    Ok(())
}
