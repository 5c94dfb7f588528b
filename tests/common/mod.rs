#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use schoolsite_api::auth::{hash_password, Role, TokenCodec};
use schoolsite_api::database::models::{
    Organization, OrganizationSettings, Plan, Subscription, SubscriptionStatus, User, UserProfile,
};
use schoolsite_api::database::{MemoryStore, OrganizationStore, UserStore};
use schoolsite_api::{router, AppState};

pub const SECRET: &str = "integration-test-signing-secret";
pub const PASSWORD: &str = "correct-horse";

/// Premium plan: every content feature.
pub const GREENWOOD: &str = "greenwood";
/// Basic plan: no events, faculty or news.
pub const RIVERSIDE: &str = "riverside";

pub const SUPER_ADMIN_EMAIL: &str = "root@platform.test";
pub const GREENWOOD_ADMIN_EMAIL: &str = "admin@greenwood.test";
pub const GREENWOOD_STAFF_EMAIL: &str = "staff@greenwood.test";
pub const RIVERSIDE_ADMIN_EMAIL: &str = "admin@riverside.test";

static PASSWORD_HASH: OnceLock<String> = OnceLock::new();

fn password_hash() -> String {
    PASSWORD_HASH
        .get_or_init(|| hash_password(PASSWORD).expect("hash test password"))
        .clone()
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub super_admin: User,
    pub greenwood_admin: User,
    pub greenwood_staff: User,
    pub riverside_admin: User,
}

impl TestApp {
    /// Two organizations and four accounts over a fresh in-memory store.
    pub async fn spawn() -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let codec = TokenCodec::new(SECRET, Duration::hours(1))?;
        let state = AppState::new(store.clone(), store.clone(), store.clone(), codec);

        let organizations: &dyn OrganizationStore = store.as_ref();
        organizations.insert(&organization(GREENWOOD, "Greenwood Academy", Plan::Premium)).await?;
        organizations.insert(&organization(RIVERSIDE, "Riverside High", Plan::Basic)).await?;

        let super_admin = user(SUPER_ADMIN_EMAIL, Role::SuperAdmin, None);
        let greenwood_admin = user(GREENWOOD_ADMIN_EMAIL, Role::SchoolAdmin, Some(GREENWOOD));
        let greenwood_staff = user(GREENWOOD_STAFF_EMAIL, Role::Staff, Some(GREENWOOD));
        let riverside_admin = user(RIVERSIDE_ADMIN_EMAIL, Role::SchoolAdmin, Some(RIVERSIDE));
        let users: &dyn UserStore = store.as_ref();
        for account in [&super_admin, &greenwood_admin, &greenwood_staff, &riverside_admin] {
            users.insert(account).await?;
        }

        Ok(Self {
            router: router(state.clone()),
            state,
            store,
            super_admin,
            greenwood_admin,
            greenwood_staff,
            riverside_admin,
        })
    }

    pub fn token_for(&self, user: &User) -> String {
        self.state.codec().issue(&user.principal()).expect("issue test token")
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }
}

pub fn organization(id: &str, name: &str, plan: Plan) -> Organization {
    let now = Utc::now();
    Organization {
        organization_id: id.to_string(),
        name: name.to_string(),
        domain: None,
        settings: OrganizationSettings::default(),
        subscription: Subscription::for_plan(plan, SubscriptionStatus::Active, now + Duration::days(365)),
        created_at: now,
        updated_at: now,
    }
}

pub fn user(email: &str, role: Role, organization_id: Option<&str>) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        username: email.to_string(),
        email: email.to_string(),
        password_hash: password_hash(),
        role,
        organization_id: organization_id.map(str::to_string),
        permissions: role.default_permissions(),
        profile: UserProfile::default(),
        is_active: true,
        last_login: None,
        created_at: now,
        updated_at: now,
    }
}

/// Request builder with optional bearer token and JSON body.
pub struct Call {
    builder: axum::http::request::Builder,
}

impl Call {
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            builder: Request::builder().method(method).uri(uri),
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn put(uri: &str) -> Self {
        Self::new(Method::PUT, uri)
    }

    pub fn delete(uri: &str) -> Self {
        Self::new(Method::DELETE, uri)
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.builder = self.builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    pub fn json(self, body: Value) -> Request<Body> {
        self.builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("build request")
    }

    pub fn empty(self) -> Request<Body> {
        self.builder.body(Body::empty()).expect("build request")
    }
}
