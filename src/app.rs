use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put, MethodRouter},
    Extension, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{CredentialStore, Permission, RevocationList, TokenCodec};
use crate::authz::{AuthorizationEvaluator, RoutePolicy};
use crate::config::AppConfig;
use crate::database::models::{Collection, COLLECTIONS};
use crate::database::{ContentStore, MemoryStore, OrganizationStore, UserStore};
use crate::handlers;
use crate::middleware::{authorize, RouteGuard};
use crate::scope::Operation;
use crate::services::{OrganizationRegistry, UserService};
use crate::tenant::ORGANIZATION_HEADER;

/// Shared application state. Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub registry: OrganizationRegistry,
    pub users: UserService,
    pub credentials: CredentialStore,
    pub content: Arc<dyn ContentStore>,
    pub evaluator: AuthorizationEvaluator,
    pub revocations: Arc<RevocationList>,
}

impl AppState {
    pub fn new(
        organizations: Arc<dyn OrganizationStore>,
        users: Arc<dyn UserStore>,
        content: Arc<dyn ContentStore>,
        codec: TokenCodec,
    ) -> Self {
        let revocations = Arc::new(RevocationList::new());
        let codec = codec.with_revocation(revocations.clone());
        let registry = OrganizationRegistry::new(organizations.clone(), users.clone(), content.clone());

        Self {
            evaluator: AuthorizationEvaluator::new(codec, registry.clone()),
            registry,
            users: UserService::new(users.clone(), organizations),
            credentials: CredentialStore::new(users),
            content,
            revocations,
        }
    }

    /// Everything backed by one in-process [`MemoryStore`].
    pub fn in_memory(codec: TokenCodec) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store.clone(), store.clone(), store, codec)
    }

    pub fn codec(&self) -> &TokenCodec {
        self.evaluator.codec()
    }

    fn guarded(&self, route: MethodRouter<AppState>, policy: RoutePolicy) -> MethodRouter<AppState> {
        let guard = RouteGuard::new(self.evaluator.clone(), policy);
        route.route_layer(from_fn_with_state(guard, authorize))
    }
}

/// Full router with CORS and request tracing as configured.
pub fn app(state: AppState, config: &AppConfig) -> Router {
    let mut router = router(state);
    if config.security.enable_cors {
        router = router.layer(cors_layer(&config.security.cors_origins));
    }
    if config.server.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

/// Routes and guards only.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(handlers::public::root))
        .route("/health", get(handlers::public::health))
        .route("/api/login", post(handlers::public::login))
        .merge(submission_routes(&state))
        .merge(session_routes(&state))
        .merge(super_admin_routes(&state));

    for collection in COLLECTIONS {
        router = router.merge(collection_routes(&state, collection));
    }

    router.with_state(state)
}

fn session_routes(state: &AppState) -> Router<AppState> {
    use handlers::protected::session;

    Router::new()
        .route("/api/logout", state.guarded(post(session::logout), RoutePolicy::protected()))
        .route("/api/whoami", state.guarded(get(session::whoami), RoutePolicy::protected()))
}

fn submission_routes(state: &AppState) -> Router<AppState> {
    use handlers::public::submissions;

    let policy = RoutePolicy::public().requiring_valid_organization();
    Router::new()
        .route(
            "/submit-admission",
            state.guarded(post(submissions::submit_admission), policy.clone()),
        )
        .route(
            "/submit-contact",
            state.guarded(post(submissions::submit_contact), policy),
        )
}

/// `/api/{prefix}` and `/api/org/:org_id/{prefix}` for one collection, each
/// method behind its own policy.
fn collection_routes(state: &AppState, collection: &'static Collection) -> Router<AppState> {
    use handlers::protected::content;

    let policy = |operation| RoutePolicy::for_collection(collection, operation);

    let on_collection = state
        .guarded(get(content::list), policy(Operation::Read))
        .merge(state.guarded(post(content::create), policy(Operation::Create)));
    let on_record = state
        .guarded(get(content::show), policy(Operation::Read))
        .merge(state.guarded(put(content::update), policy(Operation::Update)))
        .merge(state.guarded(delete(content::remove), policy(Operation::Delete)));

    let prefix = collection.route_prefix;
    Router::new()
        .route(&format!("/api/{}", prefix), on_collection.clone())
        .route(&format!("/api/{}/:id", prefix), on_record.clone())
        .route(&format!("/api/org/:org_id/{}", prefix), on_collection)
        .route(&format!("/api/org/:org_id/{}/:id", prefix), on_record)
        .layer(Extension(collection))
}

fn super_admin_routes(state: &AppState) -> Router<AppState> {
    use handlers::elevated::{dashboard, organizations, users};

    let orgs = || RoutePolicy::super_admin_only().with_permission(Permission::ManageOrganizations);
    let all_users = || RoutePolicy::super_admin_only().with_permission(Permission::ManageAllUsers);

    Router::new()
        .route(
            "/api/super-admin/organizations",
            state.guarded(get(organizations::list).post(organizations::create), orgs()),
        )
        .route(
            "/api/super-admin/organizations/:org_id",
            state.guarded(
                get(organizations::show)
                    .put(organizations::update)
                    .delete(organizations::remove),
                orgs(),
            ),
        )
        .route(
            "/api/super-admin/organizations/:org_id/subscription",
            state.guarded(put(organizations::update_subscription), orgs()),
        )
        .route(
            "/api/super-admin/users",
            state.guarded(get(users::list).post(users::create), all_users()),
        )
        .route(
            "/api/super-admin/users/:user_id",
            state.guarded(get(users::show).put(users::update).delete(users::remove), all_users()),
        )
        .route(
            "/api/super-admin/users/:user_id/toggle-status",
            state.guarded(put(users::toggle_status), all_users()),
        )
        .route(
            "/api/super-admin/dashboard",
            state.guarded(get(dashboard::overview), orgs()),
        )
        .route(
            "/api/super-admin/health",
            state.guarded(get(dashboard::health), orgs()),
        )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(ORGANIZATION_HEADER),
        ]);

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    if origins.is_empty() {
        layer.allow_origin(tower_http::cors::Any)
    } else {
        layer.allow_origin(origins)
    }
}
