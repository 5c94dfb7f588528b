use axum::{
    extract::{RawPathParams, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::bearer_token;
use crate::authz::{AuthorizationEvaluator, Outcome, RoutePolicy};
use crate::error::ApiError;
use crate::tenant::{RequestSignals, ORGANIZATION_HEADER, ORGANIZATION_PATH_PARAM};

/// Per-route middleware state: the shared evaluator plus this route's policy.
#[derive(Clone)]
pub struct RouteGuard {
    evaluator: AuthorizationEvaluator,
    policy: RoutePolicy,
}

impl RouteGuard {
    pub fn new(evaluator: AuthorizationEvaluator, policy: RoutePolicy) -> Self {
        Self { evaluator, policy }
    }
}

/// Runs the authorization pipeline and stores the resulting
/// [`Decision`](crate::authz::Decision) in the request extensions.
pub async fn authorize(
    State(guard): State<RouteGuard>,
    path: Option<RawPathParams>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let signals = collect_signals(&request, path.as_ref());
    let authorization = header_str(request.headers(), header::AUTHORIZATION.as_str()).map(str::to_string);
    let bearer = authorization.as_deref().and_then(bearer_token);

    match guard.evaluator.evaluate(&signals, bearer, &guard.policy).await? {
        Outcome::Preflight => Ok(StatusCode::NO_CONTENT.into_response()),
        Outcome::Admitted(decision) => {
            request.extensions_mut().insert(decision);
            Ok(next.run(request).await)
        }
    }
}

fn collect_signals(request: &Request, path: Option<&RawPathParams>) -> RequestSignals {
    let headers = request.headers();
    let path_org_id = path.and_then(|params| {
        params
            .iter()
            .find(|(key, _)| *key == ORGANIZATION_PATH_PARAM)
            .map(|(_, value)| value.to_string())
    });
    let host = header_str(headers, header::HOST.as_str())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()));

    RequestSignals {
        path_org_id,
        header_org_id: header_str(headers, ORGANIZATION_HEADER).map(str::to_string),
        host,
        method: request.method().as_str().to_string(),
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
