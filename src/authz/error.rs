use thiserror::Error;

use crate::auth::{Permission, TokenError};
use crate::database::models::Feature;
use crate::services::OrgError;
use crate::tenant::TenantError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// `None` means no credentials were presented at all.
    #[error("{}", unauthenticated_message(.0))]
    Unauthenticated(Option<TokenError>),

    #[error("Super admin access required")]
    SuperAdminRequired,

    #[error("Access denied to this organization")]
    CrossTenantForbidden,

    #[error("Missing permission: {0}")]
    MissingPermission(Permission),

    #[error("Feature not available on the current plan: {0}")]
    FeatureNotEntitled(Feature),
}

fn unauthenticated_message(cause: &Option<TokenError>) -> String {
    match cause {
        None => "Access token required".to_string(),
        Some(err) => format!("Invalid access token: {}", err),
    }
}

/// Everything the authorization pipeline can deny a request with.
#[derive(Error, Debug)]
pub enum AccessError {
    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error(transparent)]
    Organization(#[from] OrgError),
}

impl AccessError {
    pub fn missing_credentials() -> Self {
        AccessError::Authz(AuthzError::Unauthenticated(None))
    }
}
