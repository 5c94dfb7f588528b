// Tenant resolution from request signals
//
// Precedence, first match wins: route `org_id` > `x-organization-id` header >
// Host subdomain > the principal's own organization (non-super-admins only).

use std::net::IpAddr;

use serde::Serialize;
use thiserror::Error;

use crate::auth::Principal;

/// Request header naming the target organization.
pub const ORGANIZATION_HEADER: &str = "x-organization-id";

/// Route parameter naming the target organization.
pub const ORGANIZATION_PATH_PARAM: &str = "org_id";

/// Host labels that never identify a tenant.
pub const RESERVED_SUBDOMAINS: &[&str] = &["api", "admin", "www", "localhost"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantError {
    #[error("Organization context is required")]
    MissingTenantContext,
}

/// Raw tenant-bearing signals pulled off one request.
#[derive(Debug, Clone, Default)]
pub struct RequestSignals {
    pub path_org_id: Option<String>,
    pub header_org_id: Option<String>,
    pub host: Option<String>,
    pub method: String,
}

impl RequestSignals {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Default::default()
        }
    }

    pub fn with_path_org(mut self, org: impl Into<String>) -> Self {
        self.path_org_id = Some(org.into());
        self
    }

    pub fn with_header_org(mut self, org: impl Into<String>) -> Self {
        self.header_org_id = Some(org.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn is_preflight(&self) -> bool {
        self.method.eq_ignore_ascii_case("OPTIONS")
    }
}

/// Per-request tenant decision. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantContext {
    pub resolved_organization_id: Option<String>,
    pub is_super_admin_bypass: bool,
}

/// Where the resolved organization came from. Used for logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantSource {
    Path,
    Header,
    Subdomain,
    Principal,
}

pub struct TenantResolver;

impl TenantResolver {
    pub fn resolve(
        signals: &RequestSignals,
        principal: Option<&Principal>,
    ) -> Result<TenantContext, TenantError> {
        let is_super_admin = principal.map_or(false, Principal::is_super_admin);

        if let Some((org, source)) = Self::explicit(signals) {
            tracing::debug!("Resolved organization '{}' from {:?}", org, source);
            return Ok(TenantContext {
                resolved_organization_id: Some(org),
                is_super_admin_bypass: false,
            });
        }

        if is_super_admin {
            tracing::debug!("No organization signal; super admin bypass");
            return Ok(TenantContext {
                resolved_organization_id: None,
                is_super_admin_bypass: true,
            });
        }

        match principal.and_then(|p| non_empty(p.organization_id.as_deref())) {
            Some(org) => {
                tracing::debug!("Resolved organization '{}' from {:?}", org, TenantSource::Principal);
                Ok(TenantContext {
                    resolved_organization_id: Some(org),
                    is_super_admin_bypass: false,
                })
            }
            None => Err(TenantError::MissingTenantContext),
        }
    }

    /// Signals (1)-(3), independent of who is asking.
    fn explicit(signals: &RequestSignals) -> Option<(String, TenantSource)> {
        if let Some(org) = non_empty(signals.path_org_id.as_deref()) {
            return Some((org, TenantSource::Path));
        }
        if let Some(org) = non_empty(signals.header_org_id.as_deref()) {
            return Some((org, TenantSource::Header));
        }
        signals
            .host
            .as_deref()
            .and_then(subdomain_of)
            .map(|org| (org, TenantSource::Subdomain))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Leading host label when it names a tenant.
pub fn subdomain_of(host: &str) -> Option<String> {
    let host = strip_port(host.trim()).trim_end_matches('.').to_ascii_lowercase();
    if host.is_empty() || host.parse::<IpAddr>().is_ok() {
        return None;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.iter().any(|l| l.is_empty()) {
        return None;
    }

    let qualifies = labels.len() >= 3 || (labels.len() == 2 && labels[1] == "localhost");
    if !qualifies {
        return None;
    }

    let first = labels[0];
    if RESERVED_SUBDOMAINS.contains(&first) {
        return None;
    }
    Some(first.to_string())
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literal, with or without port.
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}
