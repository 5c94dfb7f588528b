use async_trait::async_trait;
use tracing::debug;

use super::error::{AccessError, AuthzError};
use super::pipeline::{AuthzContext, Stage, StageBox, StageFlow, TokenRef};
use crate::services::{OrgError, OrganizationRegistry};
use crate::tenant::TenantResolver;

/// The fixed decision procedure, in order.
pub fn standard_stages() -> Vec<StageBox> {
    vec![
        Box::new(Preflight),
        Box::new(Authenticate),
        Box::new(RequireSuperAdmin),
        Box::new(ResolveTenant),
        Box::new(SuperAdminAdmit),
        Box::new(TenantBoundary),
        Box::new(RequirePermission),
        Box::new(RequireFeature),
        Box::new(RequireValidOrganization),
    ]
}

pub struct Preflight;

#[async_trait]
impl Stage for Preflight {
    fn name(&self) -> &'static str {
        "preflight"
    }

    async fn execute(&self, ctx: &mut AuthzContext<'_>) -> Result<StageFlow, AccessError> {
        if ctx.signals.is_preflight() {
            Ok(StageFlow::Preflight)
        } else {
            Ok(StageFlow::Continue)
        }
    }
}

pub struct Authenticate;

#[async_trait]
impl Stage for Authenticate {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn execute(&self, ctx: &mut AuthzContext<'_>) -> Result<StageFlow, AccessError> {
        let Some(token) = ctx.bearer else {
            if ctx.policy.protected {
                return Err(AccessError::missing_credentials());
            }
            return Ok(StageFlow::Continue);
        };

        match ctx.codec.verify(token) {
            Ok(claims) => {
                ctx.token = Some(TokenRef {
                    jti: claims.jti.clone(),
                    expires_at: claims.exp,
                });
                ctx.principal = Some(claims.principal());
                Ok(StageFlow::Continue)
            }
            Err(err) if ctx.policy.protected => Err(AuthzError::Unauthenticated(Some(err)).into()),
            Err(err) => {
                debug!("Ignoring unusable token on public route: {}", err);
                Ok(StageFlow::Continue)
            }
        }
    }
}

/// Role check for the platform surface. Permission tags alone never open it.
pub struct RequireSuperAdmin;

#[async_trait]
impl Stage for RequireSuperAdmin {
    fn name(&self) -> &'static str {
        "super_admin_only"
    }

    async fn execute(&self, ctx: &mut AuthzContext<'_>) -> Result<StageFlow, AccessError> {
        if !ctx.policy.requires_super_admin {
            return Ok(StageFlow::Continue);
        }
        match ctx.principal.as_ref() {
            Some(p) if p.is_super_admin() => Ok(StageFlow::Continue),
            Some(_) => Err(AuthzError::SuperAdminRequired.into()),
            None => Err(AccessError::missing_credentials()),
        }
    }
}

pub struct ResolveTenant;

#[async_trait]
impl Stage for ResolveTenant {
    fn name(&self) -> &'static str {
        "resolve_tenant"
    }

    async fn execute(&self, ctx: &mut AuthzContext<'_>) -> Result<StageFlow, AccessError> {
        ctx.tenant = Some(TenantResolver::resolve(ctx.signals, ctx.principal.as_ref())?);
        Ok(StageFlow::Continue)
    }
}

/// Super admins are admitted here. Validity-gated routes still check the
/// resolved organization when there is one.
pub struct SuperAdminAdmit;

#[async_trait]
impl Stage for SuperAdminAdmit {
    fn name(&self) -> &'static str {
        "super_admin"
    }

    async fn execute(&self, ctx: &mut AuthzContext<'_>) -> Result<StageFlow, AccessError> {
        if !ctx.principal.as_ref().map_or(false, |p| p.is_super_admin()) {
            return Ok(StageFlow::Continue);
        }

        if ctx.policy.requires_org_validity {
            if let Some(id) = ctx.resolved_organization_id().map(str::to_string) {
                let now = ctx.now;
                let organization = ctx.organization().await?.ok_or(OrgError::NotFound(id))?;
                OrganizationRegistry::check_usable(organization, now)?;
            }
        }
        Ok(StageFlow::Admit)
    }
}

pub struct TenantBoundary;

#[async_trait]
impl Stage for TenantBoundary {
    fn name(&self) -> &'static str {
        "tenant_boundary"
    }

    async fn execute(&self, ctx: &mut AuthzContext<'_>) -> Result<StageFlow, AccessError> {
        // Public routes accept anyone, signed in to another tenant or not.
        if !ctx.policy.protected {
            return Ok(StageFlow::Continue);
        }
        let Some(principal) = ctx.principal.as_ref() else {
            return Ok(StageFlow::Continue);
        };
        if principal.organization_id.as_deref() != ctx.resolved_organization_id() {
            return Err(AuthzError::CrossTenantForbidden.into());
        }
        Ok(StageFlow::Continue)
    }
}

pub struct RequirePermission;

#[async_trait]
impl Stage for RequirePermission {
    fn name(&self) -> &'static str {
        "permission"
    }

    async fn execute(&self, ctx: &mut AuthzContext<'_>) -> Result<StageFlow, AccessError> {
        let Some(permission) = ctx.policy.permission else {
            return Ok(StageFlow::Continue);
        };
        match ctx.principal.as_ref() {
            Some(p) if p.has_permission(permission) => Ok(StageFlow::Continue),
            Some(_) => Err(AuthzError::MissingPermission(permission).into()),
            None => Err(AccessError::missing_credentials()),
        }
    }
}

pub struct RequireFeature;

#[async_trait]
impl Stage for RequireFeature {
    fn name(&self) -> &'static str {
        "feature"
    }

    async fn execute(&self, ctx: &mut AuthzContext<'_>) -> Result<StageFlow, AccessError> {
        let Some(feature) = ctx.policy.feature else {
            return Ok(StageFlow::Continue);
        };
        let id = ctx.resolved_organization_id().unwrap_or_default().to_string();
        let organization = ctx.organization().await?.ok_or(OrgError::NotFound(id))?;
        if !organization.has_feature(feature) {
            return Err(AuthzError::FeatureNotEntitled(feature).into());
        }
        Ok(StageFlow::Continue)
    }
}

pub struct RequireValidOrganization;

#[async_trait]
impl Stage for RequireValidOrganization {
    fn name(&self) -> &'static str {
        "organization_validity"
    }

    async fn execute(&self, ctx: &mut AuthzContext<'_>) -> Result<StageFlow, AccessError> {
        if !ctx.policy.requires_org_validity {
            return Ok(StageFlow::Continue);
        }
        let now = ctx.now;
        let id = ctx.resolved_organization_id().unwrap_or_default().to_string();
        let organization = ctx.organization().await?.ok_or(OrgError::NotFound(id))?;
        OrganizationRegistry::check_usable(organization, now)?;
        Ok(StageFlow::Continue)
    }
}
