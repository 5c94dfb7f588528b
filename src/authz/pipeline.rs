use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::error::AccessError;
use super::policy::RoutePolicy;
use crate::auth::{Principal, TokenCodec};
use crate::database::models::Organization;
use crate::services::OrganizationRegistry;
use crate::tenant::{RequestSignals, TenantContext};

/// What a stage tells the pipeline to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageFlow {
    Continue,
    /// Admit now and skip the remaining stages.
    Admit,
    /// CORS pre-flight; no authorization at all.
    Preflight,
}

/// One step of the authorization decision. Stages run in registration order
/// and the first error wins.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &mut AuthzContext<'_>) -> Result<StageFlow, AccessError>;
}

pub type StageBox = Box<dyn Stage>;

/// Identifies the token a request was admitted with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRef {
    pub jti: String,
    pub expires_at: i64,
}

/// Result of a successful authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub principal: Option<Principal>,
    pub resolved_organization_id: Option<String>,
    pub is_super_admin_bypass: bool,
    pub token: Option<TokenRef>,
}

impl Decision {
    pub fn is_super_admin(&self) -> bool {
        self.principal.as_ref().map_or(false, Principal::is_super_admin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Preflight,
    Admitted(Decision),
}

/// Mutable per-request state threaded through the stages.
pub struct AuthzContext<'a> {
    pub signals: &'a RequestSignals,
    pub bearer: Option<&'a str>,
    pub policy: &'a RoutePolicy,
    pub codec: &'a TokenCodec,
    pub now: DateTime<Utc>,
    pub principal: Option<Principal>,
    pub token: Option<TokenRef>,
    pub tenant: Option<TenantContext>,
    registry: &'a OrganizationRegistry,
    organization: Option<Option<Organization>>,
}

impl<'a> AuthzContext<'a> {
    pub fn new(
        signals: &'a RequestSignals,
        bearer: Option<&'a str>,
        policy: &'a RoutePolicy,
        codec: &'a TokenCodec,
        registry: &'a OrganizationRegistry,
    ) -> Self {
        Self {
            signals,
            bearer,
            policy,
            codec,
            now: Utc::now(),
            principal: None,
            token: None,
            tenant: None,
            registry,
            organization: None,
        }
    }

    pub fn resolved_organization_id(&self) -> Option<&str> {
        self.tenant
            .as_ref()
            .and_then(|t| t.resolved_organization_id.as_deref())
    }

    /// Loads the resolved organization on first use and reuses it for the
    /// rest of this request.
    pub async fn organization(&mut self) -> Result<Option<&Organization>, AccessError> {
        if self.organization.is_none() {
            let loaded = match self.resolved_organization_id().map(str::to_string) {
                Some(id) => self.registry.load(&id).await?,
                None => None,
            };
            self.organization = Some(loaded);
        }
        Ok(self.organization.as_ref().and_then(Option::as_ref))
    }

    pub fn decision(&self) -> Decision {
        let tenant = self.tenant.clone().unwrap_or(TenantContext {
            resolved_organization_id: None,
            is_super_admin_bypass: false,
        });
        Decision {
            principal: self.principal.clone(),
            resolved_organization_id: tenant.resolved_organization_id,
            is_super_admin_bypass: tenant.is_super_admin_bypass,
            token: self.token.clone(),
        }
    }
}

/// Ordered authorization stages.
pub struct AuthzPipeline {
    stages: Vec<StageBox>,
}

impl AuthzPipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    pub fn register(&mut self, stage: StageBox) {
        debug!("Registered authorization stage '{}'", stage.name());
        self.stages.push(stage);
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn evaluate(&self, ctx: &mut AuthzContext<'_>) -> Result<Outcome, AccessError> {
        for stage in &self.stages {
            match stage.execute(ctx).await {
                Ok(StageFlow::Continue) => continue,
                Ok(StageFlow::Preflight) => {
                    debug!("Pre-flight request, authorization skipped");
                    return Ok(Outcome::Preflight);
                }
                Ok(StageFlow::Admit) => {
                    debug!("Admitted at stage '{}'", stage.name());
                    return Ok(Outcome::Admitted(ctx.decision()));
                }
                Err(err) => {
                    warn!("Denied at stage '{}': {}", stage.name(), err);
                    return Err(err);
                }
            }
        }
        Ok(Outcome::Admitted(ctx.decision()))
    }
}

impl Default for AuthzPipeline {
    fn default() -> Self {
        Self::new()
    }
}
