// Authorization evaluator
//
// An explicit ordered pipeline of decision stages. Each request is evaluated
// from scratch: token, tenant and organization are never cached.

pub mod error;
pub mod pipeline;
pub mod policy;
pub mod stages;

use std::sync::Arc;

pub use error::{AccessError, AuthzError};
pub use pipeline::{AuthzContext, AuthzPipeline, Decision, Outcome, Stage, StageFlow, TokenRef};
pub use policy::RoutePolicy;

use crate::auth::TokenCodec;
use crate::services::OrganizationRegistry;
use crate::tenant::RequestSignals;

#[derive(Clone)]
pub struct AuthorizationEvaluator {
    codec: TokenCodec,
    registry: OrganizationRegistry,
    pipeline: Arc<AuthzPipeline>,
}

impl AuthorizationEvaluator {
    pub fn new(codec: TokenCodec, registry: OrganizationRegistry) -> Self {
        let mut pipeline = AuthzPipeline::new();
        for stage in stages::standard_stages() {
            pipeline.register(stage);
        }
        Self::with_pipeline(codec, registry, pipeline)
    }

    pub fn with_pipeline(codec: TokenCodec, registry: OrganizationRegistry, pipeline: AuthzPipeline) -> Self {
        Self {
            codec,
            registry,
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.stage_names()
    }

    pub async fn evaluate(
        &self,
        signals: &RequestSignals,
        bearer: Option<&str>,
        policy: &RoutePolicy,
    ) -> Result<Outcome, AccessError> {
        let mut ctx = AuthzContext::new(signals, bearer, policy, &self.codec, &self.registry);
        self.pipeline.evaluate(&mut ctx).await
    }
}
