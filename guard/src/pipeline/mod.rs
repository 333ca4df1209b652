//! The per-request decision pipeline.
//!
//! The chain is an explicit ordered list of stages, each returning a tagged
//! outcome; the runner short-circuits on the first terminal outcome. Stage
//! composition lives in [`Guard`], which assembles the standard chain from
//! configuration.

mod stages;

pub use stages::{AuthenticateStage, AuthorizeStage, ClassifyStage, RateLimitStage};

use std::sync::Arc;

use async_trait::async_trait;
use auth::Principal;
use error::{AccessError, ErrorResponse};

use crate::config::{GuardConfig, RateLimitPosition};
use crate::policy::{Requirement, RoutePolicy};
use crate::rate_limit::RateLimiter;
use crate::request::GuardRequest;
use crate::routes::RouteClassifier;

/// Mutable per-request state threaded through the stages.
pub struct RequestContext {
    pub request: GuardRequest,
    /// Set by the authenticate stage; absent until then.
    pub principal: Option<Principal>,
}

impl RequestContext {
    pub fn new(request: GuardRequest) -> Self {
        Self {
            request,
            principal: None,
        }
    }
}

/// Tagged outcome of a single stage.
#[derive(Debug)]
pub enum StageOutcome {
    /// Hand the request to the next stage
    Next,
    /// Terminal: forward the request downstream
    Forward,
    /// Terminal: reject (401/403/429)
    Deny(AccessError),
    /// Terminal: server fault (500)
    Fault(AccessError),
}

/// Final verdict for one request.
#[derive(Debug)]
pub enum Decision {
    /// Forward downstream, carrying the principal (anonymous on public and
    /// optional-auth paths)
    Forward(Principal),
    /// Reject with a status code and JSON body
    Reject { status: u16, body: ErrorResponse },
}

impl Decision {
    fn reject(err: &AccessError) -> Self {
        Decision::Reject {
            status: err.status_code(),
            body: ErrorResponse::from(err),
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, Decision::Forward(_))
    }
}

/// One link in the decision chain.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name for diagnostics.
    fn name(&self) -> &'static str;

    /// Evaluate the request, possibly mutating the context.
    async fn evaluate(&self, ctx: &mut RequestContext) -> StageOutcome;
}

/// Runs stages in order until one terminates the chain.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Evaluate a request through every stage.
    pub async fn run(&self, request: GuardRequest) -> Decision {
        let mut ctx = RequestContext::new(request);

        for stage in &self.stages {
            match stage.evaluate(&mut ctx).await {
                StageOutcome::Next => {
                    tracing::debug!(stage = stage.name(), "stage passed");
                }
                StageOutcome::Forward => {
                    tracing::debug!(stage = stage.name(), "stage forwarded");
                    return Decision::Forward(
                        ctx.principal.unwrap_or_else(Principal::anonymous),
                    );
                }
                StageOutcome::Deny(err) => {
                    tracing::warn!(
                        stage = stage.name(),
                        "{} {} denied: {}",
                        ctx.request.method,
                        ctx.request.path,
                        err
                    );
                    return Decision::reject(&err);
                }
                StageOutcome::Fault(err) => {
                    tracing::error!(
                        stage = stage.name(),
                        "{} {} faulted: {}",
                        ctx.request.method,
                        ctx.request.path,
                        err
                    );
                    return Decision::reject(&err);
                }
            }
        }

        Decision::Forward(ctx.principal.unwrap_or_else(Principal::anonymous))
    }
}

/// The assembled access guard: classify, authenticate, authorize, rate-check.
///
/// Construct once at startup and share via `Arc`; the rate-window table
/// lives for the lifetime of the guard.
pub struct Guard {
    config: GuardConfig,
    classifier: Arc<RouteClassifier>,
    policies: Vec<RoutePolicy>,
    limiter: Arc<RateLimiter>,
    optional_auth: bool,
    pipeline: Pipeline,
}

impl Guard {
    /// Build the standard chain from configuration.
    pub fn new(config: GuardConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            config.rate_window_ms,
            config.rate_max_requests,
        ));
        let guard = Self {
            classifier: Arc::new(RouteClassifier::default()),
            policies: Vec::new(),
            limiter,
            optional_auth: false,
            pipeline: Pipeline::new(Vec::new()),
            config,
        };
        guard.rebuild()
    }

    /// Replace the route classifier.
    pub fn with_classifier(mut self, classifier: RouteClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self.rebuild()
    }

    /// Register a per-route authorization policy.
    pub fn with_route_policy(mut self, policy: RoutePolicy) -> Self {
        self.policies.push(policy);
        self.rebuild()
    }

    /// Switch to the optional-auth variant: authentication failures are
    /// absorbed and the request proceeds with the anonymous principal.
    pub fn with_optional_auth(mut self) -> Self {
        self.optional_auth = true;
        self.rebuild()
    }

    fn rebuild(mut self) -> Self {
        let mut stages: Vec<Box<dyn Stage>> = Vec::new();
        stages.push(Box::new(ClassifyStage::new(self.classifier.clone())));

        if self.config.rate_limit_position == RateLimitPosition::BeforeAuth {
            stages.push(Box::new(RateLimitStage::new(self.limiter.clone())));
        }

        stages.push(Box::new(AuthenticateStage::new(
            self.config.jwt_secret.clone(),
            self.config.jwt_issuer.clone(),
            !self.optional_auth,
        )));
        let default_requirement = if self.optional_auth {
            Requirement::AllowAny
        } else {
            Requirement::Authenticated
        };
        stages.push(Box::new(AuthorizeStage::new(
            Arc::new(self.policies.clone()),
            default_requirement,
        )));

        if self.config.rate_limit_position == RateLimitPosition::AfterAuthz {
            stages.push(Box::new(RateLimitStage::new(self.limiter.clone())));
        }

        self.pipeline = Pipeline::new(stages);
        self
    }

    /// Evaluate one request to a final decision.
    pub async fn evaluate(&self, request: GuardRequest) -> Decision {
        self.pipeline.run(request).await
    }
}
