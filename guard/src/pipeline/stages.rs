//! The four stages of the standard chain.

use std::sync::Arc;

use async_trait::async_trait;
use auth::{decode_token, Principal};
use error::{AccessError, AuthError};

use super::{RequestContext, Stage, StageOutcome};
use crate::policy::{Requirement, RoutePolicy};
use crate::rate_limit::RateLimiter;
use crate::routes::{RouteClass, RouteClassifier};

/// Forwards public routes untouched; everything else continues down the
/// chain.
pub struct ClassifyStage {
    classifier: Arc<RouteClassifier>,
}

impl ClassifyStage {
    pub fn new(classifier: Arc<RouteClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Stage for ClassifyStage {
    fn name(&self) -> &'static str {
        "classify"
    }

    async fn evaluate(&self, ctx: &mut RequestContext) -> StageOutcome {
        match self
            .classifier
            .classify(&ctx.request.method, &ctx.request.path)
        {
            RouteClass::Public => StageOutcome::Forward,
            RouteClass::Protected => StageOutcome::Next,
        }
    }
}

/// Verifies the bearer token and attaches the principal.
///
/// With `enforce` off (the optional-auth variant) every verification
/// failure is absorbed and the anonymous principal is attached instead.
pub struct AuthenticateStage {
    secret: String,
    issuer: String,
    enforce: bool,
}

impl AuthenticateStage {
    pub fn new(secret: String, issuer: String, enforce: bool) -> Self {
        Self {
            secret,
            issuer,
            enforce,
        }
    }

    fn failed(&self, ctx: &mut RequestContext, err: AuthError) -> StageOutcome {
        if self.enforce {
            StageOutcome::Deny(err.into())
        } else {
            ctx.principal = Some(Principal::anonymous());
            StageOutcome::Next
        }
    }
}

#[async_trait]
impl Stage for AuthenticateStage {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn evaluate(&self, ctx: &mut RequestContext) -> StageOutcome {
        if self.secret.is_empty() {
            return StageOutcome::Fault(AccessError::Misconfigured(
                "JWT signing secret is not configured".to_string(),
            ));
        }

        let token = match ctx.request.bearer_token() {
            Ok(token) => token,
            Err(err) => return self.failed(ctx, err),
        };

        match token {
            None => self.failed(ctx, AuthError::MissingToken),
            Some(token) => match decode_token(token, &self.secret, &self.issuer) {
                Ok(claims) => {
                    ctx.principal = Some(claims.into_principal());
                    StageOutcome::Next
                }
                Err(err) => self.failed(ctx, err),
            },
        }
    }
}

/// Evaluates the route's requirement against the attached principal.
///
/// Routes with no registered policy fall back to `default_requirement`:
/// `Authenticated` in the standard chain, `AllowAny` in the optional-auth
/// variant.
pub struct AuthorizeStage {
    policies: Arc<Vec<RoutePolicy>>,
    default_requirement: Requirement,
}

impl AuthorizeStage {
    pub fn new(policies: Arc<Vec<RoutePolicy>>, default_requirement: Requirement) -> Self {
        Self {
            policies,
            default_requirement,
        }
    }
}

#[async_trait]
impl Stage for AuthorizeStage {
    fn name(&self) -> &'static str {
        "authorize"
    }

    async fn evaluate(&self, ctx: &mut RequestContext) -> StageOutcome {
        let principal = ctx
            .principal
            .clone()
            .unwrap_or_else(Principal::anonymous);

        let matched = self
            .policies
            .iter()
            .find(|policy| policy.matches(&ctx.request.method, &ctx.request.path));

        let result = match matched {
            Some(policy) => policy.requirement.evaluate(&principal, &ctx.request).await,
            None => {
                self.default_requirement
                    .evaluate(&principal, &ctx.request)
                    .await
            }
        };

        match result {
            Ok(()) => StageOutcome::Next,
            Err(err @ AccessError::OwnershipCheckFailed(_)) => StageOutcome::Fault(err),
            Err(err) => StageOutcome::Deny(err),
        }
    }
}

/// Applies the per-client window check.
pub struct RateLimitStage {
    limiter: Arc<RateLimiter>,
}

impl RateLimitStage {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_check"
    }

    async fn evaluate(&self, ctx: &mut RequestContext) -> StageOutcome {
        match self.limiter.check(&ctx.request.client_key) {
            Ok(()) => StageOutcome::Next,
            Err(err) => StageOutcome::Deny(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::GuardRequest;
    use auth::{encode_token, Claims, Role};

    const SECRET: &str = "stage-test-secret";
    const ISSUER: &str = "incident-api";

    fn ctx(method: &str, path: &str, authorization: Option<String>) -> RequestContext {
        RequestContext::new(GuardRequest::new(method, path, authorization, "10.0.0.1"))
    }

    fn bearer(role: Role, expires_in_secs: i64) -> String {
        let claims = Claims::new(
            "user123",
            "user123@example.com",
            role,
            vec!["view_incidents".to_string()],
            ISSUER,
            expires_in_secs,
        );
        format!("Bearer {}", encode_token(&claims, SECRET).unwrap())
    }

    #[tokio::test]
    async fn test_classify_stage_forwards_public() {
        let stage = ClassifyStage::new(Arc::new(RouteClassifier::default()));

        let mut c = ctx("GET", "/system-status", None);
        assert!(matches!(stage.evaluate(&mut c).await, StageOutcome::Forward));

        let mut c = ctx("POST", "/incidents", None);
        assert!(matches!(stage.evaluate(&mut c).await, StageOutcome::Next));
    }

    #[tokio::test]
    async fn test_authenticate_stage_denies_missing_token() {
        let stage = AuthenticateStage::new(SECRET.to_string(), ISSUER.to_string(), true);
        let mut c = ctx("POST", "/incidents", None);

        match stage.evaluate(&mut c).await {
            StageOutcome::Deny(AccessError::Auth(AuthError::MissingToken)) => {}
            other => panic!("Expected MissingToken deny, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_authenticate_stage_attaches_principal() {
        let stage = AuthenticateStage::new(SECRET.to_string(), ISSUER.to_string(), true);
        let mut c = ctx("POST", "/incidents", Some(bearer(Role::Reporter, 3600)));

        assert!(matches!(stage.evaluate(&mut c).await, StageOutcome::Next));
        assert_eq!(c.principal.unwrap().user_id, "user123");
    }

    #[tokio::test]
    async fn test_authenticate_stage_optional_absorbs_failure() {
        let stage = AuthenticateStage::new(SECRET.to_string(), ISSUER.to_string(), false);
        let mut c = ctx("GET", "/dashboard", Some(bearer(Role::Reporter, -3600)));

        assert!(matches!(stage.evaluate(&mut c).await, StageOutcome::Next));
        assert!(c.principal.unwrap().is_anonymous());
    }

    #[tokio::test]
    async fn test_authenticate_stage_faults_without_secret() {
        let stage = AuthenticateStage::new(String::new(), ISSUER.to_string(), true);
        let mut c = ctx("POST", "/incidents", None);

        match stage.evaluate(&mut c).await {
            StageOutcome::Fault(AccessError::Misconfigured(_)) => {}
            other => panic!("Expected misconfiguration fault, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_authorize_stage_default_requires_identity() {
        let stage = AuthorizeStage::new(Arc::new(Vec::new()), Requirement::Authenticated);

        let mut c = ctx("POST", "/incidents", None);
        c.principal = Some(Principal::anonymous());
        match stage.evaluate(&mut c).await {
            StageOutcome::Deny(AccessError::Auth(AuthError::MissingToken)) => {}
            other => panic!("Expected deny for anonymous, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_authorize_stage_enforces_matched_policy() {
        let policies = vec![RoutePolicy::new(
            "POST",
            "/incidents",
            Requirement::Role(Role::Admin),
        )];
        let stage = AuthorizeStage::new(Arc::new(policies), Requirement::Authenticated);

        let mut c = ctx("POST", "/incidents", None);
        c.principal = Some(Principal {
            user_id: "user123".to_string(),
            email: "user123@example.com".to_string(),
            role: Role::Reporter,
            permissions: Default::default(),
        });

        match stage.evaluate(&mut c).await {
            StageOutcome::Deny(AccessError::InsufficientRole { .. }) => {}
            other => panic!("Expected role deny, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_stage() {
        let stage = RateLimitStage::new(Arc::new(RateLimiter::new(60_000, 1)));

        let mut c = ctx("POST", "/incidents", None);
        assert!(matches!(stage.evaluate(&mut c).await, StageOutcome::Next));
        match stage.evaluate(&mut c).await {
            StageOutcome::Deny(AccessError::RateLimitExceeded { .. }) => {}
            other => panic!("Expected throttle deny, got {:?}", other),
        }
    }
}
