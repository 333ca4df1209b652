//! Guard configuration.

use auth::JwtConfig;
use serde::{Deserialize, Serialize};

/// Where the rate-check stage sits in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPosition {
    /// Right after classification, shielding the token layer itself
    BeforeAuth,
    /// After authorization, the standard chain
    AfterAuthz,
}

/// Access-guard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// HMAC signing secret for token verification (supplied externally;
    /// an empty value faults every protected request)
    pub jwt_secret: String,

    /// Expected token issuer
    pub jwt_issuer: String,

    /// Validity of freshly minted tokens, in seconds
    pub token_ttl_secs: i64,

    /// Rate-limit window length in milliseconds
    pub rate_window_ms: i64,

    /// Maximum requests per client per window
    pub rate_max_requests: u32,

    /// Rate-check placement in the chain
    pub rate_limit_position: RateLimitPosition,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_issuer: "incident-api".to_string(),
            token_ttl_secs: 3600,
            rate_window_ms: 60_000,
            rate_max_requests: 100,
            rate_limit_position: RateLimitPosition::AfterAuthz,
        }
    }
}

impl GuardConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(secret) = std::env::var("GUARD_JWT_SECRET") {
            config.jwt_secret = secret;
        }

        if let Ok(issuer) = std::env::var("GUARD_JWT_ISSUER") {
            config.jwt_issuer = issuer;
        }

        if let Ok(ttl) = std::env::var("GUARD_TOKEN_TTL_SECS") {
            if let Ok(n) = ttl.parse() {
                config.token_ttl_secs = n;
            }
        }

        if let Ok(window) = std::env::var("GUARD_RATE_WINDOW_MS") {
            if let Ok(n) = window.parse() {
                config.rate_window_ms = n;
            }
        }

        if let Ok(max) = std::env::var("GUARD_RATE_MAX_REQUESTS") {
            if let Ok(n) = max.parse() {
                config.rate_max_requests = n;
            }
        }

        config
    }

    /// Set the signing secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = secret.into();
        self
    }

    /// Set the expected issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.jwt_issuer = issuer.into();
        self
    }

    /// Set the rate-limit window and budget.
    pub fn with_rate_limit(mut self, window_ms: i64, max_requests: u32) -> Self {
        self.rate_window_ms = window_ms;
        self.rate_max_requests = max_requests;
        self
    }

    /// Set the rate-check placement.
    pub fn with_rate_limit_position(mut self, position: RateLimitPosition) -> Self {
        self.rate_limit_position = position;
        self
    }

    /// Token settings as a [`JwtConfig`] for the auth crate's helpers.
    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::new(
            self.jwt_secret.clone(),
            self.jwt_issuer.clone(),
            self.token_ttl_secs,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GuardConfig::default();
        assert!(config.jwt_secret.is_empty());
        assert_eq!(config.jwt_issuer, "incident-api");
        assert_eq!(config.rate_window_ms, 60_000);
        assert_eq!(config.rate_max_requests, 100);
        assert_eq!(config.rate_limit_position, RateLimitPosition::AfterAuthz);
    }

    #[test]
    fn test_builder_methods() {
        let config = GuardConfig::default()
            .with_secret("s3cret")
            .with_issuer("test-issuer")
            .with_rate_limit(1_000, 5)
            .with_rate_limit_position(RateLimitPosition::BeforeAuth);

        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.jwt_issuer, "test-issuer");
        assert_eq!(config.rate_window_ms, 1_000);
        assert_eq!(config.rate_max_requests, 5);
        assert_eq!(config.rate_limit_position, RateLimitPosition::BeforeAuth);

        let jwt = config.jwt_config();
        assert_eq!(jwt.secret, "s3cret");
        assert_eq!(jwt.issuer, "test-issuer");
    }
}
