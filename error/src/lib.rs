//! Common error types for the access-control layer.
//!
//! Every rejection the guard can produce lives here, together with the JSON
//! body sent to clients and the HTTP status mapping.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token verification failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization token missing")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token creation failed")]
    TokenCreationFailed,
}

/// Everything the guard pipeline can reject or fault with.
///
/// `OwnershipCheckFailed` and `Misconfigured` are server faults (500), never
/// authorization denials; the distinction must survive to the status mapping.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Requires {required} role, current role is {current}")]
    InsufficientRole { required: String, current: String },

    #[error("Missing required permission")]
    InsufficientPermission {
        required: Vec<String>,
        held: Vec<String>,
    },

    #[error("Ownership check failed: {0}")]
    OwnershipCheckFailed(String),

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: i64 },

    #[error("Policy misconfigured: {0}")]
    Misconfigured(String),
}

impl AccessError {
    /// HTTP status code this error maps to.
    pub fn status_code(&self) -> u16 {
        match self {
            AccessError::Auth(AuthError::TokenCreationFailed) => 500,
            AccessError::Auth(_) => 401,
            AccessError::InsufficientRole { .. } => 403,
            AccessError::InsufficientPermission { .. } => 403,
            AccessError::OwnershipCheckFailed(_) => 500,
            AccessError::RateLimitExceeded { .. } => 429,
            AccessError::Misconfigured(_) => 500,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::Auth(AuthError::MissingToken) => "TOKEN_MISSING",
            AccessError::Auth(AuthError::InvalidToken) => "TOKEN_INVALID",
            AccessError::Auth(AuthError::TokenExpired) => "TOKEN_EXPIRED",
            AccessError::Auth(AuthError::TokenCreationFailed) => "TOKEN_CREATION_FAILED",
            AccessError::InsufficientRole { .. } => "INSUFFICIENT_ROLE",
            AccessError::InsufficientPermission { .. } => "INSUFFICIENT_PERMISSION",
            AccessError::OwnershipCheckFailed(_) => "OWNERSHIP_CHECK_FAILED",
            AccessError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AccessError::Misconfigured(_) => "POLICY_MISCONFIGURED",
        }
    }
}

/// Standard reason phrase for the statuses the guard emits.
fn status_text(status: u16) -> &'static str {
    match status {
        401 => "Unauthorized",
        403 => "Forbidden",
        429 => "Too Many Requests",
        _ => "Internal Server Error",
    }
}

/// Error response body for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Reason phrase matching the HTTP status
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for programmatic handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// What the rejected check required (role name or permission list)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<serde_json::Value>,
    /// What the principal actually held
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<serde_json::Value>,
    /// Seconds until the rate window resets
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<i64>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            code: None,
            required: None,
            current: None,
            retry_after: None,
        }
    }
}

impl From<&AccessError> for ErrorResponse {
    fn from(err: &AccessError) -> Self {
        let mut body = ErrorResponse::new(status_text(err.status_code()), err.to_string());
        body.code = Some(err.code().to_string());

        match err {
            AccessError::InsufficientRole { required, current } => {
                body.required = Some(serde_json::json!(required));
                body.current = Some(serde_json::json!(current));
            }
            AccessError::InsufficientPermission { required, held } => {
                body.required = Some(serde_json::json!(required));
                body.current = Some(serde_json::json!(held));
            }
            AccessError::RateLimitExceeded { retry_after_secs } => {
                body.retry_after = Some(*retry_after_secs);
            }
            _ => {}
        }

        body
    }
}

/// Result type alias using AccessError.
pub type Result<T> = std::result::Result<T, AccessError>;
