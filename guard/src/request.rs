//! Inbound request descriptor consumed by the guard pipeline.

use error::AuthError;

/// The slice of an inbound request the access layer looks at.
#[derive(Debug, Clone)]
pub struct GuardRequest {
    /// HTTP method, uppercase
    pub method: String,
    /// Request path without query string
    pub path: String,
    /// Raw `Authorization` header value, if present
    pub authorization: Option<String>,
    /// Client identifier used for rate limiting (remote address or equivalent)
    pub client_key: String,
}

impl GuardRequest {
    /// Create a new request descriptor.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        authorization: Option<String>,
        client_key: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            authorization,
            client_key: client_key.into(),
        }
    }

    /// Extract the bearer token from the `Authorization` header.
    ///
    /// `Ok(None)` means no header was supplied at all; a header that is
    /// present but not a bearer credential is an invalid token.
    pub fn bearer_token(&self) -> Result<Option<&str>, AuthError> {
        match &self.authorization {
            None => Ok(None),
            Some(header) => header
                .strip_prefix("Bearer ")
                .map(Some)
                .ok_or(AuthError::InvalidToken),
        }
    }
}
