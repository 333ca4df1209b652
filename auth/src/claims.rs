//! JWT claims, role hierarchy, and the verified principal.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed catalog of permissions the platform recognizes. A verified
/// principal never holds a permission outside this set.
pub const PERMISSION_CATALOG: [&str; 5] = [
    "view_incidents",
    "report_incidents",
    "manage_incidents",
    "manage_users",
    "view_audit_log",
];

/// User roles, ordered by privilege: `Viewer < Reporter < Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access
    Viewer,
    /// Can report and update own incidents
    Reporter,
    /// Administrator with full access
    Admin,
}

impl Role {
    /// Numeric rank in the hierarchy (viewer=1, reporter=2, admin=3).
    pub fn rank(&self) -> u8 {
        match self {
            Role::Viewer => 1,
            Role::Reporter => 2,
            Role::Admin => 3,
        }
    }

    /// Lowercase wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Reporter => "reporter",
            Role::Admin => "admin",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Viewer
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User's email address
    pub email: String,
    /// User's role
    pub role: Role,
    /// Granted permissions
    pub perms: Vec<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Create new claims for a user.
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        role: Role,
        perms: Vec<String>,
        issuer: impl Into<String>,
        expires_in_secs: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.into(),
            email: email.into(),
            role,
            perms,
            exp: now + expires_in_secs,
            iat: now,
            iss: issuer.into(),
        }
    }

    /// Check if the claims have expired.
    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp() > self.exp
    }

    /// Convert verified claims into a request principal.
    ///
    /// Permissions outside the catalog are dropped so the principal's set
    /// stays a subset of [`PERMISSION_CATALOG`].
    pub fn into_principal(self) -> Principal {
        let mut permissions = HashSet::new();
        for perm in self.perms {
            if PERMISSION_CATALOG.contains(&perm.as_str()) {
                permissions.insert(perm);
            } else {
                tracing::warn!("Dropping unknown permission from token: {}", perm);
            }
        }
        Principal {
            user_id: self.sub,
            email: self.email,
            role: self.role,
            permissions,
        }
    }
}

/// The authenticated identity attached to a request.
///
/// Produced only by successful token verification (or the anonymous
/// constructor on optional-auth routes); immutable for the lifetime of one
/// request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub permissions: HashSet<String>,
}

impl Principal {
    /// The empty principal used when an optional-auth route proceeds
    /// without identity.
    pub fn anonymous() -> Self {
        Self {
            user_id: String::new(),
            email: String::new(),
            role: Role::Viewer,
            permissions: HashSet::new(),
        }
    }

    /// Whether this is the anonymous principal.
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_empty()
    }

    /// Check membership in the principal's permission set.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}
