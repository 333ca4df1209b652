//! Authorization rules evaluated against a verified principal.

use std::sync::Arc;

use async_trait::async_trait;
use auth::{Principal, Role};
use error::{AccessError, AuthError};
use thiserror::Error;

use crate::request::GuardRequest;

/// Failure inside an ownership resolver (external store unreachable, bad
/// data, and so on). Surfaces as a server fault, never as a deny.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ResolverError(pub String);

/// Capability interface answering "who owns the resource this request
/// targets?". Injected per protected route.
#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    /// Resolve the owner id for the addressed resource, or `None` when the
    /// resource has no owner.
    async fn owner_id(&self, request: &GuardRequest) -> Result<Option<String>, ResolverError>;
}

/// Require the principal's role to rank at or above `required`.
pub fn require_role(principal: &Principal, required: Role) -> Result<(), AccessError> {
    if principal.role >= required {
        Ok(())
    } else {
        Err(AccessError::InsufficientRole {
            required: required.to_string(),
            current: principal.role.to_string(),
        })
    }
}

/// Require a single permission.
pub fn require_permission(principal: &Principal, permission: &str) -> Result<(), AccessError> {
    if principal.has_permission(permission) {
        Ok(())
    } else {
        Err(AccessError::InsufficientPermission {
            required: vec![permission.to_string()],
            held: held_permissions(principal),
        })
    }
}

/// Require at least one of the listed permissions.
pub fn require_any_permission(
    principal: &Principal,
    permissions: &[String],
) -> Result<(), AccessError> {
    if permissions.iter().any(|p| principal.has_permission(p)) {
        Ok(())
    } else {
        Err(AccessError::InsufficientPermission {
            required: permissions.to_vec(),
            held: held_permissions(principal),
        })
    }
}

/// Grant the resource owner unconditionally; everyone else falls back to a
/// role check. A resolver failure is an internal fault, not a deny.
pub async fn require_ownership_or_role(
    resolver: &dyn OwnershipResolver,
    principal: &Principal,
    request: &GuardRequest,
    fallback: Role,
) -> Result<(), AccessError> {
    match resolver.owner_id(request).await {
        Ok(Some(owner)) if !principal.is_anonymous() && owner == principal.user_id => Ok(()),
        Ok(_) => require_role(principal, fallback),
        Err(e) => {
            tracing::error!("Ownership resolver failed: {}", e);
            Err(AccessError::OwnershipCheckFailed(e.to_string()))
        }
    }
}

fn held_permissions(principal: &Principal) -> Vec<String> {
    let mut held: Vec<String> = principal.permissions.iter().cloned().collect();
    held.sort();
    held
}

/// What a protected route demands beyond a valid token.
#[derive(Clone)]
pub enum Requirement {
    /// Any request, anonymous included (the optional-auth default)
    AllowAny,
    /// Any non-anonymous principal
    Authenticated,
    /// Role at or above the given tier
    Role(Role),
    /// A specific permission
    Permission(String),
    /// At least one of the listed permissions
    AnyPermission(Vec<String>),
    /// Resource owner, or the fallback role for everyone else
    OwnerOrRole {
        resolver: Arc<dyn OwnershipResolver>,
        fallback: Role,
    },
}

impl Requirement {
    /// Evaluate this requirement for a request.
    pub async fn evaluate(
        &self,
        principal: &Principal,
        request: &GuardRequest,
    ) -> Result<(), AccessError> {
        match self {
            Requirement::AllowAny => Ok(()),
            Requirement::Authenticated => {
                if principal.is_anonymous() {
                    Err(AuthError::MissingToken.into())
                } else {
                    Ok(())
                }
            }
            Requirement::Role(role) => require_role(principal, *role),
            Requirement::Permission(permission) => require_permission(principal, permission),
            Requirement::AnyPermission(permissions) => {
                require_any_permission(principal, permissions)
            }
            Requirement::OwnerOrRole { resolver, fallback } => {
                require_ownership_or_role(resolver.as_ref(), principal, request, *fallback).await
            }
        }
    }
}

/// Binds a requirement to a (method, path-prefix) pair.
#[derive(Clone)]
pub struct RoutePolicy {
    pub method: String,
    pub prefix: String,
    pub requirement: Requirement,
}

impl RoutePolicy {
    /// Create a new route policy.
    pub fn new(
        method: impl Into<String>,
        prefix: impl Into<String>,
        requirement: Requirement,
    ) -> Self {
        Self {
            method: method.into(),
            prefix: prefix.into(),
            requirement,
        }
    }

    /// Whether this policy applies to the given request line.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.method == method && path.starts_with(self.prefix.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn principal(user_id: &str, role: Role, perms: &[&str]) -> Principal {
        Principal {
            user_id: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            role,
            permissions: perms.iter().map(|p| p.to_string()).collect::<HashSet<_>>(),
        }
    }

    fn request() -> GuardRequest {
        GuardRequest::new("PATCH", "/incidents/42", None, "10.0.0.1")
    }

    struct FixedOwner(Option<String>);

    #[async_trait]
    impl OwnershipResolver for FixedOwner {
        async fn owner_id(&self, _request: &GuardRequest) -> Result<Option<String>, ResolverError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenResolver;

    #[async_trait]
    impl OwnershipResolver for BrokenResolver {
        async fn owner_id(&self, _request: &GuardRequest) -> Result<Option<String>, ResolverError> {
            Err(ResolverError("incident store unreachable".to_string()))
        }
    }

    #[test]
    fn test_require_role_respects_hierarchy() {
        let viewer = principal("u1", Role::Viewer, &[]);
        let reporter = principal("u2", Role::Reporter, &[]);
        let admin = principal("u3", Role::Admin, &[]);

        assert!(require_role(&viewer, Role::Reporter).is_err());
        assert!(require_role(&reporter, Role::Reporter).is_ok());
        assert!(require_role(&admin, Role::Reporter).is_ok());
    }

    #[test]
    fn test_require_role_reports_both_roles() {
        let viewer = principal("u1", Role::Viewer, &[]);
        match require_role(&viewer, Role::Admin).unwrap_err() {
            AccessError::InsufficientRole { required, current } => {
                assert_eq!(required, "admin");
                assert_eq!(current, "viewer");
            }
            other => panic!("Expected InsufficientRole, got {:?}", other),
        }
    }

    #[test]
    fn test_require_permission() {
        let reporter = principal("u1", Role::Reporter, &["report_incidents"]);
        assert!(require_permission(&reporter, "report_incidents").is_ok());

        match require_permission(&reporter, "manage_users").unwrap_err() {
            AccessError::InsufficientPermission { required, held } => {
                assert_eq!(required, vec!["manage_users".to_string()]);
                assert_eq!(held, vec!["report_incidents".to_string()]);
            }
            other => panic!("Expected InsufficientPermission, got {:?}", other),
        }
    }

    #[test]
    fn test_require_any_permission() {
        let reporter = principal("u1", Role::Reporter, &["view_incidents"]);
        let wanted = vec!["manage_incidents".to_string(), "view_incidents".to_string()];
        assert!(require_any_permission(&reporter, &wanted).is_ok());

        let wanted = vec!["manage_incidents".to_string(), "manage_users".to_string()];
        assert!(require_any_permission(&reporter, &wanted).is_err());
    }

    #[tokio::test]
    async fn test_owner_is_allowed_regardless_of_role() {
        let viewer = principal("u1", Role::Viewer, &[]);
        let resolver = FixedOwner(Some("u1".to_string()));
        let result =
            require_ownership_or_role(&resolver, &viewer, &request(), Role::Admin).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_non_owner_falls_back_to_role() {
        let viewer = principal("u1", Role::Viewer, &[]);
        let admin = principal("u2", Role::Admin, &[]);
        let resolver = FixedOwner(Some("someone-else".to_string()));

        let result =
            require_ownership_or_role(&resolver, &viewer, &request(), Role::Admin).await;
        assert!(matches!(
            result.unwrap_err(),
            AccessError::InsufficientRole { .. }
        ));

        let result = require_ownership_or_role(&resolver, &admin, &request(), Role::Admin).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unowned_resource_falls_back_to_role() {
        let reporter = principal("u1", Role::Reporter, &[]);
        let resolver = FixedOwner(None);
        let result =
            require_ownership_or_role(&resolver, &reporter, &request(), Role::Reporter).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_resolver_failure_is_fault_not_deny() {
        let admin = principal("u1", Role::Admin, &[]);
        let result =
            require_ownership_or_role(&BrokenResolver, &admin, &request(), Role::Viewer).await;
        match result.unwrap_err() {
            AccessError::OwnershipCheckFailed(msg) => {
                assert!(msg.contains("unreachable"));
            }
            other => panic!("Expected OwnershipCheckFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_anonymous_never_matches_owner() {
        // An unowned resource resolving to an empty id must not pair with
        // the anonymous principal's empty user id.
        let anon = Principal::anonymous();
        let resolver = FixedOwner(Some(String::new()));
        let result = require_ownership_or_role(&resolver, &anon, &request(), Role::Admin).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_route_policy_matching() {
        let policy = RoutePolicy::new("POST", "/incidents", Requirement::Authenticated);
        assert!(policy.matches("POST", "/incidents"));
        assert!(policy.matches("POST", "/incidents/42/comments"));
        assert!(!policy.matches("GET", "/incidents"));
        assert!(!policy.matches("POST", "/users"));
    }
}
