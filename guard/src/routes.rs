//! Route classification against the public allowlist.
//!
//! Anything not explicitly allowlisted is Protected; classification never
//! fails open.

/// Whether a route requires authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected,
}

/// A single classification rule, loaded once at startup.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub method: String,
    pub prefix: String,
    pub class: RouteClass,
}

impl RouteRule {
    /// Allowlist entry for a public route.
    pub fn public(method: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            prefix: prefix.into(),
            class: RouteClass::Public,
        }
    }
}

/// Classifies (method, path) pairs against two static allowlist tables.
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    get_public: Vec<String>,
    post_public: Vec<String>,
}

impl RouteClassifier {
    /// Build the classifier from startup rules.
    ///
    /// Only GET and POST carry public tables; a Public rule for any other
    /// method is ignored, leaving those routes Protected.
    pub fn new(rules: Vec<RouteRule>) -> Self {
        let mut get_public = Vec::new();
        let mut post_public = Vec::new();

        for rule in rules {
            if rule.class != RouteClass::Public {
                continue;
            }
            match rule.method.as_str() {
                "GET" => get_public.push(rule.prefix),
                "POST" => post_public.push(rule.prefix),
                other => {
                    tracing::warn!(
                        "Ignoring public route rule for unsupported method {} {}",
                        other,
                        rule.prefix
                    );
                }
            }
        }

        Self { get_public, post_public }
    }

    /// Classify an inbound (method, path) pair.
    pub fn classify(&self, method: &str, path: &str) -> RouteClass {
        let table = match method {
            "GET" => &self.get_public,
            "POST" => &self.post_public,
            _ => return RouteClass::Protected,
        };

        if table.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            RouteClass::Public
        } else {
            RouteClass::Protected
        }
    }
}

impl Default for RouteClassifier {
    /// Stock allowlist for the monitoring API.
    fn default() -> Self {
        Self::new(vec![
            RouteRule::public("GET", "/system-status"),
            RouteRule::public("GET", "/status-badge"),
            RouteRule::public("POST", "/auth/login"),
            RouteRule::public("POST", "/auth/refresh"),
        ])
    }
}
