//! Route exemption policy.
//!
//! An ordered list of `(method, path)` patterns decides which requests skip
//! token handling entirely. Matching is case-sensitive and the first
//! matching pattern wins.

use std::fmt;
use std::str::FromStr;

use axum::http::Method;

/// Exemptions applied when none are configured.
pub const DEFAULT_EXEMPTIONS: &[&str] = &[
    "POST /api/login",
    "/api/public*",
    "/api/static/*",
    "/api/css/*",
    "/api/js/*",
    "/api/images/*",
    "/api/fonts/*",
    "/api/favicon.ico",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodMatch {
    Any,
    Only(Method),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatch {
    Exact(String),
    /// Trailing `*`: any path starting with the prefix
    Prefix(String),
}

/// Single exemption, written as `"[METHOD ]<path>"`, e.g. `"GET /health"`,
/// `"* /public/*"` or just `"/public/*"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    method: MethodMatch,
    path: PathMatch,
}

impl RoutePattern {
    pub fn new(method: MethodMatch, path: PathMatch) -> Self {
        Self { method, path }
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        let method_ok = match &self.method {
            MethodMatch::Any => true,
            MethodMatch::Only(m) => m == method,
        };
        method_ok
            && match &self.path {
                PathMatch::Exact(p) => p == path,
                PathMatch::Prefix(prefix) => path.starts_with(prefix.as_str()),
            }
    }
}

impl FromStr for RoutePattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (method, path) = match s.split_once(char::is_whitespace) {
            Some((method, path)) => (method, path.trim()),
            None => ("*", s),
        };

        let method = if method == "*" {
            MethodMatch::Any
        } else {
            Method::from_bytes(method.as_bytes())
                .map(MethodMatch::Only)
                .map_err(|_| PatternError::InvalidMethod(method.to_string()))?
        };

        if !path.starts_with('/') {
            return Err(PatternError::InvalidPath(path.to_string()));
        }
        if path.chars().any(char::is_whitespace) {
            return Err(PatternError::InvalidPath(path.to_string()));
        }

        let path = match path.strip_suffix('*') {
            Some(prefix) if prefix.contains('*') => {
                return Err(PatternError::InvalidPath(path.to_string()));
            }
            Some(prefix) => PathMatch::Prefix(prefix.to_string()),
            None if path.contains('*') => {
                return Err(PatternError::InvalidPath(path.to_string()));
            }
            None => PathMatch::Exact(path.to_string()),
        };

        Ok(Self { method, path })
    }
}

/// What the gate should do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Skip token extraction and verification
    Exempt,
    /// Attempt authentication; a missing or bad token leaves the caller anonymous
    RequiresAuthentication,
}

#[derive(Debug, Clone, Default)]
pub struct RouteClassifier {
    patterns: Vec<RoutePattern>,
}

impl RouteClassifier {
    pub fn new(patterns: Vec<RoutePattern>) -> Self {
        Self { patterns }
    }

    /// Parse every pattern, failing on the first invalid one.
    pub fn parse<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        patterns
            .into_iter()
            .map(|p| p.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn with_defaults() -> Self {
        Self::parse(DEFAULT_EXEMPTIONS).expect("default exemptions are valid")
    }

    pub fn classify(&self, method: &Method, path: &str) -> RouteClass {
        if self.patterns.iter().any(|p| p.matches(method, path)) {
            RouteClass::Exempt
        } else {
            RouteClass::RequiresAuthentication
        }
    }

    pub fn patterns(&self) -> &[RoutePattern] {
        &self.patterns
    }
}

/// Errors from parsing an exemption pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    InvalidMethod(String),
    InvalidPath(String),
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::InvalidMethod(m) => write!(f, "Invalid HTTP method in pattern: {}", m),
            PatternError::InvalidPath(p) => write!(
                f,
                "Invalid path pattern (must start with '/', '*' only at the end): {}",
                p
            ),
        }
    }
}

impl std::error::Error for PatternError {}
