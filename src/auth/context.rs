//! Request-scoped security context and authority derivation.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::jwt::Claims;

/// Authority granted to every authenticated caller.
pub const DEFAULT_AUTHORITY: &str = "ROLE_USER";

/// Prefix applied to roles read from token claims.
pub const ROLE_PREFIX: &str = "ROLE_";

/// Identity resolved from a verified token.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub subject: String,
    pub authorities: BTreeSet<String>,
    /// Claims of the token the identity came from
    pub claims: Claims,
}

impl Identity {
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

/// Who the current request is acting as.
///
/// Lives in the request's extensions: the gate stores exactly one value per
/// request and it is dropped together with the request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SecurityContext {
    #[default]
    Unauthenticated,
    Authenticated(Identity),
}

impl SecurityContext {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The resolved identity, only when authenticated.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Unauthenticated => None,
        }
    }

    pub fn into_identity(self) -> Option<Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Unauthenticated => None,
        }
    }
}

/// Derives the authority set for a verified token.
pub trait AuthorityMapper: Send + Sync {
    fn authorities(&self, claims: &Claims) -> BTreeSet<String>;
}

/// Grants [`DEFAULT_AUTHORITY`] and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAuthorities;

impl AuthorityMapper for DefaultAuthorities {
    fn authorities(&self, _claims: &Claims) -> BTreeSet<String> {
        BTreeSet::from([DEFAULT_AUTHORITY.to_string()])
    }
}

/// Grants [`DEFAULT_AUTHORITY`] plus one `ROLE_*` authority per string in an
/// array claim. Entries already carrying the prefix are kept as they are;
/// non-string and empty entries are ignored.
#[derive(Debug, Clone)]
pub struct ClaimAuthorities {
    claim: String,
}

impl ClaimAuthorities {
    pub fn new(claim: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
        }
    }
}

impl AuthorityMapper for ClaimAuthorities {
    fn authorities(&self, claims: &Claims) -> BTreeSet<String> {
        let mut authorities = DefaultAuthorities.authorities(claims);

        let roles = match claims.extra.get(&self.claim) {
            Some(Value::Array(values)) => values.as_slice(),
            _ => return authorities,
        };

        for role in roles.iter().filter_map(Value::as_str) {
            let role = role.trim();
            if role.is_empty() {
                continue;
            }
            if role.starts_with(ROLE_PREFIX) {
                authorities.insert(role.to_string());
            } else {
                authorities.insert(format!("{}{}", ROLE_PREFIX, role.to_ascii_uppercase()));
            }
        }

        authorities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn claims_with(extra: Map<String, Value>) -> Claims {
        Claims {
            subject: "alice".into(),
            issuer: None,
            audience: BTreeSet::new(),
            issued_at: Some(0),
            expires_at: 60,
            not_before: None,
            token_id: None,
            extra,
        }
    }

    #[test]
    fn test_default_authorities() {
        let authorities = DefaultAuthorities.authorities(&claims_with(Map::new()));
        assert_eq!(authorities, BTreeSet::from(["ROLE_USER".to_string()]));
    }

    #[test]
    fn test_claim_authorities() {
        let mut extra = Map::new();
        extra.insert("roles".into(), json!(["admin", "ROLE_AUDITOR", "", 5, " editor "]));

        let authorities = ClaimAuthorities::new("roles").authorities(&claims_with(extra));
        let expected: BTreeSet<String> = ["ROLE_USER", "ROLE_ADMIN", "ROLE_AUDITOR", "ROLE_EDITOR"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(authorities, expected);
    }

    #[test]
    fn test_claim_authorities_missing_or_wrong_shape() {
        let mapper = ClaimAuthorities::new("roles");
        assert_eq!(mapper.authorities(&claims_with(Map::new())).len(), 1);

        let mut extra = Map::new();
        extra.insert("roles".into(), json!("admin"));
        assert_eq!(mapper.authorities(&claims_with(extra)).len(), 1);
    }

    #[test]
    fn test_security_context_accessors() {
        let ctx = SecurityContext::default();
        assert!(!ctx.is_authenticated());
        assert!(ctx.identity().is_none());

        let identity = Identity {
            subject: "alice".into(),
            authorities: BTreeSet::from([DEFAULT_AUTHORITY.to_string()]),
            claims: claims_with(Map::new()),
        };
        let ctx = SecurityContext::Authenticated(identity);
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.identity().map(|i| i.subject.as_str()), Some("alice"));
        assert!(ctx.identity().unwrap().has_authority("ROLE_USER"));
    }
}
