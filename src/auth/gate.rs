//! Per-request authentication gate.
//!
//! Runs once per request, before routing:
//! route check -> token extraction -> verification -> dispatch.
//! The gate never rejects a request itself. It stores a [`SecurityContext`]
//! in the request extensions and always calls the next service; handlers
//! that need an identity reject anonymous callers on their own (see
//! [`RequireAuth`](super::RequireAuth)).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, Method, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

use super::context::{AuthorityMapper, DefaultAuthorities, Identity, SecurityContext};
use super::routes::{RouteClass, RouteClassifier};
use crate::jwt::{TokenCodec, VerificationOutcome};

/// Default bearer prefix. Case-sensitive, exactly one trailing space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Marker stored in request extensions once the gate has run.
#[derive(Debug, Clone, Copy)]
pub struct GateApplied;

/// Configured gate, shared by every request.
#[derive(Clone)]
pub struct AuthGate {
    codec: Arc<TokenCodec>,
    routes: RouteClassifier,
    header: HeaderName,
    bearer_prefix: String,
    authorities: Arc<dyn AuthorityMapper>,
}

impl AuthGate {
    /// Gate reading `Authorization: Bearer <token>` with no exemptions and
    /// the default authority set.
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self {
            codec,
            routes: RouteClassifier::default(),
            header: AUTHORIZATION,
            bearer_prefix: BEARER_PREFIX.to_string(),
            authorities: Arc::new(DefaultAuthorities),
        }
    }

    pub fn with_routes(mut self, routes: RouteClassifier) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_header(mut self, header: HeaderName) -> Self {
        self.header = header;
        self
    }

    pub fn with_bearer_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bearer_prefix = prefix.into();
        self
    }

    pub fn with_authority_mapper(mut self, mapper: Arc<dyn AuthorityMapper>) -> Self {
        self.authorities = mapper;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// CORS preflights and exempt routes skip token handling.
    pub fn should_bypass(&self, method: &Method, path: &str) -> bool {
        *method == Method::OPTIONS || self.routes.classify(method, path) == RouteClass::Exempt
    }

    /// Token from the configured header. A missing header, a value that is
    /// not visible ASCII, a missing prefix or an empty remainder all count
    /// as "no token".
    pub fn extract_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        let value = headers.get(&self.header)?.to_str().ok()?;
        let token = value.strip_prefix(self.bearer_prefix.as_str())?.trim();
        (!token.is_empty()).then_some(token)
    }

    /// Resolve the security context for a request that was not bypassed.
    pub fn authenticate(&self, headers: &HeaderMap) -> SecurityContext {
        let Some(token) = self.extract_token(headers) else {
            return SecurityContext::Unauthenticated;
        };

        match self.codec.verify(token) {
            VerificationOutcome::Valid(claims) => {
                let authorities = self.authorities.authorities(&claims);
                tracing::trace!(subject = %claims.subject, "Bearer token accepted");
                SecurityContext::Authenticated(Identity {
                    subject: claims.subject.clone(),
                    authorities,
                    claims,
                })
            }
            outcome => {
                tracing::debug!(outcome = outcome.kind(), "Bearer token rejected");
                SecurityContext::Unauthenticated
            }
        }
    }

    /// Run the gate against a request, at most once. Returns `false` if the
    /// request had already been through a gate and was left untouched.
    pub fn apply<B>(&self, request: &mut Request<B>) -> bool {
        if request.extensions().get::<GateApplied>().is_some() {
            return false;
        }

        let context = if self.should_bypass(request.method(), request.uri().path()) {
            SecurityContext::Unauthenticated
        } else {
            self.authenticate(request.headers())
        };

        let extensions = request.extensions_mut();
        extensions.insert(GateApplied);
        extensions.insert(context);
        true
    }
}

/// Axum middleware running an [`AuthGate`]. Install with
/// `axum::middleware::from_fn_with_state(gate, authentication_gate)`.
pub async fn authentication_gate(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    if !gate.apply(&mut request) {
        tracing::trace!(path = %request.uri().path(), "Authentication gate already applied");
    }
    next.run(request).await
}
