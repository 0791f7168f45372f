//! Axum extractors reading the gate's [`SecurityContext`].
//!
//! These are the downstream authorization side: the gate only attaches an
//! identity, and these extractors decide whether a handler may run.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::context::{Identity, SecurityContext};
use super::errors::{ApiAuthError, AuthErrorKind};

/// Context stored by the gate. Requests that never went through a gate
/// are anonymous.
fn security_context(parts: &Parts) -> SecurityContext {
    parts
        .extensions
        .get::<SecurityContext>()
        .cloned()
        .unwrap_or_default()
}

impl<S> FromRequestParts<S> for SecurityContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(security_context(parts))
    }
}

/// Extractor for endpoints that require an authenticated caller.
/// Rejects with a JSON 401 otherwise.
pub struct RequireAuth(pub Identity);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        security_context(parts)
            .into_identity()
            .map(RequireAuth)
            .ok_or(ApiAuthError(AuthErrorKind::NotAuthenticated))
    }
}

/// Optional authentication extractor - never fails.
pub struct MaybeAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for MaybeAuth
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuth(security_context(parts).into_identity()))
    }
}

/// Authority a [`RequireAuthority`] extractor checks for.
pub trait AuthorityConstraint {
    const AUTHORITY: &'static str;
}

/// Constraint for `ROLE_ADMIN`.
pub struct Admin;

impl AuthorityConstraint for Admin {
    const AUTHORITY: &'static str = "ROLE_ADMIN";
}

/// Like [`RequireAuth`], but also needs the authority named by `C`.
/// 401 when anonymous, 403 when the authority is missing.
pub struct RequireAuthority<C: AuthorityConstraint>(pub Identity, std::marker::PhantomData<C>);

impl<C: AuthorityConstraint> RequireAuthority<C> {
    pub fn identity(&self) -> &Identity {
        &self.0
    }
}

impl<S, C> FromRequestParts<S> for RequireAuthority<C>
where
    S: Send + Sync,
    C: AuthorityConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(identity) = RequireAuth::from_request_parts(parts, state).await?;
        if !identity.has_authority(C::AUTHORITY) {
            return Err(ApiAuthError(AuthErrorKind::InsufficientAuthority));
        }
        Ok(RequireAuthority(identity, std::marker::PhantomData))
    }
}
