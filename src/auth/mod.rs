//! Bearer-token authentication.
//!
//! The [`AuthGate`] middleware verifies `Authorization: Bearer <jwt>` on
//! every non-exempt request and stores the outcome as a [`SecurityContext`]
//! in the request extensions. Extractors turn that context into
//! authorization decisions per handler.

mod context;
mod errors;
mod extractors;
mod gate;
mod ip;
mod routes;

pub use context::{
    AuthorityMapper, ClaimAuthorities, DEFAULT_AUTHORITY, DefaultAuthorities, Identity,
    ROLE_PREFIX, SecurityContext,
};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{Admin, AuthorityConstraint, MaybeAuth, RequireAuth, RequireAuthority};
pub use gate::{AuthGate, BEARER_PREFIX, GateApplied, authentication_gate};
pub use ip::extract_client_ip;
pub use routes::{
    DEFAULT_EXEMPTIONS, MethodMatch, PathMatch, PatternError, RouteClass, RouteClassifier,
    RoutePattern,
};
