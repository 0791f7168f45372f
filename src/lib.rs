pub mod api;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod credentials;
pub mod jwt;
pub mod rate_limit;

use api::{AuthState, create_api_router};
use auth::{AuthGate, BEARER_PREFIX, ClaimAuthorities, RouteClassifier, authentication_gate};
use axum::{Router, http::HeaderName, http::header::AUTHORIZATION, middleware};
use clock::{Clock, SystemClock};
use credentials::{CredentialVerifier, StaticCredentials};
use jwt::{DEFAULT_TOKEN_LIFETIME, TokenCodec, TokenError};
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Lifetime of tokens issued at login
    pub token_lifetime: Duration,
    /// Header carrying the bearer token
    pub auth_header: HeaderName,
    /// Literal prefix in front of the token, case-sensitive
    pub bearer_prefix: String,
    /// Routes that skip token handling
    pub exemptions: RouteClassifier,
    /// `iss` stamped on issued tokens
    pub issuer: Option<String>,
    /// `aud` stamped on issued tokens
    pub audience: Vec<String>,
    /// Array claim whose entries become `ROLE_*` authorities
    pub roles_claim: Option<String>,
    /// Username/password check for the login endpoint
    pub credentials: Arc<dyn CredentialVerifier>,
    pub clock: Arc<dyn Clock>,
    pub rate_limit: RateLimitConfig,
}

impl ServerConfig {
    /// Configuration with the default header, prefix, lifetime and exemptions,
    /// and no users.
    pub fn new(jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_lifetime: DEFAULT_TOKEN_LIFETIME,
            auth_header: AUTHORIZATION,
            bearer_prefix: BEARER_PREFIX.to_string(),
            exemptions: RouteClassifier::with_defaults(),
            issuer: None,
            audience: Vec::new(),
            roles_claim: None,
            credentials: Arc::new(StaticCredentials::new()),
            clock: Arc::new(SystemClock),
            rate_limit: RateLimitConfig::new(),
        }
    }

    /// Build the token codec this configuration describes.
    pub fn codec(&self) -> Result<TokenCodec, TokenError> {
        let mut codec = TokenCodec::new(&self.jwt_secret)?
            .with_clock(self.clock.clone())
            .with_audience(self.audience.iter().cloned());
        if let Some(issuer) = &self.issuer {
            codec = codec.with_issuer(issuer.clone());
        }
        Ok(codec)
    }

    /// Build the authentication gate this configuration describes.
    pub fn gate(&self, codec: Arc<TokenCodec>) -> AuthGate {
        let gate = AuthGate::new(codec)
            .with_routes(self.exemptions.clone())
            .with_header(self.auth_header.clone())
            .with_bearer_prefix(self.bearer_prefix.clone());
        match &self.roles_claim {
            Some(claim) => gate.with_authority_mapper(Arc::new(ClaimAuthorities::new(claim.clone()))),
            None => gate,
        }
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Result<Router, TokenError> {
    let codec = Arc::new(config.codec()?);
    let gate = Arc::new(config.gate(codec.clone()));

    let auth_state = AuthState {
        codec,
        credentials: config.credentials.clone(),
        token_lifetime: config.token_lifetime,
    };

    let api_router = create_api_router(auth_state, config.rate_limit.clone());

    Ok(Router::new()
        .nest("/api", api_router)
        .layer(middleware::from_fn_with_state(gate, authentication_gate)))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config).map_err(std::io::Error::other)?;
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
