//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::{DEFAULT_EXEMPTIONS, RouteClassifier};
use crate::credentials::StaticCredentials;
use axum::http::HeaderName;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tokengate",
    about = "Stateless bearer-token authentication service"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "TOKENGATE_PORT")]
    pub port: u16,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Lifetime of issued tokens, in seconds
    #[arg(long, default_value = "7200", value_parser = clap::value_parser!(u64).range(1..))]
    pub token_lifetime: u64,

    /// Header carrying the bearer token
    #[arg(long, default_value = "authorization", value_parser = parse_header_name)]
    pub auth_header: HeaderName,

    /// Literal, case-sensitive prefix in front of the token
    #[arg(long, default_value = "Bearer ")]
    pub bearer_prefix: String,

    /// Route exempt from authentication, "[METHOD ]<path>" with optional trailing '*'.
    /// Repeatable; replaces the built-in list when given
    #[arg(long = "exempt", value_name = "PATTERN")]
    pub exemptions: Vec<String>,

    /// Issuer (iss) stamped on issued tokens
    #[arg(long, env = "TOKENGATE_ISSUER")]
    pub issuer: Option<String>,

    /// Audience (aud) stamped on issued tokens. Repeatable
    #[arg(long)]
    pub audience: Vec<String>,

    /// Array claim whose entries are granted as ROLE_* authorities
    #[arg(long)]
    pub roles_claim: Option<String>,

    /// User allowed to log in, as name:password. Repeatable
    #[arg(long = "user", value_name = "NAME:PASSWORD")]
    pub users: Vec<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

fn parse_header_name(s: &str) -> Result<HeaderName, String> {
    HeaderName::from_bytes(s.as_bytes()).map_err(|_| format!("Invalid header name: {}", s))
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    validate_jwt_secret(secret)
}

fn validate_jwt_secret(secret: String) -> Option<String> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }
    Some(secret)
}

/// Parse the exemption list, falling back to the built-in one.
/// Returns None and logs an error if a pattern is invalid.
pub fn parse_exemptions(patterns: &[String]) -> Option<RouteClassifier> {
    let result = if patterns.is_empty() {
        RouteClassifier::parse(DEFAULT_EXEMPTIONS)
    } else {
        RouteClassifier::parse(patterns)
    };

    match result {
        Ok(classifier) => {
            info!(count = classifier.patterns().len(), "Route exemptions loaded");
            Some(classifier)
        }
        Err(e) => {
            error!(error = %e, "Invalid route exemption");
            None
        }
    }
}

/// Parse `--user` specs. Returns None and logs an error on a bad spec.
pub fn load_credentials(users: &[String]) -> Option<StaticCredentials> {
    match StaticCredentials::from_specs(users) {
        Ok(creds) => {
            if creds.is_empty() {
                warn!("No users configured; every login attempt will fail");
            }
            Some(creds)
        }
        Err(e) => {
            error!(error = %e, "Invalid --user value");
            None
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: Args,
    jwt_secret: String,
    exemptions: RouteClassifier,
    credentials: StaticCredentials,
) -> ServerConfig {
    let mut config = ServerConfig::new(jwt_secret.into_bytes());
    config.token_lifetime = Duration::from_secs(args.token_lifetime);
    config.auth_header = args.auth_header;
    config.bearer_prefix = args.bearer_prefix;
    config.exemptions = exemptions;
    config.issuer = args.issuer;
    config.audience = args.audience;
    config.roles_claim = args.roles_claim;
    config.credentials = Arc::new(credentials);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["tokengate"]).unwrap();
        assert_eq!(args.port, 8080);
        assert_eq!(args.token_lifetime, 7200);
        assert_eq!(args.auth_header, axum::http::header::AUTHORIZATION);
        assert_eq!(args.bearer_prefix, "Bearer ");
        assert!(args.exemptions.is_empty());
    }

    #[test]
    fn test_args_repeatable_values() {
        let args = Args::try_parse_from([
            "tokengate",
            "--exempt",
            "/health",
            "--exempt",
            "GET /docs/*",
            "--user",
            "alice:pw",
            "--auth-header",
            "X-Auth-Token",
        ])
        .unwrap();
        assert_eq!(args.exemptions, vec!["/health", "GET /docs/*"]);
        assert_eq!(args.users, vec!["alice:pw"]);
        assert_eq!(args.auth_header.as_str(), "x-auth-token");
    }

    #[test]
    fn test_args_reject_zero_lifetime() {
        assert!(Args::try_parse_from(["tokengate", "--token-lifetime", "0"]).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(validate_jwt_secret("short".into()).is_none());
        assert!(validate_jwt_secret("x".repeat(MIN_JWT_SECRET_LENGTH)).is_some());
    }

    #[test]
    fn test_parse_exemptions() {
        let defaults = parse_exemptions(&[]).unwrap();
        assert_eq!(defaults.patterns().len(), DEFAULT_EXEMPTIONS.len());

        let custom = parse_exemptions(&["/health".to_string()]).unwrap();
        assert_eq!(custom.patterns().len(), 1);

        assert!(parse_exemptions(&["no-slash".to_string()]).is_none());
    }
}
