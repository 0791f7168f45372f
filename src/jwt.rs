//! JWT token generation and validation.
//!
//! Tokens are compact HS256 JWTs (`header.payload.signature`, each part
//! base64url without padding). Issuance goes through `jsonwebtoken`;
//! verification walks a fixed sequence of checks so every input, however
//! hostile, maps to exactly one [`VerificationOutcome`]:
//!
//! 1. structure (three non-empty base64url segments) -> `Malformed`
//! 2. header `alg`/`typ` -> `UnsupportedFormat`
//! 3. HMAC over `header.payload`, constant-time compare -> `SignatureInvalid`
//! 4. `nbf` / `exp` against the [`Clock`] -> `NotYetValid` / `Expired`
//! 5. required claims (`sub`, `exp`) -> `ArgumentInvalid`

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock, unix_seconds};

type HmacSha256 = Hmac<Sha256>;

/// Value of the `typ` header.
pub const TOKEN_TYPE: &str = "JWT";

/// Value of the `alg` header. The only algorithm accepted on verification.
pub const SIGNING_ALGORITHM: &str = "HS256";

/// Default token lifetime: 2 hours
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(2 * 60 * 60);

/// Claim names owned by the codec. Extra claims may not use them.
pub const REGISTERED_CLAIMS: [&str; 7] = ["sub", "iss", "aud", "iat", "exp", "nbf", "jti"];

/// Claims carried by a verified token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (caller identity)
    #[serde(rename = "sub")]
    pub subject: String,
    /// Issuing authority
    #[serde(rename = "iss", default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Intended recipients
    #[serde(
        rename = "aud",
        default,
        skip_serializing_if = "BTreeSet::is_empty",
        deserialize_with = "deserialize_audience"
    )]
    pub audience: BTreeSet<String>,
    /// Issued at (Unix timestamp)
    #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<u64>,
    /// Expiration time (Unix timestamp), exclusive
    #[serde(rename = "exp")]
    pub expires_at: u64,
    /// Not valid before (Unix timestamp)
    #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<u64>,
    /// JWT ID
    #[serde(rename = "jti", default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    /// Application claims, in insertion order
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `aud` may be a single string or an array of strings.
fn deserialize_audience<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Audience {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Audience>::deserialize(deserializer)? {
        None => BTreeSet::new(),
        Some(Audience::One(aud)) => BTreeSet::from([aud]),
        Some(Audience::Many(auds)) => auds.into_iter().collect(),
    })
}

/// Payload as it arrives on the wire, before required claims are enforced.
#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default, deserialize_with = "deserialize_audience")]
    aud: BTreeSet<String>,
    #[serde(default)]
    iat: Option<u64>,
    #[serde(default)]
    exp: Option<u64>,
    #[serde(default)]
    nbf: Option<u64>,
    #[serde(default)]
    jti: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Result of verifying a token string. Exactly one variant per attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Valid(Claims),
    Expired,
    NotYetValid,
    SignatureInvalid,
    Malformed,
    UnsupportedFormat,
    ArgumentInvalid,
}

impl VerificationOutcome {
    /// Stable name for logs. Never sent to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Valid(_) => "valid",
            Self::Expired => "expired",
            Self::NotYetValid => "not_yet_valid",
            Self::SignatureInvalid => "signature_invalid",
            Self::Malformed => "malformed",
            Self::UnsupportedFormat => "unsupported_format",
            Self::ArgumentInvalid => "argument_invalid",
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn claims(&self) -> Option<&Claims> {
        match self {
            Self::Valid(claims) => Some(claims),
            _ => None,
        }
    }

    pub fn into_claims(self) -> Option<Claims> {
        match self {
            Self::Valid(claims) => Some(claims),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/// Parameters for [`TokenCodec::issue_with`].
#[derive(Debug, Clone)]
pub struct TokenRequest {
    subject: String,
    lifetime: Duration,
    not_before: Option<Duration>,
    issuer: Option<String>,
    audience: Option<BTreeSet<String>>,
    extra: Map<String, Value>,
}

impl TokenRequest {
    pub fn new(subject: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            subject: subject.into(),
            lifetime,
            not_before: None,
            issuer: None,
            audience: None,
            extra: Map::new(),
        }
    }

    /// Delay the start of the validity window by `delay` from issuance.
    pub fn not_before(mut self, delay: Duration) -> Self {
        self.not_before = Some(delay);
        self
    }

    /// Override the codec's default issuer for this token.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Override the codec's default audience for this token.
    pub fn audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audience = Some(audience.into_iter().map(Into::into).collect());
        self
    }

    pub fn extra_claims(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }
}

/// Result of issuing a token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// JWT ID
    pub jti: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

/// Signs and verifies tokens with a process-wide symmetric key.
///
/// The key is fixed at construction. Cloning is cheap enough to hand one
/// copy to each router, but sharing through an `Arc` is the usual pattern.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    mac: HmacSha256,
    clock: Arc<dyn Clock>,
    issuer: Option<String>,
    audience: BTreeSet<String>,
}

impl TokenCodec {
    /// Create a codec that signs with `secret` and reads the system clock.
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::InvalidKey);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidKey)?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            mac,
            clock: Arc::new(SystemClock),
            issuer: None,
            audience: BTreeSet::new(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Default `iss` stamped on issued tokens.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Default `aud` stamped on issued tokens.
    pub fn with_audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audience = audience.into_iter().map(Into::into).collect();
        self
    }

    /// Issue a token for `subject` valid for `lifetime` from now.
    pub fn issue(
        &self,
        subject: &str,
        lifetime: Duration,
        extra: Map<String, Value>,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_with(TokenRequest::new(subject, lifetime).extra_claims(extra))
    }

    pub fn issue_with(&self, request: TokenRequest) -> Result<IssuedToken, TokenError> {
        if request.subject.trim().is_empty() {
            return Err(TokenError::ArgumentInvalid("subject must not be empty"));
        }
        if request.lifetime.is_zero() {
            return Err(TokenError::ArgumentInvalid("token lifetime must be positive"));
        }
        if let Some(key) = request
            .extra
            .keys()
            .find(|k| REGISTERED_CLAIMS.contains(&k.as_str()))
        {
            tracing::debug!(claim = %key, "Rejected extra claim shadowing a registered claim");
            return Err(TokenError::ArgumentInvalid(
                "extra claims must not use registered claim names",
            ));
        }

        let now = unix_seconds(self.clock.now());
        let expires_at = now
            .checked_add(whole_seconds_rounded_up(request.lifetime))
            .ok_or(TokenError::ArgumentInvalid("token lifetime is too large"))?;
        let not_before = request
            .not_before
            .map(|delay| now.saturating_add(whole_seconds_rounded_up(delay)));

        let jti = uuid::Uuid::new_v4().to_string();

        let claims = Claims {
            subject: request.subject,
            issuer: request.issuer.or_else(|| self.issuer.clone()),
            audience: request.audience.unwrap_or_else(|| self.audience.clone()),
            issued_at: Some(now),
            expires_at,
            not_before,
            token_id: Some(jti.clone()),
            extra: request.extra,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)?;

        Ok(IssuedToken {
            token,
            jti,
            issued_at: now,
            expires_at,
        })
    }

    /// Verify a token string. Never panics and never fails: absent, empty
    /// and adversarial input all map to a [`VerificationOutcome`].
    pub fn verify<'a>(&self, token: impl Into<Option<&'a str>>) -> VerificationOutcome {
        let Some(token) = token.into().filter(|t| !t.trim().is_empty()) else {
            return VerificationOutcome::ArgumentInvalid;
        };

        let mut segments = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return VerificationOutcome::Malformed;
        };

        let (Some(header), Some(payload), Some(signature)) = (
            decode_segment(header_b64),
            decode_segment(payload_b64),
            decode_segment(signature_b64),
        ) else {
            return VerificationOutcome::Malformed;
        };

        let Ok(header) = serde_json::from_slice::<Map<String, Value>>(&header) else {
            return VerificationOutcome::Malformed;
        };
        if !header_supported(&header) {
            return VerificationOutcome::UnsupportedFormat;
        }

        let mut mac = self.mac.clone();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            return VerificationOutcome::SignatureInvalid;
        }

        let Some(raw) = parse_payload(&payload) else {
            return VerificationOutcome::Malformed;
        };

        let now = unix_seconds(self.clock.now());
        if raw.nbf.is_some_and(|nbf| now < nbf) {
            return VerificationOutcome::NotYetValid;
        }
        if raw.exp.is_some_and(|exp| now >= exp) {
            return VerificationOutcome::Expired;
        }

        let (Some(subject), Some(expires_at)) = (raw.sub.filter(|s| !s.is_empty()), raw.exp)
        else {
            return VerificationOutcome::ArgumentInvalid;
        };

        VerificationOutcome::Valid(Claims {
            subject,
            issuer: raw.iss,
            audience: raw.aud,
            issued_at: raw.iat,
            expires_at,
            not_before: raw.nbf,
            token_id: raw.jti,
            extra: raw.extra,
        })
    }
}

fn whole_seconds_rounded_up(d: Duration) -> u64 {
    d.as_secs().saturating_add(u64::from(d.subsec_nanos() > 0))
}

/// Strict base64url: no padding, no stray trailing bits, non-empty.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    if segment.is_empty() {
        return None;
    }
    URL_SAFE_NO_PAD.decode(segment).ok()
}

fn header_supported(header: &Map<String, Value>) -> bool {
    let alg_ok = matches!(header.get("alg"), Some(Value::String(alg)) if alg == SIGNING_ALGORITHM);
    let typ_ok = match header.get("typ") {
        None => true,
        Some(Value::String(typ)) => typ.eq_ignore_ascii_case(TOKEN_TYPE),
        Some(_) => false,
    };
    alg_ok && typ_ok
}

fn parse_payload(payload: &[u8]) -> Option<RawClaims> {
    let object = serde_json::from_slice::<Map<String, Value>>(payload).ok()?;
    serde_json::from_value(Value::Object(object)).ok()
}

/// Errors that can occur while building a codec or issuing a token.
#[derive(Debug)]
pub enum TokenError {
    /// Signing key is empty or unusable
    InvalidKey,
    /// Caller misuse: empty subject, non-positive lifetime, reserved claim
    ArgumentInvalid(&'static str),
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::InvalidKey => write!(f, "Signing key must not be empty"),
            TokenError::ArgumentInvalid(reason) => write!(f, "Invalid argument: {}", reason),
            TokenError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
        }
    }
}

impl std::error::Error for TokenError {}
