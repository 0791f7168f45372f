//! Credential checking for the login endpoint.
//!
//! Password storage is someone else's job: the login handler only talks to
//! a [`CredentialVerifier`]. [`StaticCredentials`] is the in-memory
//! implementation the binary uses for users given on the command line.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Decides whether a username/password pair is valid.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Fixed set of users. Passwords are kept only as HMAC tags under a random
/// per-process key and compared in constant time.
pub struct StaticCredentials {
    key: [u8; 32],
    users: HashMap<String, Vec<u8>>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        let mut key = [0u8; 32];
        rand::rng().fill_bytes(&mut key);
        Self {
            key,
            users: HashMap::new(),
        }
    }

    pub fn with_user(mut self, username: impl Into<String>, password: &str) -> Self {
        let tag = self.tag(password).finalize().into_bytes().to_vec();
        self.users.insert(username.into(), tag);
        self
    }

    /// Parse `name:password` specs as given to `--user`.
    pub fn from_specs<I, S>(specs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        specs.into_iter().try_fold(Self::new(), |creds, spec| {
            let spec = spec.as_ref();
            match spec.split_once(':') {
                Some((name, password)) if !name.is_empty() && !password.is_empty() => {
                    Ok(creds.with_user(name, password))
                }
                _ => Err(format!("Expected name:password, got {:?}", spec)),
            }
        })
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn tag(&self, password: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC accepts keys of any length");
        mac.update(password.as_bytes());
        mac
    }
}

impl Default for StaticCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialVerifier for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> bool {
        let mac = self.tag(password);
        match self.users.get(username) {
            Some(expected) => mac.verify_slice(expected).is_ok(),
            None => false,
        }
    }
}
