//! How stored secrets are compared with the ones a client presents.
//!
//! `Plaintext` keeps the legacy behavior: the store holds the secret itself and
//! the comparison is an exact byte match. `Argon2` stores a PHC string instead.
//! Digest authentication needs the plaintext secret as its shared key, so it is
//! only available under `Plaintext`.

use anyhow::{anyhow, Result};
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, str::FromStr};
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SecretScheme {
    #[default]
    Plaintext,
    Argon2,
}

impl SecretScheme {
    /// Check a presented secret against the stored one.
    #[must_use]
    pub fn matches(self, stored: &SecretString, presented: &SecretString) -> bool {
        match self {
            Self::Plaintext => {
                stored.expose_secret().as_bytes() == presented.expose_secret().as_bytes()
            }
            Self::Argon2 => match PasswordHash::new(stored.expose_secret()) {
                Ok(parsed) => Argon2::default()
                    .verify_password(presented.expose_secret().as_bytes(), &parsed)
                    .is_ok(),
                Err(err) => {
                    warn!("stored secret is not a valid argon2 hash: {err}");
                    false
                }
            },
        }
    }

    /// The key a digest challenge is computed with, if the scheme keeps one.
    #[must_use]
    pub fn digest_key(self, stored: &SecretString) -> Option<&str> {
        match self {
            Self::Plaintext => Some(stored.expose_secret()),
            Self::Argon2 => None,
        }
    }
}

impl fmt::Display for SecretScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plaintext => f.write_str("plaintext"),
            Self::Argon2 => f.write_str("argon2"),
        }
    }
}

impl FromStr for SecretScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plaintext" | "plain" => Ok(Self::Plaintext),
            "argon2" => Ok(Self::Argon2),
            other => Err(format!("unknown secret scheme: {other}")),
        }
    }
}

/// Hash a secret for storage under [`SecretScheme::Argon2`].
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Failed to hash secret: {e}"))
}
