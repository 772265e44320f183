//! Credential verification strategies.
//!
//! Each [`Strategy`] checks one form of claimed credentials against the
//! credential store. Strategies keep no state between calls; given the same
//! store contents they always return the same verdict.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use secrecy::SecretString;
use serde::Serialize;
use std::fmt;

use super::{error::AuthError, principal::Principal, secret::SecretScheme, store::CredentialStore};

pub mod basic;
pub mod digest;
pub mod local;

pub use digest::DigestClaim;

/// The priority order used when a request carries several credential forms.
pub const DEFAULT_ORDER: [Strategy; 3] = [Strategy::Local, Strategy::Basic, Strategy::Digest];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Username and password posted by the first-party login form.
    Local,
    /// HTTP Basic shared secret.
    Basic,
    /// HTTP Digest challenge-response.
    Digest,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Basic => f.write_str("basic"),
            Self::Digest => f.write_str("digest"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The request did not carry this form of credentials.
    NotPresented,
    UnknownUser,
    SecretMismatch,
    DigestMismatch,
    RealmMismatch,
    UriMismatch,
    OpaqueMismatch,
    /// The configured secret scheme cannot serve this strategy.
    SchemeUnsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Authenticated(Principal),
    Rejected(RejectReason),
}

/// A username with the secret the client claims for it.
#[derive(Clone, Debug)]
pub struct PasswordClaim {
    pub username: String,
    pub password: SecretString,
}

impl PasswordClaim {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Everything a request claims about who it is.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub form: Option<PasswordClaim>,
    pub basic: Option<PasswordClaim>,
    pub digest: Option<DigestClaim>,
}

impl Credentials {
    /// Read `Authorization: Basic` and `Authorization: Digest` headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut credentials = Self::default();
        for value in headers.get_all(AUTHORIZATION) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            let value = value.trim();
            let Some((scheme, rest)) = value.split_once(' ') else {
                continue;
            };
            if scheme.eq_ignore_ascii_case("basic") {
                credentials.basic = credentials.basic.or_else(|| basic::parse(rest));
            } else if scheme.eq_ignore_ascii_case("digest") {
                credentials.digest = credentials.digest.or_else(|| digest::parse(rest));
            }
        }
        credentials
    }

    #[must_use]
    pub fn with_form(mut self, claim: Option<PasswordClaim>) -> Self {
        self.form = claim;
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.form.is_none() && self.basic.is_none() && self.digest.is_none()
    }
}

/// Request data and policy a strategy needs besides the credentials.
pub struct VerifyContext<'a> {
    pub store: &'a dyn CredentialStore,
    pub scheme: SecretScheme,
    pub realm: &'a str,
    pub opaque: &'a str,
    pub method: &'a str,
    pub uri: &'a str,
}

impl Strategy {
    /// Run this strategy against the request's credentials.
    ///
    /// # Errors
    /// Returns [`AuthError::StoreUnavailable`] if the credential store fails.
    pub async fn verify(
        self,
        ctx: &VerifyContext<'_>,
        credentials: &Credentials,
    ) -> Result<Verdict, AuthError> {
        match self {
            Self::Local => match &credentials.form {
                Some(claim) => local::verify(ctx, claim).await,
                None => Ok(Verdict::Rejected(RejectReason::NotPresented)),
            },
            Self::Basic => match &credentials.basic {
                Some(claim) => basic::verify(ctx, claim).await,
                None => Ok(Verdict::Rejected(RejectReason::NotPresented)),
            },
            Self::Digest => match &credentials.digest {
                Some(claim) => digest::verify(ctx, claim).await,
                None => Ok(Verdict::Rejected(RejectReason::NotPresented)),
            },
        }
    }
}

/// Look the user up and compare secrets under the configured scheme.
pub(crate) async fn verify_password_claim(
    ctx: &VerifyContext<'_>,
    claim: &PasswordClaim,
) -> Result<Verdict, AuthError> {
    let Some(principal) = ctx.store.find_by_username(&claim.username).await? else {
        return Ok(Verdict::Rejected(RejectReason::UnknownUser));
    };
    if ctx.scheme.matches(&principal.secret, &claim.password) {
        Ok(Verdict::Authenticated(principal))
    } else {
        Ok(Verdict::Rejected(RejectReason::SecretMismatch))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::gateway::store::MemoryStore;

    pub(crate) fn store() -> MemoryStore {
        MemoryStore::new(vec![
            Principal::new("1", "alice", "correct", Some(crate::gateway::principal::Role::Admin)),
            Principal::new("2", "dave", "viewer-pw", Some(crate::gateway::principal::Role::DataViewer)),
        ])
        .unwrap_or_default()
    }

    pub(crate) fn context<'a>(store: &'a MemoryStore, method: &'a str, uri: &'a str) -> VerifyContext<'a> {
        VerifyContext {
            store,
            scheme: SecretScheme::Plaintext,
            realm: "fieldgate",
            opaque: "opaque-value",
            method,
            uri,
        }
    }
}
