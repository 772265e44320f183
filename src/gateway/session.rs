//! Session manager and the cookie transport it rides on.
//!
//! Flow Overview: a successful authentication mints a random session id and
//! stores `session id -> principal id`. Later requests present the id (cookie
//! or bearer token); the manager resolves it back to a principal through the
//! credential store. Unknown, expired and dangling ids all resolve to "no
//! session" so the caller can fall back to a fresh authentication.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use dashmap::DashMap;
use rand::{rngs::OsRng, RngCore};
use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::debug;

use super::{error::AuthError, principal::Principal, store::CredentialStore};

pub const SESSION_COOKIE_NAME: &str = "fieldgate_session";

/// Opaque session identifier handed to clients.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a new id from 32 bytes of OS randomness.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate session id")?;
        Ok(Self(Base64UrlUnpadded::encode_string(&bytes)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// Ids are credentials; keep them out of logs.
impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(6).collect();
        write!(f, "SessionId({prefix}…)")
    }
}

/// Storage for `session id -> principal id` records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &SessionId) -> Result<Option<String>, AuthError>;

    async fn save(&self, id: &SessionId, principal_id: &str) -> Result<(), AuthError>;

    async fn delete(&self, id: &SessionId) -> Result<(), AuthError>;
}

struct SessionRecord {
    principal_id: String,
    created_at: Instant,
}

/// Sharded in-process session store with a fixed time-to-live.
pub struct MemorySessionStore {
    ttl: Duration,
    records: DashMap<SessionId, SessionRecord>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            records: DashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn purge_expired(&self) {
        self.records
            .retain(|_, record| record.created_at.elapsed() < self.ttl);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<String>, AuthError> {
        let expired = match self.records.get(id) {
            None => return Ok(None),
            Some(record) if record.created_at.elapsed() < self.ttl => {
                return Ok(Some(record.principal_id.clone()));
            }
            Some(_) => true,
        };
        if expired {
            self.records.remove(id);
        }
        Ok(None)
    }

    async fn save(&self, id: &SessionId, principal_id: &str) -> Result<(), AuthError> {
        self.purge_expired();
        self.records.insert(
            id.clone(),
            SessionRecord {
                principal_id: principal_id.to_string(),
                created_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<(), AuthError> {
        self.records.remove(id);
        Ok(())
    }
}

/// Serializes principals into sessions and back.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    store: Arc<dyn CredentialStore>,
}

impl SessionManager {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionStore>, store: Arc<dyn CredentialStore>) -> Self {
        Self { sessions, store }
    }

    /// Bind the principal to a freshly minted session id.
    ///
    /// # Errors
    /// Returns [`AuthError::SessionStoreUnavailable`] if the id cannot be
    /// generated or persisted.
    pub async fn serialize(&self, principal: &Principal) -> Result<SessionId, AuthError> {
        let id = SessionId::generate()
            .map_err(|err| AuthError::SessionStoreUnavailable(err.to_string()))?;
        self.sessions.save(&id, &principal.id).await?;
        debug!(principal = %principal.username, "session established");
        Ok(id)
    }

    /// Resolve a session id to its principal.
    ///
    /// Returns `Ok(None)` for unknown or expired ids and for principals that
    /// no longer exist in the credential store.
    ///
    /// # Errors
    /// Propagates store failures; they are not treated as "no session".
    pub async fn deserialize(&self, id: &SessionId) -> Result<Option<Principal>, AuthError> {
        let Some(principal_id) = self.sessions.load(id).await? else {
            debug!(session = ?id, "no session record");
            return Ok(None);
        };
        let principal = self.store.find_by_id(&principal_id).await?;
        if principal.is_none() {
            debug!(principal_id = %principal_id, "session refers to a missing principal");
            self.sessions.delete(id).await?;
        }
        Ok(principal)
    }

    /// # Errors
    /// Returns an error if the session store fails.
    pub async fn destroy(&self, id: &SessionId) -> Result<(), AuthError> {
        self.sessions.delete(id).await
    }
}

/// Build an `HttpOnly` cookie carrying the session id.
pub fn session_cookie(
    id: &SessionId,
    ttl_seconds: u64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}",
        id.as_str()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Find the session id in a bearer token or the session cookie.
#[must_use]
pub fn extract_session_id(headers: &HeaderMap) -> Option<SessionId> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(SessionId(token));
    }
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(SessionId(val.to_string()));
            }
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
