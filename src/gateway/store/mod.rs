//! Credential store contract.
//!
//! Every verifier and the session deserializer reach the user source through
//! [`CredentialStore`] only. A store that cannot answer reports
//! [`AuthError::StoreUnavailable`]; it never pretends the user does not exist.

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::warn;

use super::{error::AuthError, principal::Principal};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, AuthError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Principal>, AuthError>;
}

/// Applies a deadline to every lookup of the wrapped store.
pub struct BoundedStore {
    inner: Arc<dyn CredentialStore>,
    timeout: Duration,
}

impl BoundedStore {
    #[must_use]
    pub fn new(inner: Arc<dyn CredentialStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<F>(&self, lookup: F) -> Result<Option<Principal>, AuthError>
    where
        F: std::future::Future<Output = Result<Option<Principal>, AuthError>> + Send,
    {
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis(), "credential lookup timed out");
                Err(AuthError::StoreUnavailable(format!(
                    "lookup exceeded {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

#[async_trait]
impl CredentialStore for BoundedStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, AuthError> {
        self.bounded(self.inner.find_by_username(username)).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Principal>, AuthError> {
        self.bounded(self.inner.find_by_id(id)).await
    }
}
