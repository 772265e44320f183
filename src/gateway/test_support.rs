//! Credential store doubles shared by the gateway tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{
    error::AuthError,
    principal::Principal,
    store::{CredentialStore, MemoryStore},
};

/// Counts every lookup that reaches the wrapped store.
pub(crate) struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub(crate) fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_username(username).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Principal>, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(id).await
    }
}

/// A store whose backend is always down.
pub(crate) struct FailingStore;

#[async_trait]
impl CredentialStore for FailingStore {
    async fn find_by_username(&self, _username: &str) -> Result<Option<Principal>, AuthError> {
        Err(AuthError::StoreUnavailable("connection refused".to_string()))
    }

    async fn find_by_id(&self, _id: &str) -> Result<Option<Principal>, AuthError> {
        Err(AuthError::StoreUnavailable("connection refused".to_string()))
    }
}
