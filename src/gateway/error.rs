use thiserror::Error;

/// Infrastructure failures. Credential mismatches are not errors; they are
/// reported as [`super::strategy::RejectReason`] and recovered locally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("session store unavailable: {0}")]
    SessionStoreUnavailable(String),
}

impl AuthError {
    pub(crate) fn store(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}
