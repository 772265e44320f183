//! Authentication state machine.
//!
//! ```text
//! SessionCheck --resolved--------------------------------------> Done
//!      |
//!      v
//! StrategyAttempt(0) --rejected--> StrategyAttempt(1) ... --> AllFailed
//!      |                               |
//!      +--authenticated----------------+--> SessionEstablish --> Done
//! ```
//!
//! A store error in any state aborts the attempt and is returned as is.

use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    config::GatewayConfig,
    error::AuthError,
    principal::Principal,
    secret::SecretScheme,
    session::{SessionId, SessionManager},
    store::CredentialStore,
    strategy::{Credentials, RejectReason, Strategy, Verdict, VerifyContext, DEFAULT_ORDER},
};

/// What happened to each strategy tried during one request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attempt {
    rejected: Vec<(Strategy, RejectReason)>,
}

impl Attempt {
    #[must_use]
    pub fn rejections(&self) -> &[(Strategy, RejectReason)] {
        &self.rejected
    }

    /// True when the request carried no credentials of any kind.
    #[must_use]
    pub fn nothing_presented(&self) -> bool {
        self.rejected
            .iter()
            .all(|(_, reason)| *reason == RejectReason::NotPresented)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The request already carried a principal from its session.
    Resumed(Principal),
    /// A strategy succeeded and a new session was persisted.
    Established {
        principal: Principal,
        session: SessionId,
        strategy: Strategy,
    },
    AllFailed(Attempt),
}

impl AuthOutcome {
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Resumed(principal) | Self::Established { principal, .. } => Some(principal),
            Self::AllFailed(_) => None,
        }
    }
}

/// The request line a digest response is bound to.
#[derive(Clone, Copy, Debug)]
pub struct RequestTarget<'a> {
    pub method: &'a str,
    pub uri: &'a str,
}

pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    sessions: SessionManager,
    scheme: SecretScheme,
    realm: String,
    opaque: String,
    order: Vec<Strategy>,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        sessions: SessionManager,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            scheme: config.secret_scheme(),
            realm: config.realm().to_string(),
            opaque: Uuid::new_v4().simple().to_string(),
            order: DEFAULT_ORDER.to_vec(),
        }
    }

    #[must_use]
    pub fn order(&self) -> &[Strategy] {
        &self.order
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Value echoed back by digest clients; fixed for the life of the process.
    #[must_use]
    pub fn opaque(&self) -> &str {
        &self.opaque
    }

    /// Run the state machine for one request.
    ///
    /// # Errors
    /// Returns an error if the credential store or the session store fails.
    #[instrument(skip_all, fields(method = target.method))]
    pub async fn authenticate(
        &self,
        resolved: Option<Principal>,
        credentials: &Credentials,
        target: RequestTarget<'_>,
    ) -> Result<AuthOutcome, AuthError> {
        // SessionCheck
        if let Some(principal) = resolved {
            debug!(principal = %principal.username, "resumed from session");
            return Ok(AuthOutcome::Resumed(principal));
        }

        // StrategyAttempt
        let ctx = VerifyContext {
            store: self.store.as_ref(),
            scheme: self.scheme,
            realm: &self.realm,
            opaque: &self.opaque,
            method: target.method,
            uri: target.uri,
        };
        let mut attempt = Attempt::default();
        for &strategy in &self.order {
            match strategy.verify(&ctx, credentials).await? {
                Verdict::Authenticated(principal) => {
                    // SessionEstablish
                    let session = self.sessions.serialize(&principal).await?;
                    debug!(principal = %principal.username, %strategy, "authenticated");
                    return Ok(AuthOutcome::Established {
                        principal,
                        session,
                        strategy,
                    });
                }
                Verdict::Rejected(reason) => {
                    if reason != RejectReason::NotPresented {
                        debug!(%strategy, ?reason, "strategy rejected credentials");
                    }
                    attempt.rejected.push((strategy, reason));
                }
            }
        }

        // AllFailed
        Ok(AuthOutcome::AllFailed(attempt))
    }
}
