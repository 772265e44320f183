//! Authentication and authorization core.
//!
//! Requests are classified by [`zone::ZoneTable`]; protected zones run the
//! [`authenticator::Authenticator`] (session first, then the Local, Basic and
//! Digest strategies in that order) and the role check in [`gate`].

pub mod authenticator;
pub mod config;
pub mod error;
pub mod gate;
pub mod principal;
pub mod secret;
pub mod session;
pub mod store;
pub mod strategy;
pub mod zone;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::{
    config::GatewayConfig,
    error::AuthError,
    gate::{enforce, Decision, ForbiddenReason, Gateway},
    principal::{Principal, PrincipalView, Role},
    secret::SecretScheme,
    session::{MemorySessionStore, SessionId, SessionManager, SessionStore},
    store::{CredentialStore, MemoryStore, PgStore},
    zone::{Requirement, Zone, ZoneTable},
};
