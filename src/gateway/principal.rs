//! Authenticated actors and the flat role model.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use utoipa::ToSchema;

/// Roles recognised by the permission gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    DataViewer,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::DataViewer => "data-viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "data-viewer" | "data_viewer" => Ok(Self::DataViewer),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Parse a role column from a store. Empty and unknown values mean "no role".
pub(crate) fn parse_stored_role(raw: Option<&str>) -> Option<Role> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
    match raw.parse() {
        Ok(role) => Some(role),
        Err(err) => {
            tracing::warn!("ignoring stored role: {err}");
            None
        }
    }
}

/// An actor resolved from the credential store.
#[derive(Clone, Debug)]
pub struct Principal {
    pub id: String,
    pub username: String,
    pub secret: SecretString,
    pub role: Option<Role>,
}

impl Principal {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
        role: Option<Role>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            secret: SecretString::from(secret.into()),
            role,
        }
    }

    /// Fields that may be shown to clients.
    #[must_use]
    pub fn public_view(&self) -> PrincipalView {
        PrincipalView {
            id: self.id.clone(),
            username: self.username.clone(),
            role: self.role,
        }
    }
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.username == other.username
            && self.role == other.role
            && self.secret.expose_secret() == other.secret.expose_secret()
    }
}

impl Eq for Principal {}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PrincipalView {
    pub id: String,
    pub username: String,
    pub role: Option<Role>,
}
