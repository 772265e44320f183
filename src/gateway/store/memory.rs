//! In-memory credential store, optionally loaded from a JSON users file.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::{collections::HashMap, path::Path};

use super::CredentialStore;
use crate::gateway::{
    error::AuthError,
    principal::{parse_stored_role, Principal},
};

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordId {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
struct UserRecord {
    id: RecordId,
    username: String,
    password: String,
    #[serde(default)]
    role: Option<String>,
}

impl From<UserRecord> for Principal {
    fn from(record: UserRecord) -> Self {
        let id = match record.id {
            RecordId::Text(id) => id,
            RecordId::Number(id) => id.to_string(),
        };
        let role = parse_stored_role(record.role.as_deref());
        Principal::new(id, record.username, record.password, role)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    by_id: HashMap<String, Principal>,
    // username -> id
    usernames: HashMap<String, String>,
}

impl MemoryStore {
    /// Build a store from principals.
    ///
    /// # Errors
    /// Returns an error if two principals share an id or a username.
    pub fn new(principals: Vec<Principal>) -> Result<Self> {
        let mut store = Self::default();
        for principal in principals {
            if store.by_id.contains_key(&principal.id) {
                bail!("duplicate user id: {}", principal.id);
            }
            if store.usernames.contains_key(&principal.username) {
                bail!("duplicate username: {}", principal.username);
            }
            store
                .usernames
                .insert(principal.username.clone(), principal.id.clone());
            store.by_id.insert(principal.id.clone(), principal);
        }
        Ok(store)
    }

    /// Parse a JSON array of `{id, username, password, role}` records.
    ///
    /// # Errors
    /// Returns an error on malformed JSON or duplicate users.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<UserRecord> =
            serde_json::from_str(json).context("Invalid users file format")?;
        Self::new(records.into_iter().map(Principal::from).collect())
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read users file {}", path.display()))?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, AuthError> {
        Ok(self
            .usernames
            .get(username)
            .and_then(|id| self.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Principal>, AuthError> {
        Ok(self.by_id.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::principal::Role;

    #[tokio::test]
    async fn loads_users_file_with_mixed_ids() -> Result<()> {
        let store = MemoryStore::from_json(
            r#"[
                {"id": 1, "username": "alice", "password": "correct", "role": "admin"},
                {"id": "u-2", "username": "dave", "password": "pw", "role": "data-viewer"},
                {"id": 3, "username": "eve", "password": "pw"}
            ]"#,
        )?;
        assert_eq!(store.len(), 3);

        let alice = store
            .find_by_username("alice")
            .await?
            .context("alice missing")?;
        assert_eq!(alice.id, "1");
        assert_eq!(alice.role, Some(Role::Admin));

        let dave = store.find_by_id("u-2").await?.context("dave missing")?;
        assert_eq!(dave.role, Some(Role::DataViewer));

        let eve = store.find_by_id("3").await?.context("eve missing")?;
        assert_eq!(eve.role, None);
        Ok(())
    }

    #[test]
    fn rejects_duplicate_usernames() {
        let result = MemoryStore::new(vec![
            Principal::new("1", "alice", "a", None),
            Principal::new("2", "alice", "b", None),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let result = MemoryStore::new(vec![
            Principal::new("1", "alice", "a", None),
            Principal::new("1", "bob", "b", None),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_malformed_file() {
        assert!(MemoryStore::from_json("{\"username\": \"alice\"}").is_err());
    }

    #[tokio::test]
    async fn lookups_are_exact() -> Result<()> {
        let store = MemoryStore::new(vec![Principal::new("1", "alice", "a", None)])?;
        assert!(store.find_by_username("Alice").await?.is_none());
        assert!(store.find_by_id("2").await?.is_none());
        Ok(())
    }
}
