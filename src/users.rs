//! User directory.
//!
//! The document database holding user accounts sits behind
//! [`UserDirectory`]. [`MemoryUserDirectory`] is the in-process
//! implementation used by tests and the CLI.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ItineraError, Result};

/// A stored account, credential hash included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserProfile {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            full_name: record.full_name.clone(),
            email: record.email.clone(),
            created_at: record.created_at,
        }
    }
}

/// Fields of an account about to be created.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}

/// Account storage.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;

    /// Create an account. Fails with `Conflict` if the address is taken.
    async fn create(&self, user: NewUser) -> Result<UserRecord>;

    /// Replace the credential hash. Fails with `NotFound` for unknown addresses.
    async fn update_credential(&self, email: &str, password_hash: &str) -> Result<()>;
}

/// [`UserDirectory`] in a map keyed by address.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|users| users.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> ItineraError {
    ItineraError::Store(format!("user directory lock poisoned: {e}"))
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.get(email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.values().find(|user| user.id == id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<UserRecord> {
        let mut users = self.users.write().map_err(poisoned)?;
        if users.contains_key(&user.email) {
            return Err(ItineraError::Conflict(format!(
                "user {} already exists",
                user.email
            )));
        }
        let record = UserRecord {
            id: Uuid::new_v4(),
            full_name: user.full_name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        users.insert(record.email.clone(), record.clone());
        Ok(record)
    }

    async fn update_credential(&self, email: &str, password_hash: &str) -> Result<()> {
        let mut users = self.users.write().map_err(poisoned)?;
        let record = users
            .get_mut(email)
            .ok_or_else(|| ItineraError::NotFound(format!("user {email}")))?;
        record.password_hash = password_hash.to_string();
        Ok(())
    }
}
