//! Credential store used by the auth handlers.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    /// Encoded Argon2id hash, never the password.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(username: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Username already exists: {0}")]
    UsernameTaken(String),
    #[error("User not found: {0}")]
    NotFound(Uuid),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, DirectoryError>;
    async fn insert(&self, user: UserRecord) -> Result<(), DirectoryError>;
    async fn update_password_hash(&self, id: Uuid, password_hash: String) -> Result<(), DirectoryError>;
}

/// Process-local directory keyed by username.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.users.read().get(username).cloned())
    }

    async fn insert(&self, user: UserRecord) -> Result<(), DirectoryError> {
        let mut users = self.users.write();
        if users.contains_key(&user.username) {
            return Err(DirectoryError::UsernameTaken(user.username));
        }
        users.insert(user.username.clone(), user);
        Ok(())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: String) -> Result<(), DirectoryError> {
        let mut users = self.users.write();
        let user = users
            .values_mut()
            .find(|u| u.id == id)
            .ok_or(DirectoryError::NotFound(id))?;
        user.password_hash = password_hash;
        Ok(())
    }
}
