//! In-memory user store backing the demo handlers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("user not found: {id}")]
    NotFound { id: Uuid },

    #[error("user with email '{email}' already exists")]
    EmailAlreadyExists { email: String },
}

/// Process-wide user registry. Reads vastly outnumber writes in the demo,
/// hence the RwLock.
#[derive(Default)]
pub struct UserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, email: String, display_name: String) -> Result<User, DomainError> {
        let mut users = self.users.write();
        if users.values().any(|u| u.email == email) {
            return Err(DomainError::EmailAlreadyExists { email });
        }
        let user = User {
            id: Uuid::new_v4(),
            email,
            display_name,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    pub fn get(&self, id: Uuid) -> Result<User, DomainError> {
        self.users
            .read()
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound { id })
    }

    /// List users in creation order, paginated.
    pub fn list(&self, limit: usize, offset: usize) -> (Vec<User>, usize) {
        let users = self.users.read();
        let total = users.len();
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        (all.into_iter().skip(offset).take(limit).collect(), total)
    }
}
