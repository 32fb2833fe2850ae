//! In-memory `UserStore` used by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::auth::{
    repo::{StoreError, UserStore},
    repo_types::{NewUser, User},
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
    fail_writes: Mutex<bool>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent insert/update fail with a backend error.
    pub fn fail_writes(&self) {
        *self.fail_writes.lock().unwrap() = true;
    }

    pub fn count_by_email(&self, email: &str) -> usize {
        self.users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.email == email)
            .count()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(StoreError::Backend("connection reset".into()));
        }
        Ok(())
    }
}

// Mirrors the UNIQUE(email) constraint and the partial index on (oauth_provider, oauth_id).
fn violates_uniqueness(
    existing: &[User],
    candidate_id: i64,
    email: &str,
    provider: Option<&str>,
    oauth_id: Option<&str>,
) -> bool {
    existing
        .iter()
        .filter(|u| u.id != candidate_id)
        .any(|u| match (provider, oauth_id) {
            (Some(p), Some(id)) => u.email == email || u.is_linked_to(p, id),
            _ => u.email == email,
        })
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_oauth_identity(
        &self,
        provider: &str,
        oauth_id: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.is_linked_to(provider, oauth_id))
            .cloned())
    }

    async fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        self.check_writable()?;
        if !new.has_credential() {
            return Err(StoreError::Backend("users_has_credential violated".into()));
        }
        let mut users = self.users.lock().unwrap();
        if violates_uniqueness(
            &users,
            0,
            &new.email,
            new.oauth_provider.as_deref(),
            new.oauth_id.as_deref(),
        ) {
            return Err(StoreError::Conflict);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
            email: new.email,
            password_hash: new.password_hash,
            oauth_provider: new.oauth_provider,
            oauth_id: new.oauth_id,
            name: new.name,
            avatar_url: new.avatar_url,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        self.check_writable()?;
        let mut users = self.users.lock().unwrap();
        if violates_uniqueness(
            &users,
            user.id,
            &user.email,
            user.oauth_provider.as_deref(),
            user.oauth_id.as_deref(),
        ) {
            return Err(StoreError::Conflict);
        }
        let slot = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| StoreError::Backend(format!("user {} not found", user.id)))?;
        *slot = User {
            created_at: slot.created_at,
            updated_at: OffsetDateTime::now_utc(),
            ..user.clone()
        };
        Ok(slot.clone())
    }
}
