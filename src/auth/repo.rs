use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::{
    auth::repo_types::{NewUser, User},
    error::AuthError,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint (email, or provider identity) rejected the write.
    #[error("unique constraint violated")]
    Conflict,
    #[error("{0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict,
            _ => Self::Backend(e.to_string()),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => AuthError::Conflict,
            StoreError::Backend(msg) => AuthError::Storage(msg),
        }
    }
}

/// Persistence for user records.
///
/// Implementations must enforce email uniqueness and uniqueness of the
/// (provider, oauth id) pair, and every call must be a single atomic write.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_oauth_identity(
        &self,
        provider: &str,
        oauth_id: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    /// Writes every mutable field of `user` and bumps `updated_at`.
    async fn update(&self, user: &User) -> Result<User, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, oauth_provider, oauth_id, name, avatar_url,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, oauth_provider, oauth_id, name, avatar_url,
                   created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_oauth_identity(
        &self,
        provider: &str,
        oauth_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, oauth_provider, oauth_id, name, avatar_url,
                   created_at, updated_at
            FROM users
            WHERE oauth_provider = $1 AND oauth_id = $2
            "#,
        )
        .bind(provider)
        .bind(oauth_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        debug_assert!(user.has_credential(), "users_has_credential would reject this row");
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, oauth_provider, oauth_id, name, avatar_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, email, password_hash, oauth_provider, oauth_id, name, avatar_url,
                      created_at, updated_at
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.oauth_provider)
        .bind(&user.oauth_id)
        .bind(&user.name)
        .bind(&user.avatar_url)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET email = $2,
                   password_hash = $3,
                   oauth_provider = $4,
                   oauth_id = $5,
                   name = $6,
                   avatar_url = $7,
                   updated_at = now()
             WHERE id = $1
            RETURNING id, email, password_hash, oauth_provider, oauth_id, name, avatar_url,
                      created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.oauth_provider)
        .bind(&user.oauth_id)
        .bind(&user.name)
        .bind(&user.avatar_url)
        .fetch_optional(&self.db)
        .await?;
        updated.ok_or_else(|| StoreError::Backend(format!("user {} not found", user.id)))
    }
}
