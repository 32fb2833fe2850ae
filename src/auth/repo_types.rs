use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>, // Argon2 hash, absent for OAuth-only accounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    #[cfg(test)]
    pub fn is_linked_to(&self, provider: &str, oauth_id: &str) -> bool {
        self.oauth_provider.as_deref() == Some(provider) && self.oauth_id.as_deref() == Some(oauth_id)
    }
}

/// Fields supplied when inserting a user; id and timestamps come from storage.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub oauth_provider: Option<String>,
    pub oauth_id: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl NewUser {
    pub fn with_password(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password_hash: Some(password_hash.into()),
            ..Self::default()
        }
    }

    /// Whether the record would carry at least one way to authenticate.
    pub fn has_credential(&self) -> bool {
        self.password_hash.is_some() || (self.oauth_provider.is_some() && self.oauth_id.is_some())
    }
}
