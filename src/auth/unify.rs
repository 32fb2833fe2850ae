//! Resolves a provider identity to exactly one local account.
//!
//! Lookup order, first match wins:
//! 1. an account already linked to `(provider, provider_user_id)`;
//! 2. an account with the same email, which gets linked to the provider;
//! 3. a new OAuth-only account.
//!
//! Every step finishes with a single `update` or `insert`, so a failure
//! never leaves a half-written record.

use thiserror::Error;
use tracing::{info, warn};

use crate::auth::{
    password::normalize_email,
    providers::{Provider, ProviderProfile},
    repo::{StoreError, UserStore},
    repo_types::{NewUser, User},
};

#[derive(Debug, Error)]
pub enum UnifyError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("account already exists for this email or identity")]
    Conflict,
    /// The provider did not vouch for the email, so it cannot be used to
    /// take over an existing account.
    #[error("provider email {0} is not verified")]
    UnverifiedEmail(String),
}

impl From<StoreError> for UnifyError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => Self::Conflict,
            StoreError::Backend(msg) => Self::Storage(msg),
        }
    }
}

pub async fn unify(
    users: &dyn UserStore,
    provider: Provider,
    profile: &ProviderProfile,
) -> Result<User, UnifyError> {
    let email = normalize_email(&profile.email);

    if let Some(mut user) = users
        .find_by_oauth_identity(provider.as_str(), &profile.provider_user_id)
        .await?
    {
        user.name = profile.name.clone();
        user.avatar_url = profile.avatar_url.clone();
        let user = users.update(&user).await?;
        info!(user_id = user.id, %provider, "oauth identity matched");
        return Ok(user);
    }

    if let Some(mut user) = users.find_by_email(&email).await? {
        if !profile.email_verified {
            warn!(user_id = user.id, %provider, "refusing to link unverified provider email");
            return Err(UnifyError::UnverifiedEmail(email));
        }
        let previous = user.oauth_provider.replace(provider.as_str().to_string());
        user.oauth_id = Some(profile.provider_user_id.clone());
        user.name = profile.name.clone();
        user.avatar_url = profile.avatar_url.clone();
        let user = users.update(&user).await?;
        info!(
            user_id = user.id,
            %provider,
            previous_provider = previous.as_deref().unwrap_or("none"),
            "oauth identity linked to existing account"
        );
        return Ok(user);
    }

    let user = users
        .insert(NewUser {
            email,
            password_hash: None,
            oauth_provider: Some(provider.as_str().to_string()),
            oauth_id: Some(profile.provider_user_id.clone()),
            name: profile.name.clone(),
            avatar_url: profile.avatar_url.clone(),
        })
        .await?;
    info!(user_id = user.id, %provider, "oauth account created");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::memory::MemoryUserStore;

    fn profile(id: &str, email: &str, name: &str) -> ProviderProfile {
        ProviderProfile {
            provider_user_id: id.into(),
            email: email.into(),
            email_verified: true,
            name: Some(name.into()),
            avatar_url: Some(format!("https://img.example/{name}.png")),
        }
    }

    #[tokio::test]
    async fn creates_oauth_only_account() {
        let store = MemoryUserStore::new();
        let user = unify(&store, Provider::Github, &profile("42", "New@X.com", "octo"))
            .await
            .expect("unify");
        assert_eq!(user.email, "new@x.com");
        assert!(!user.has_password());
        assert!(user.is_linked_to("github", "42"));
        assert_eq!(user.name.as_deref(), Some("octo"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn repeat_login_refreshes_profile_and_keeps_id() {
        let store = MemoryUserStore::new();
        let first = unify(&store, Provider::Google, &profile("g1", "a@x.com", "Ada"))
            .await
            .unwrap();
        let second = unify(&store, Provider::Google, &profile("g1", "a@x.com", "Ada L."))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name.as_deref(), Some("Ada L."));
        assert_eq!(second.avatar_url.as_deref(), Some("https://img.example/Ada L..png"));
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn identity_match_wins_over_email() {
        let store = MemoryUserStore::new();
        let linked = unify(&store, Provider::Github, &profile("7", "old@x.com", "octo"))
            .await
            .unwrap();
        // The provider now reports a different email for the same identity.
        let again = unify(&store, Provider::Github, &profile("7", "changed@x.com", "octo"))
            .await
            .unwrap();
        assert_eq!(again.id, linked.id);
        assert_eq!(again.email, "old@x.com");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn links_existing_password_account_by_email() {
        let store = MemoryUserStore::new();
        let existing = store
            .insert(NewUser::with_password("a@x.com", "$argon2id$hash"))
            .await
            .unwrap();

        let user = unify(&store, Provider::Google, &profile("g1", "A@x.com", "Ada"))
            .await
            .unwrap();
        assert_eq!(user.id, existing.id);
        assert_eq!(user.password_hash.as_deref(), Some("$argon2id$hash"));
        assert!(user.is_linked_to("google", "g1"));
        assert_eq!(store.count_by_email("a@x.com"), 1);
    }

    #[tokio::test]
    async fn second_provider_replaces_the_link() {
        let store = MemoryUserStore::new();
        let first = unify(&store, Provider::Google, &profile("g1", "a@x.com", "Ada"))
            .await
            .unwrap();
        let second = unify(&store, Provider::Github, &profile("99", "a@x.com", "ada"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.is_linked_to("github", "99"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unverified_email_does_not_take_over_account() {
        let store = MemoryUserStore::new();
        store
            .insert(NewUser::with_password("a@x.com", "$argon2id$hash"))
            .await
            .unwrap();
        let mut unverified = profile("g1", "a@x.com", "Mallory");
        unverified.email_verified = false;

        let err = unify(&store, Provider::Google, &unverified).await.unwrap_err();
        assert!(matches!(err, UnifyError::UnverifiedEmail(_)));
        let user = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert!(user.oauth_provider.is_none());
        assert!(user.name.is_none());
    }

    #[tokio::test]
    async fn storage_failure_leaves_record_untouched() {
        let store = MemoryUserStore::new();
        store
            .insert(NewUser::with_password("a@x.com", "$argon2id$hash"))
            .await
            .unwrap();
        store.fail_writes();

        let err = unify(&store, Provider::Google, &profile("g1", "a@x.com", "Ada"))
            .await
            .unwrap_err();
        assert!(matches!(err, UnifyError::Storage(_)));
        let user = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert!(user.oauth_provider.is_none());
        assert!(user.oauth_id.is_none());
    }
}
