//! Scripted provider for exercising the callback flow without network I/O.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{OAuthProvider, Provider, ProviderProfile};
use crate::error::{AuthError, AuthResult};

pub struct FakeProvider {
    kind: Provider,
    profile: Mutex<ProviderProfile>,
    fail_exchange: bool,
    hide_email: Mutex<bool>,
    exchanged: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new(kind: Provider, profile: ProviderProfile) -> Self {
        Self {
            kind,
            profile: Mutex::new(profile),
            fail_exchange: false,
            hide_email: Mutex::new(false),
            exchanged: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_exchange(kind: Provider, profile: ProviderProfile) -> Self {
        Self {
            fail_exchange: true,
            ..Self::new(kind, profile)
        }
    }

    /// Replaces what the next `fetch_profile` returns.
    pub fn set_profile(&self, profile: ProviderProfile) {
        *self.profile.lock().unwrap() = profile;
    }

    /// Makes `fetch_profile` behave like a provider that shares no address.
    pub fn hide_email(&self) {
        *self.hide_email.lock().unwrap() = true;
    }

    /// Codes seen by `exchange_code`, in order.
    pub fn exchanged_codes(&self) -> Vec<String> {
        self.exchanged.lock().unwrap().clone()
    }
}

pub fn profile(id: &str, email: &str, name: &str) -> ProviderProfile {
    ProviderProfile {
        provider_user_id: id.into(),
        email: email.into(),
        email_verified: true,
        name: Some(name.into()),
        avatar_url: Some(format!("https://img.example/{id}.png")),
    }
}

#[async_trait]
impl OAuthProvider for FakeProvider {
    fn kind(&self) -> Provider {
        self.kind
    }

    fn authorization_url(&self, state: &str) -> AuthResult<String> {
        Ok(format!("https://idp.example/{}/authorize?state={state}", self.kind))
    }

    async fn exchange_code(&self, code: &str) -> AuthResult<String> {
        self.exchanged.lock().unwrap().push(code.to_string());
        if self.fail_exchange {
            return Err(AuthError::ExchangeFailed("invalid_grant".into()));
        }
        Ok(format!("access-{code}"))
    }

    async fn fetch_profile(&self, access_token: &str) -> AuthResult<ProviderProfile> {
        if !access_token.starts_with("access-") {
            return Err(AuthError::ProfileFetchFailed("bad token".into()));
        }
        if *self.hide_email.lock().unwrap() {
            return Err(AuthError::NoEmailAvailable);
        }
        Ok(self.profile.lock().unwrap().clone())
    }
}
