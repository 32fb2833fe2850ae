//! Third-party identity providers for the authorization-code flow.
//!
//! Each provider knows its endpoints, scopes and profile shape. Everything
//! else about the handshake (state, unification, token issuance) lives in
//! [`crate::auth::oauth`].

use std::{collections::HashMap, fmt, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::{
    config::OAuthConfig,
    error::{AuthError, AuthResult},
};

#[cfg(test)]
pub mod fake;
mod github;
mod google;

pub use github::GithubProvider;
pub use google::GoogleProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Github,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Self::Google),
            "github" => Ok(Self::Github),
            _ => Err(AuthError::UnknownProvider),
        }
    }
}

/// Normalized profile returned by every provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_user_id: String,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn kind(&self) -> Provider;

    /// Authorization URL with `state` embedded as a query parameter.
    fn authorization_url(&self, state: &str) -> AuthResult<String>;

    /// Trades an authorization code for a provider access token.
    async fn exchange_code(&self, code: &str) -> AuthResult<String>;

    async fn fetch_profile(&self, access_token: &str) -> AuthResult<ProviderProfile>;
}

/// Enabled providers, keyed by name.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<Provider, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    pub fn from_config(cfg: &OAuthConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build oauth http client")?;

        let mut registry = Self::default();
        if let Some(google) = &cfg.google {
            registry.register(Arc::new(GoogleProvider::new(google.clone(), http.clone())));
        }
        if let Some(github) = &cfg.github {
            registry.register(Arc::new(GithubProvider::new(github.clone(), http)));
        }
        info!(providers = ?registry.enabled(), "oauth providers configured");
        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn OAuthProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn get(&self, provider: Provider) -> AuthResult<Arc<dyn OAuthProvider>> {
        self.providers
            .get(&provider)
            .cloned()
            .ok_or(AuthError::UnknownProvider)
    }

    pub fn enabled(&self) -> Vec<Provider> {
        let mut names: Vec<Provider> = self.providers.keys().copied().collect();
        names.sort_by_key(|p| p.as_str());
        names
    }
}

/// Token endpoint body. GitHub reports failures with a 200 and an `error` field.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_access_token(self) -> Result<String, String> {
        if let Some(err) = self.error {
            return Err(match self.error_description {
                Some(desc) => format!("{err}: {desc}"),
                None => err,
            });
        }
        self.access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| "token response without access_token".to_string())
    }
}

async fn read_access_token(provider: Provider, response: reqwest::Response) -> AuthResult<String> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(%provider, %status, body = %body, "token exchange rejected");
        return Err(AuthError::ExchangeFailed(format!("{provider} token endpoint returned {status}")));
    }
    let parsed: TokenResponse = response
        .json()
        .await
        .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;
    parsed
        .into_access_token()
        .map_err(|e| AuthError::ExchangeFailed(format!("{provider}: {e}")))
}

fn build_url(base: &str, params: &[(&str, &str)]) -> AuthResult<String> {
    reqwest::Url::parse_with_params(base, params)
        .map(String::from)
        .map_err(|e| AuthError::Internal(format!("build authorization url: {e}")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
