use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{build_url, non_empty, read_access_token, OAuthProvider, Provider, ProviderProfile};
use crate::{
    config::OAuthClientConfig,
    error::{AuthError, AuthResult},
};

const OAUTH_BASE: &str = "https://github.com/login/oauth";
const API_BASE: &str = "https://api.github.com";
const SCOPES: &str = "user:email";
const API_ACCEPT: &str = "application/vnd.github+json";

#[derive(Clone)]
pub struct GithubProvider {
    client: OAuthClientConfig,
    http: reqwest::Client,
    oauth_base: String,
    api_base: String,
}

impl GithubProvider {
    pub fn new(client: OAuthClientConfig, http: reqwest::Client) -> Self {
        Self {
            client,
            http,
            oauth_base: OAUTH_BASE.into(),
            api_base: API_BASE.into(),
        }
    }

    #[cfg(test)]
    fn with_bases(mut self, oauth_base: &str, api_base: &str) -> Self {
        self.oauth_base = oauth_base.trim_end_matches('/').into();
        self.api_base = api_base.trim_end_matches('/').into();
        self
    }

    async fn get_json<T>(&self, url: &str, access_token: &str) -> AuthResult<T>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, API_ACCEPT)
            .send()
            .await
            .map_err(|e| AuthError::ProfileFetchFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AuthError::ProfileFetchFailed(format!(
                "{url} returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AuthError::ProfileFetchFailed(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubEmail {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

/// Primary address if flagged, otherwise the first one listed.
fn pick_email(emails: &[GithubEmail]) -> Option<&GithubEmail> {
    let listed = move || emails.iter().filter(|e| !e.email.trim().is_empty());
    listed().find(|e| e.primary).or_else(|| listed().next())
}

fn to_profile(user: GithubUser, email: String, email_verified: bool) -> ProviderProfile {
    ProviderProfile {
        provider_user_id: user.id.to_string(),
        email,
        email_verified,
        name: non_empty(user.name).or(Some(user.login)),
        avatar_url: non_empty(user.avatar_url),
    }
}

#[async_trait]
impl OAuthProvider for GithubProvider {
    fn kind(&self) -> Provider {
        Provider::Github
    }

    fn authorization_url(&self, state: &str) -> AuthResult<String> {
        build_url(
            &format!("{}/authorize", self.oauth_base),
            &[
                ("client_id", self.client.client_id.as_str()),
                ("redirect_uri", self.client.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
            ],
        )
    }

    async fn exchange_code(&self, code: &str) -> AuthResult<String> {
        let params = [
            ("code", code),
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
            ("redirect_uri", self.client.redirect_url.as_str()),
        ];
        let response = self
            .http
            .post(format!("{}/access_token", self.oauth_base))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;
        read_access_token(Provider::Github, response).await
    }

    async fn fetch_profile(&self, access_token: &str) -> AuthResult<ProviderProfile> {
        let user: GithubUser = self
            .get_json(&format!("{}/user", self.api_base), access_token)
            .await?;

        // GitHub only exposes verified addresses as the public profile email.
        if let Some(email) = non_empty(user.email.clone()) {
            return Ok(to_profile(user, email, true));
        }

        debug!(github_id = user.id, "profile email hidden, listing account emails");
        let emails: Vec<GithubEmail> = self
            .get_json(&format!("{}/user/emails", self.api_base), access_token)
            .await?;
        let chosen = pick_email(&emails).cloned().ok_or(AuthError::NoEmailAvailable)?;
        Ok(to_profile(user, chosen.email, chosen.verified))
    }
}
