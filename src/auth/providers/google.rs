use async_trait::async_trait;
use serde::Deserialize;

use super::{build_url, non_empty, read_access_token, OAuthProvider, Provider, ProviderProfile};
use crate::{
    config::OAuthClientConfig,
    error::{AuthError, AuthResult},
};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const SCOPES: &str = "openid profile email";

#[derive(Clone)]
pub struct GoogleProvider {
    client: OAuthClientConfig,
    http: reqwest::Client,
    token_url: String,
    userinfo_url: String,
}

impl GoogleProvider {
    pub fn new(client: OAuthClientConfig, http: reqwest::Client) -> Self {
        Self {
            client,
            http,
            token_url: TOKEN_URL.into(),
            userinfo_url: USERINFO_URL.into(),
        }
    }

    #[cfg(test)]
    fn with_base(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.token_url = format!("{base}/token");
        self.userinfo_url = format!("{base}/oauth2/v2/userinfo");
        self
    }
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: Option<String>,
    #[serde(default)]
    verified_email: bool,
    name: Option<String>,
    picture: Option<String>,
}

impl GoogleUserInfo {
    fn into_profile(self) -> AuthResult<ProviderProfile> {
        let email = non_empty(self.email).ok_or(AuthError::NoEmailAvailable)?;
        Ok(ProviderProfile {
            provider_user_id: self.id,
            email,
            email_verified: self.verified_email,
            name: non_empty(self.name),
            avatar_url: non_empty(self.picture),
        })
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn kind(&self) -> Provider {
        Provider::Google
    }

    fn authorization_url(&self, state: &str) -> AuthResult<String> {
        build_url(
            AUTH_URL,
            &[
                ("client_id", self.client.client_id.as_str()),
                ("redirect_uri", self.client.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
                ("access_type", "offline"),
            ],
        )
    }

    async fn exchange_code(&self, code: &str) -> AuthResult<String> {
        let params = [
            ("code", code),
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
            ("redirect_uri", self.client.redirect_url.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;
        read_access_token(Provider::Google, response).await
    }

    async fn fetch_profile(&self, access_token: &str) -> AuthResult<ProviderProfile> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::ProfileFetchFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AuthError::ProfileFetchFailed(format!(
                "google userinfo returned {}",
                response.status()
            )));
        }
        let info: GoogleUserInfo = response
            .json()
            .await
            .map_err(|e| AuthError::ProfileFetchFailed(e.to_string()))?;
        info.into_profile()
    }
}
