use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

/// Minimum length accepted for `SESSION_SECRET_KEY` (cookie signing key material).
pub const MIN_SESSION_KEY_LEN: usize = 64;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret_key: String,
    pub cookie_secure: bool,
    pub state_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub google: Option<OAuthClientConfig>,
    pub github: Option<OAuthClientConfig>,
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
    pub oauth: OAuthConfig,
    pub cors_allowed_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parsed(&get, "APP_PORT", 8080)?;
        let listen_addr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("APP_HOST {host} is not a valid address"))?;

        let database_url = required(&get, "DATABASE_URL")?;

        let jwt = JwtConfig {
            secret: required(&get, "JWT_SECRET")?,
            ttl_minutes: parsed(&get, "JWT_TTL_MINUTES", 60 * 24)?,
        };

        let secret_key = required(&get, "SESSION_SECRET_KEY")?;
        anyhow::ensure!(
            secret_key.len() >= MIN_SESSION_KEY_LEN,
            "SESSION_SECRET_KEY must be at least {MIN_SESSION_KEY_LEN} bytes"
        );
        let session = SessionConfig {
            secret_key,
            cookie_secure: parsed(&get, "SESSION_COOKIE_SECURE", true)?,
            state_ttl_minutes: parsed(&get, "OAUTH_STATE_TTL_MINUTES", 10)?,
        };

        let redirect_base = required(&get, "OAUTH_REDIRECT_URL")?;
        let redirect_base = redirect_base.trim_end_matches('/');
        let oauth = OAuthConfig {
            google: client(&get, "GOOGLE", format!("{redirect_base}/google"))?,
            github: client(&get, "GITHUB", format!("{redirect_base}/github"))?,
            http_timeout_secs: parsed(&get, "OAUTH_HTTP_TIMEOUT_SECS", 10)?,
        };

        Ok(Self {
            listen_addr,
            database_url,
            jwt,
            session,
            oauth,
            cors_allowed_origin: get("CORS_ALLOWED_ORIGIN").filter(|v| !v.trim().is_empty()),
        })
    }
}

fn required<F>(get: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("{key} is not set"))
}

fn parsed<F, T>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key}: {e}")),
        None => Ok(default),
    }
}

// A provider is enabled only when its client id is present.
fn client<F>(get: &F, prefix: &str, redirect_url: String) -> anyhow::Result<Option<OAuthClientConfig>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(client_id) = get(&format!("{prefix}_CLIENT_ID")).filter(|v| !v.trim().is_empty())
    else {
        return Ok(None);
    };
    let client_secret = required(get, &format!("{prefix}_CLIENT_SECRET"))?;
    Ok(Some(OAuthClientConfig {
        client_id,
        client_secret,
        redirect_url,
    }))
}
