//! Anti-forgery state carried across the OAuth redirect.
//!
//! The pending request lives in a signed, HTTP-only cookie scoped to `/auth`.
//! A cookie with a bad signature reads as absent, and the callback always
//! clears it, so a state value can be presented at most once.

use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};

use crate::{auth::providers::Provider, config::SessionConfig};

pub const STATE_COOKIE: &str = "oauth_state";
const COOKIE_PATH: &str = "/auth";
const STATE_BYTES: usize = 32;

/// 32 bytes from the OS CSPRNG, base64url without padding.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// One in-flight authorization handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub provider: Provider,
    pub state: String,
    pub issued_at: OffsetDateTime,
}

impl AuthorizationRequest {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            state: generate_state(),
            issued_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn is_expired(&self, ttl: Duration, now: OffsetDateTime) -> bool {
        now - self.issued_at > ttl || self.issued_at > now + Duration::minutes(1)
    }

    // Cookie values cannot hold JSON safely; provider and state never contain '.'.
    fn encode(&self) -> String {
        format!(
            "{}.{}.{}",
            self.provider,
            self.state,
            self.issued_at.unix_timestamp()
        )
    }

    fn decode(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, '.');
        let provider = parts.next()?.parse().ok()?;
        let state = parts.next().filter(|s| !s.is_empty())?.to_string();
        let issued_at = parts.next()?.parse::<i64>().ok()?;
        Some(Self {
            provider,
            state,
            issued_at: OffsetDateTime::from_unix_timestamp(issued_at).ok()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StateCookie {
    secure: bool,
    ttl: Duration,
}

impl StateCookie {
    pub fn new(cfg: &SessionConfig) -> Self {
        Self {
            secure: cfg.cookie_secure,
            ttl: Duration::minutes(cfg.state_ttl_minutes),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self, jar: SignedCookieJar, request: &AuthorizationRequest) -> SignedCookieJar {
        let cookie = Cookie::build((STATE_COOKIE, request.encode()))
            .path(COOKIE_PATH)
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(self.ttl)
            .build();
        jar.add(cookie)
    }

    /// Reads the pending request and schedules its removal.
    pub fn take(&self, jar: SignedCookieJar) -> (SignedCookieJar, Option<AuthorizationRequest>) {
        let pending = jar
            .get(STATE_COOKIE)
            .and_then(|c| AuthorizationRequest::decode(c.value()));
        let jar = jar.remove(Cookie::build(STATE_COOKIE).path(COOKIE_PATH).build());
        (jar, pending)
    }
}
