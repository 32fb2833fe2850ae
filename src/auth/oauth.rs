//! Authorization-code handshake: start issues a state, callback redeems it.

use constant_time_eq::constant_time_eq;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, CallbackQuery},
        providers::Provider,
        services::respond_with_token,
        session::AuthorizationRequest,
        unify::unify,
    },
    error::{AuthError, AuthResult},
    state::AppState,
};

/// Returns the pending request to persist and the URL to send the browser to.
pub fn start(state: &AppState, provider: Provider) -> AuthResult<(AuthorizationRequest, String)> {
    let client = state.providers.get(provider)?;
    let request = AuthorizationRequest::new(provider);
    let url = client.authorization_url(&request.state)?;
    info!(%provider, "oauth flow started");
    Ok((request, url))
}

fn check_state(
    provider: Provider,
    pending: Option<&AuthorizationRequest>,
    received: Option<&str>,
    ttl: time::Duration,
) -> AuthResult<()> {
    let Some(pending) = pending else {
        warn!(%provider, "callback without pending oauth state");
        return Err(AuthError::InvalidState);
    };
    if pending.provider != provider {
        warn!(%provider, expected = %pending.provider, "callback for a different provider");
        return Err(AuthError::InvalidState);
    }
    if pending.is_expired(ttl, OffsetDateTime::now_utc()) {
        warn!(%provider, "oauth state expired");
        return Err(AuthError::InvalidState);
    }
    match received {
        Some(got) if constant_time_eq(got.as_bytes(), pending.state.as_bytes()) => Ok(()),
        _ => {
            warn!(%provider, "oauth state mismatch");
            Err(AuthError::InvalidState)
        }
    }
}

/// Redeems a callback. `pending` is whatever the state cookie held, already
/// removed from the client by the caller.
pub async fn callback(
    state: &AppState,
    provider: Provider,
    pending: Option<AuthorizationRequest>,
    query: CallbackQuery,
) -> AuthResult<AuthResponse> {
    check_state(
        provider,
        pending.as_ref(),
        query.state.as_deref(),
        state.state_cookie.ttl(),
    )?;
    // Only `start` writes a pending request, so an unconfigured provider cannot get here
    // with a valid state.
    let client = state.providers.get(provider).map_err(|_| AuthError::InvalidState)?;

    if let Some(reason) = &query.error {
        warn!(%provider, reason = %reason, "provider denied authorization");
    }
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingCode)?;

    let access_token = client.exchange_code(&code).await.inspect_err(|e| {
        error!(%provider, error = %e, "code exchange failed");
    })?;
    let profile = client.fetch_profile(&access_token).await.inspect_err(|e| {
        error!(%provider, error = %e, "profile fetch failed");
    })?;

    let user = unify(state.users.as_ref(), provider, &profile)
        .await
        .map_err(|e| AuthError::UserProcessingFailed(e.to_string()))?;

    info!(user_id = user.id, %provider, "oauth login completed");
    respond_with_token(state, user)
}
