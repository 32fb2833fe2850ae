use tracing::{error, info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, SignupRequest},
        password::{
            hash_password, is_valid_email, normalize_email, verify_or_decoy, MIN_PASSWORD_LEN,
        },
        repo_types::{NewUser, User},
    },
    error::{AuthError, AuthResult},
    state::AppState,
};

/// Signs a session token for `user` and wraps both into the response body.
pub(crate) fn respond_with_token(state: &AppState, user: User) -> AuthResult<AuthResponse> {
    let token = state.tokens.issue(user.id, &user.email).map_err(|e| {
        error!(error = %e, user_id = user.id, "jwt sign failed");
        AuthError::Internal(e.to_string())
    })?;
    Ok(AuthResponse { user, token })
}

// Argon2 is CPU bound; keep it off the async workers.
async fn run_blocking<T, F>(f: F) -> AuthResult<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .map_err(|e| AuthError::Internal(e.to_string()))
}

pub async fn signup(state: &AppState, req: SignupRequest) -> AuthResult<AuthResponse> {
    let email = normalize_email(&req.email);

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::Validation("Invalid email".into()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::Conflict);
    }

    let password = req.password;
    let hash = run_blocking(move || hash_password(&password)).await?;

    // A concurrent signup for the same email loses at the unique index.
    let user = state
        .users
        .insert(NewUser::with_password(email, hash))
        .await?;

    info!(user_id = user.id, email = %user.email, "user registered");
    respond_with_token(state, user)
}

pub async fn login(state: &AppState, req: LoginRequest) -> AuthResult<AuthResponse> {
    let email = normalize_email(&req.email);

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::Validation("Invalid email".into()));
    }
    if req.password.is_empty() {
        return Err(AuthError::Validation("Password is required".into()));
    }

    let found = state.users.find_by_email(&email).await?;

    // Unknown emails and OAuth-only accounts still run one argon2 verify.
    let stored = found.as_ref().and_then(|u| u.password_hash.clone());
    let password = req.password;
    let ok = run_blocking(move || verify_or_decoy(&password, stored.as_deref())).await?;

    let user = match found {
        Some(user) if ok => user,
        Some(user) if !user.has_password() => {
            warn!(user_id = user.id, "login attempt on oauth-only account");
            return Err(AuthError::InvalidCredentials);
        }
        Some(user) => {
            warn!(user_id = user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }
        None => {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    info!(user_id = user.id, email = %user.email, "user logged in");
    respond_with_token(state, user)
}
