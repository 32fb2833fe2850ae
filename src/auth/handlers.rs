use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::SignedCookieJar;
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, AuthUrlResponse, CallbackQuery, LoginRequest, MeResponse, SignupRequest},
        extractors::AuthUser,
        oauth,
        providers::Provider,
        services,
    },
    error::{AuthError, AuthResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/me", get(get_me))
        .route("/auth/callback/:provider", get(oauth_callback))
        .route("/auth/:provider", get(oauth_start))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AuthResult<T> {
    payload.map(|Json(v)| v).map_err(|e| {
        warn!(error = %e, "rejected request body");
        AuthError::Validation(e.body_text())
    })
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> AuthResult<(StatusCode, Json<AuthResponse>)> {
    let resp = services::signup(&state, body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AuthResult<Json<AuthResponse>> {
    let resp = services::login(&state, body(payload)?).await?;
    Ok(Json(resp))
}

#[instrument(skip(state, jar))]
pub async fn oauth_start(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Path(provider): Path<String>,
) -> AuthResult<(SignedCookieJar, Json<AuthUrlResponse>)> {
    let provider: Provider = provider.parse()?;
    let (pending, auth_url) = oauth::start(&state, provider)?;
    let jar = state.state_cookie.store(jar, &pending);
    Ok((jar, Json(AuthUrlResponse { auth_url })))
}

/// The state cookie is cleared on every outcome, so a callback URL works once.
#[instrument(skip(state, jar, query))]
pub async fn oauth_callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let (jar, pending) = state.state_cookie.take(jar);
    let result = match provider.parse::<Provider>() {
        Ok(provider) => oauth::callback(&state, provider, pending, query).await,
        Err(_) => {
            warn!(provider = %provider, "callback for unknown provider");
            Err(AuthError::InvalidState)
        }
    };
    match result {
        Ok(resp) => (jar, Json(resp)).into_response(),
        Err(e) => (jar, e).into_response(),
    }
}

#[instrument(skip(state, claims))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AuthResult<Json<MeResponse>> {
    let user = state.users.find_by_id(claims.user_id).await?.ok_or_else(|| {
        warn!(user_id = claims.user_id, "token for a user that no longer exists");
        AuthError::Unauthorized("User not found".into())
    })?;
    Ok(Json(MeResponse { user }))
}
