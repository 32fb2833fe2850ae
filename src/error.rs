use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Every failure an auth request can end with.
///
/// Dependency failures carry a detail string that is logged server-side and
/// replaced by a generic message in the response body.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("user already exists")]
    Conflict,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid oauth state")]
    InvalidState,

    #[error("missing authorization code")]
    MissingCode,

    #[error("provider returned no email")]
    NoEmailAvailable,

    #[error("unknown oauth provider")]
    UnknownProvider,

    #[error("{0}")]
    Unauthorized(String),

    #[error("code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("profile fetch failed: {0}")]
    ProfileFetchFailed(String),

    #[error("user processing failed: {0}")]
    UserProcessingFailed(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InvalidState
            | Self::MissingCode
            | Self::NoEmailAvailable => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::UnknownProvider => StatusCode::NOT_FOUND,
            Self::ExchangeFailed(_)
            | Self::ProfileFetchFailed(_)
            | Self::UserProcessingFailed(_)
            | Self::Storage(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand to the client.
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::Unauthorized(msg) => msg.clone(),
            Self::Conflict => "User already exists".into(),
            Self::InvalidCredentials => "Invalid credentials".into(),
            Self::InvalidState => "Invalid state parameter".into(),
            Self::MissingCode => "No authorization code received".into(),
            Self::NoEmailAvailable => "No email available from provider".into(),
            Self::UnknownProvider => "Unknown OAuth provider".into(),
            Self::ExchangeFailed(_) => "Failed to exchange authorization code".into(),
            Self::ProfileFetchFailed(_) => "Failed to get user information".into(),
            Self::UserProcessingFailed(_) => "Failed to process user".into(),
            Self::Storage(_) => "Database error".into(),
            Self::Internal(_) => "Internal server error".into(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
