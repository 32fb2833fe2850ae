use crate::state::AppState;
use axum::Router;

pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod jwt;
#[cfg(test)]
pub mod memory;
pub mod oauth;
pub(crate) mod password;
pub mod providers;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod session;
pub mod unify;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
