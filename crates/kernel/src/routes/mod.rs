//! HTTP route handlers.

pub mod admin_user;
pub mod auth;
pub mod front;
pub mod happening;
pub mod health;
pub mod helpers;
pub mod member;
pub mod names;

use axum::Router;
use axum::middleware::from_fn_with_state;

use crate::middleware::resolve_principal;
use crate::state::AppState;

/// Every route of the application, with the principal resolved for each
/// request.
///
/// The session layer is left to the caller and must wrap the result.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .merge(front::router(&state))
        .merge(auth::router())
        .merge(admin_user::router(&state))
        .merge(happening::router(&state))
        .merge(member::router(&state))
        .merge(health::router())
        .layer(from_fn_with_state(state.clone(), resolve_principal))
        .with_state(state)
}
