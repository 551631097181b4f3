//! HTTP route handlers.
//!
//! - `auth`: token issuing (`/auth/authorize`, `/auth/refresh`)
//! - `health`: liveness, readiness and build information
//! - `users`: CRUD over users and their addresses

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub mod auth;
pub mod health;
pub mod users;

/// All API routes, without the outer layers added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/version", get(health::version))
        .route("/user", get(users::list_users).post(users::create_user))
        .route(
            "/user/{id}",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/auth/authorize", post(auth::authorize))
        .route("/auth/refresh", post(auth::refresh))
        .with_state(state)
}
