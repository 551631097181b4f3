use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::error::AppError;
use crate::services::RepositoryService;
use crate::state::AppState;
use crate::user::schemas::UserUnprotectedView;

/// The authenticated user of a request.
///
/// Resolved from `Authorization: Bearer <access token>`: the token must verify
/// against the access secret and its subject must name an existing user. Any
/// failure rejects the request with 401 and `WWW-Authenticate: Bearer`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserUnprotectedView);

fn credentials_error() -> AppError {
    AppError::Unauthorized("Could not validate credentials".to_string())
}

/// Token part of a `Bearer` authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(credentials_error)?;
        let claims = state.tokens.verify_access_token(token).map_err(|e| {
            tracing::warn!("Rejected access token: {}", e);
            credentials_error()
        })?;

        let mut conn = state.db.acquire().await?;
        let user = state.users.repository().get_by_email(&mut *conn, &claims.sub).await?;
        match user {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                tracing::warn!(email = %claims.sub, "Token subject does not match any user");
                Err(credentials_error())
            }
        }
    }
}
