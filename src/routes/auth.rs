use axum::{extract::State, Form, Json};

use crate::error::{AppError, AppResult};
use crate::services::RepositoryService;
use crate::state::AppState;
use crate::user::schemas::{AccessTokenResponse, CredentialsForm, RefreshRequest};

/// Password grant: exchanges email and password for a token pair.
pub async fn authorize(
    State(state): State<AppState>,
    Form(credentials): Form<CredentialsForm>,
) -> AppResult<Json<AccessTokenResponse>> {
    let mut conn = state.db.acquire().await?;
    let user = state
        .users
        .authenticate_user(&mut *conn, &credentials.username, &credentials.password)
        .await?
        .ok_or_else(|| {
            tracing::warn!(email = %credentials.username, "Failed login attempt");
            AppError::Unauthorized("Incorrect email or password".to_string())
        })?;

    let tokens = state.tokens.issue(&user.user.email).map_err(anyhow::Error::from)?;
    Ok(Json(tokens))
}

/// Exchanges a valid refresh token for a new token pair.
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<AccessTokenResponse>> {
    let invalid = || AppError::Unauthorized("Could not validate credentials".to_string());
    let email = state.tokens.check_refresh_token(&body.refresh_token).map_err(|e| {
        tracing::warn!("Rejected refresh token: {}", e);
        invalid()
    })?;

    // The user may have been deleted since the token was issued.
    let mut conn = state.db.acquire().await?;
    if state.users.repository().get_by_email(&mut *conn, &email).await?.is_none() {
        return Err(invalid());
    }

    let tokens = state.tokens.issue(&email).map_err(anyhow::Error::from)?;
    Ok(Json(tokens))
}
