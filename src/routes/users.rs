use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::CurrentUser;
use crate::services::RepositoryService;
use crate::state::AppState;
use crate::types::ResponseList;
use crate::user::schemas::{UserCreate, UserFilter, UserListFilter, UserUpdate, UserView};

pub async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserListFilter>,
) -> AppResult<Json<ResponseList<UserView>>> {
    filter.validate()?;
    let mut conn = state.db.acquire().await?;
    let page = state.users.repository_objects(&mut *conn, &filter).await?;
    Ok(Json(ResponseList::new(page, &filter)))
}

pub async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<UserView>> {
    let mut conn = state.db.acquire().await?;
    let user = state.users.repository_object(&mut *conn, &UserFilter::by_id(id)).await?;
    Ok(Json(user.ok_or_not_found("User")?))
}

pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Json(input): Json<UserCreate>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    input.validate()?;
    let mut tx = state.db.begin().await?;
    let user = state.users.repository_create_object(&mut *tx, &input).await?;
    tx.commit().await?;

    tracing::info!(id = user.id, by = actor.user.id, "Created user");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
    Json(input): Json<UserUpdate>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    input.validate()?;
    let mut tx = state.db.begin().await?;
    let user = state
        .users
        .repository_update_object(&mut *tx, &UserFilter::by_id(id), &input)
        .await?
        .ok_or_not_found("User")?;
    tx.commit().await?;

    tracing::info!(id, by = actor.user.id, "Updated user");
    Ok((StatusCode::ACCEPTED, Json(user)))
}

pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let mut tx = state.db.begin().await?;
    let deleted = state.users.repository_delete_object(&mut *tx, &UserFilter::by_id(id)).await?;
    if !deleted {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    tx.commit().await?;

    tracing::info!(id, by = actor.user.id, "Deleted user");
    Ok(StatusCode::NO_CONTENT)
}
