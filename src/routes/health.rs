use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::state::AppState;

/// Upper bound for the readiness round trip to SQLite.
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Liveness: answers as long as the process serves requests.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness: the pool hands out a connection and every registered entity
/// has its table.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let tables: Vec<&str> = state.registry.entities().map(|e| e.table).collect();
    let check = async {
        let present: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(&state.db)
                .await?;
        Ok::<_, sqlx::Error>(
            tables.iter().filter(|t| !present.iter().any(|p| p == *t)).copied().collect::<Vec<_>>(),
        )
    };

    match tokio::time::timeout(READY_TIMEOUT, check).await {
        Ok(Ok(missing)) if missing.is_empty() => (StatusCode::OK, "ready").into_response(),
        Ok(Ok(missing)) => {
            tracing::warn!(?missing, "Readiness check: schema incomplete");
            (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: missing tables {}", missing.join(", ")))
                .into_response()
        }
        Ok(Err(e)) => {
            tracing::warn!("Readiness check: database unavailable: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response()
        }
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

/// Build information plus the entities this instance serves.
pub async fn version(State(state): State<AppState>) -> impl IntoResponse {
    let mut entities: Vec<&str> = state.registry.entities().map(|e| e.name).collect();
    entities.sort_unstable();
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
        "entities": entities,
    }))
}
