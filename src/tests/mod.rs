//! Integration and unit tests for the crudstack application.
//!
//! ## Test Modules
//!
//! - **repository_tests**: Generic repository against a real SQLite database
//! - **api_tests**: User endpoints through the router
//! - **auth_tests**: Token issuing, refresh and the bearer extractor
//! - **error_tests**: Error envelope and conversions
//! - **config_tests**: Configuration loading and validation
//! - **db_tests**: Schema creation and constraints
//! - **health_api_tests**: Health check endpoints
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test
//! cargo test repository_tests
//! ```

pub mod db_tests;
pub mod repository_tests;

#[cfg(test)]
pub(crate) mod support {
    use axum::body::Body;
    use axum::http::Response;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tempfile::NamedTempFile;

    use crate::config::{AppConfig, DatabaseConfig};
    use crate::state::AppState;
    use crate::user::schemas::{UserCreate, UserView};
    use crate::services::RepositoryService;

    /// Application state over a fresh temporary database. The file lives as
    /// long as the returned handle.
    pub async fn test_state() -> (AppState, NamedTempFile) {
        let temp_db = NamedTempFile::new().unwrap();
        let db_cfg = DatabaseConfig {
            url: format!("sqlite://{}", temp_db.path().display()),
            max_connections: 4,
        };
        let pool = crate::db::connect(&db_cfg).await.unwrap();
        crate::db::init_db(&pool).await.unwrap();

        let mut config = AppConfig::default();
        config.database = db_cfg;
        config.auth.bcrypt_cost = 4;

        (AppState::new(pool, config).unwrap(), temp_db)
    }

    pub fn user_create(email: &str) -> UserCreate {
        UserCreate {
            email: email.to_string(),
            password: "password".to_string(),
            first_name: None,
            middle_name: None,
            last_name: None,
            addresses: None,
        }
    }

    /// Creates a user with password `password` through the service.
    pub async fn seed_user(state: &AppState, email: &str) -> UserView {
        let mut tx = state.db.begin().await.unwrap();
        let user = state.users.repository_create_object(&mut *tx, &user_create(email)).await.unwrap();
        tx.commit().await.unwrap();
        user
    }

    /// `Authorization` header value for `email`.
    pub fn bearer(state: &AppState, email: &str) -> String {
        format!("Bearer {}", state.tokens.create_access_token(email).unwrap())
    }

    pub async fn body_json(response: Response<Body>) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }
}
