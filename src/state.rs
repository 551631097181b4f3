use std::sync::Arc;

use crate::config::AppConfig;
use crate::entity::Registry;
use crate::user::{models, TokenIssuer, UserRepository, UserService};

/// The shared application state.
///
/// This is the dependency container of the application: it is built once at
/// startup, cloned into every handler by Axum's `State` extractor, and owns
/// everything a request needs apart from its own database connection or
/// transaction.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    ///
    /// Handlers acquire a connection (reads) or begin a transaction (writes)
    /// from it and hand that to the services.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata of every persisted entity.
    ///
    /// Shared by all repositories; table and column names in generated SQL
    /// come only from here.
    pub registry: Arc<Registry>,
    /// User operations: CRUD, password hashing and credential checks.
    pub users: UserService,
    /// Issues and verifies access and refresh tokens.
    pub tokens: TokenIssuer,
}

impl AppState {
    /// Creates a new `AppState` with initialized components.
    ///
    /// # Arguments
    ///
    /// * `db` - The database connection pool, with the schema already created
    /// * `config` - The validated application configuration
    ///
    /// # Errors
    ///
    /// Fails when the entity registry is inconsistent, which is a programming
    /// error surfaced at startup rather than on the first request.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> anyhow::Result<Self> {
        let registry = Arc::new(models::registry()?);
        let users = UserService::new(UserRepository::new(registry.clone())?, config.auth.bcrypt_cost);
        let tokens = TokenIssuer::new(&config.auth);

        Ok(Self { db, config: Arc::new(config), registry, users, tokens })
    }
}
