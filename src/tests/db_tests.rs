#[cfg(test)]
mod tests {
    use crate::config::DatabaseConfig;
    use crate::db;
    use tempfile::NamedTempFile;

    async fn setup_test_db() -> (sqlx::SqlitePool, NamedTempFile) {
        let temp_db = NamedTempFile::new().unwrap();
        let cfg = DatabaseConfig {
            url: format!("sqlite://{}", temp_db.path().display()),
            max_connections: 1,
        };
        let pool = db::connect(&cfg).await.unwrap();
        db::init_db(&pool).await.unwrap();
        (pool, temp_db)
    }

    #[tokio::test]
    async fn test_init_db_creates_tables() {
        let (pool, _file) = setup_test_db().await;

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .fetch_all(&pool)
                .await
                .unwrap();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"user_addresses".to_string()));
    }

    #[tokio::test]
    async fn test_init_db_is_idempotent() {
        let (pool, _file) = setup_test_db().await;
        db::init_db(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_defaults_and_unique_email() {
        let (pool, _file) = setup_test_db().await;

        sqlx::query("INSERT INTO users (email, password) VALUES (?, ?)")
            .bind("ada@example.com")
            .bind("hash")
            .execute(&pool)
            .await
            .unwrap();

        let (created_at, updated_at): (String, String) =
            sqlx::query_as("SELECT created_at, updated_at FROM users WHERE email = ?")
                .bind("ada@example.com")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&created_at).is_ok());
        assert_eq!(created_at, updated_at);

        let duplicate = sqlx::query("INSERT INTO users (email, password) VALUES (?, ?)")
            .bind("ada@example.com")
            .bind("other")
            .execute(&pool)
            .await;
        match duplicate {
            Err(sqlx::Error::Database(e)) => assert!(e.is_unique_violation()),
            other => panic!("expected unique violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_addresses_cascade_with_user() {
        let (pool, _file) = setup_test_db().await;

        let user_id: i64 = sqlx::query_scalar("INSERT INTO users (email, password) VALUES (?, ?) RETURNING id")
            .bind("ada@example.com")
            .bind("hash")
            .fetch_one(&pool)
            .await
            .unwrap();
        for city in ["London", "Paris"] {
            sqlx::query("INSERT INTO user_addresses (user_id, city) VALUES (?, ?)")
                .bind(user_id)
                .bind(city)
                .execute(&pool)
                .await
                .unwrap();
        }

        sqlx::query("DELETE FROM users WHERE id = ?").bind(user_id).execute(&pool).await.unwrap();

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_addresses")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_address_requires_existing_user() {
        let (pool, _file) = setup_test_db().await;

        let orphan = sqlx::query("INSERT INTO user_addresses (user_id, city) VALUES (?, ?)")
            .bind(42_i64)
            .bind("Nowhere")
            .execute(&pool)
            .await;
        assert!(orphan.is_err());
    }
}
