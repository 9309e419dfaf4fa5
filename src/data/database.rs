//! SQLite database operations
//!
//! All database access goes through this module.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use super::store::{StoreError, UserStore};
use crate::metrics::USER_STORE_QUERIES_TOTAL;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            StoreError::from(e)
        })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Number of user rows, used by tests and diagnostics.
    pub async fn count_users(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =========================================================================
// Users
// =========================================================================

#[async_trait]
impl UserStore for Database {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        USER_STORE_QUERIES_TOTAL
            .with_label_values(&["find_by_email"])
            .inc();

        let user = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        USER_STORE_QUERIES_TOTAL
            .with_label_values(&["find_by_id"])
            .inc();

        let user = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        USER_STORE_QUERIES_TOTAL.with_label_values(&["insert"]).inc();

        let id = UserId::new();
        let created_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.as_str())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        // Read back through the pool so the caller sees the committed row.
        let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;

        Ok(record)
    }
}
