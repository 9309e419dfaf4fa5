//! User store abstraction
//!
//! The sign-in flow only needs three operations from persistence, so they
//! sit behind a trait. [`super::Database`] is the SQLite implementation.

use async_trait::async_trait;
use thiserror::Error;

use super::models::{NewUser, UserRecord};

/// Failures reported by a [`UserStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// Query matched no row
    #[error("no matching user row")]
    NotFound,

    /// Insert rejected by a uniqueness constraint
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// Schema migration failed
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Any other driver or connectivity failure
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.message().to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch the single user whose email equals `email`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(UserRecord))` if a row matches.
    /// * `Ok(None)` if no row matches.
    /// * `Err(StoreError)` for any other failure.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Fetch the single user with the given identifier.
    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Insert one row and return it as stored.
    ///
    /// The identifier and creation timestamp are generated by the store.
    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;
}
