//! Error types for oauthgate
//!
//! Sign-in failures are described by [`AuthError`] and [`ProviderError`].
//! Everything that reaches an HTTP handler is converted to [`AppError`],
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::data::StoreError;

/// Outcome of resolving a provider identity or a session to a local user
///
/// Each variant keeps the store failure that caused it.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider profile carried no email candidate
    #[error("No email found in provider profile")]
    MissingEmail,

    /// Looking up the user by email failed for a reason other than "no rows"
    #[error("User lookup failed: {0}")]
    Lookup(#[source] StoreError),

    /// Inserting the new user failed
    #[error("User creation failed: {0}")]
    Creation(#[source] StoreError),

    /// The user id stored in a session could not be turned back into a user
    #[error("Session user could not be resolved: {0}")]
    SessionResolution(#[source] StoreError),
}

/// Failures talking to the identity provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Invalid endpoint or redirect URL in configuration
    #[error("Invalid provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Authorization code could not be exchanged for tokens
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// HTTP request to the provider failed
    #[error("Provider request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Sign-in or session resolution failed (401 / 500)
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Identity provider failure (502)
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// User store error (500)
    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token signing error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Metric label for the error kind
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::Validation(_) => "validation",
            AppError::Auth(AuthError::MissingEmail) => "missing_email",
            AppError::Auth(AuthError::Lookup(_)) => "user_lookup",
            AppError::Auth(AuthError::Creation(_)) => "user_creation",
            AppError::Auth(AuthError::SessionResolution(_)) => "session_resolution",
            AppError::Provider(_) => "provider",
            AppError::Store(_) => "database",
            AppError::Config(_) => "config",
            AppError::Encryption(_) => "encryption",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Auth(AuthError::MissingEmail) => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            AppError::Auth(AuthError::SessionResolution(_)) => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            AppError::Auth(AuthError::Lookup(_) | AuthError::Creation(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Sign-in failed".to_string(),
            ),
            AppError::Provider(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
            ),
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Encryption(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.error_type()]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
