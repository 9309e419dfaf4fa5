//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override), including a `.env` file
//!
//! The conventional `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `BACKEND_URL`,
//! `SESSION_SECRET` and `DATABASE_PATH` variables are honoured on top of the
//! prefixed `OAUTHGATE__*` form.

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public URL the provider redirects back to (e.g., "https://api.example.com")
    pub base_url: String,
}

impl ServerConfig {
    /// Whether cookies must carry the `Secure` attribute
    pub fn is_https(&self) -> bool {
        url::Url::parse(&self.base_url)
            .map(|url| url.scheme() == "https")
            .unwrap_or(false)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Session secret key (32+ bytes)
    pub session_secret: String,
    /// Session max age in seconds (default: 604800 = 7 days)
    pub session_max_age: i64,
    /// Where to send the browser after a successful sign-in
    pub success_redirect: String,
    /// Where to send the browser after a failed sign-in
    pub failure_redirect: String,
    pub google: GoogleOAuthConfig,
}

/// Google OAuth configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (OAUTHGATE__*)
    /// 5. Conventional bare variables (GOOGLE_CLIENT_ID, ...)
    ///
    /// # Errors
    /// Returns error if configuration is missing or invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        dotenvy::dotenv().ok();

        let env = |key: &str| std::env::var(key).ok();

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.path", "data/oauthgate.db")?
            .set_default("auth.session_max_age", 604800)?
            .set_default("auth.success_redirect", "/")?
            .set_default("auth.failure_redirect", "/login?error=oauth")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (OAUTHGATE__*)
            .add_source(
                Environment::with_prefix("OAUTHGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("auth.google.client_id", env("GOOGLE_CLIENT_ID"))?
            .set_override_option("auth.google.client_secret", env("GOOGLE_CLIENT_SECRET"))?
            .set_override_option("server.base_url", env("BACKEND_URL"))?
            .set_override_option("auth.session_secret", env("SESSION_SECRET"))?
            .set_override_option("database.path", env("DATABASE_PATH"))?
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.auth.session_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "auth.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.auth.session_max_age <= 0 {
            return Err(crate::error::AppError::Config(
                "auth.session_max_age must be greater than 0".to_string(),
            ));
        }

        let base_url = url::Url::parse(&self.server.base_url).map_err(|e| {
            crate::error::AppError::Config(format!("server.base_url is not a valid URL: {e}"))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(crate::error::AppError::Config(
                "server.base_url must use http or https".to_string(),
            ));
        }

        if !self.server.is_https() {
            tracing::warn!(
                base_url = %self.server.base_url,
                "Using insecure session cookies; serve over https in production"
            );
        }

        Ok(())
    }
}
