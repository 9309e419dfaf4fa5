//! oauthgate - Google sign-in bound to a local user store
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - /auth/google redirect + callback                         │
//! │  - /auth/me, /logout                                        │
//! │  - /health, /metrics                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Auth Layer                             │
//! │  - GoogleStrategy (oauth2 code exchange + userinfo)         │
//! │  - ProviderCallbackHandler (find-or-create)                 │
//! │  - SessionUserCodec (user <-> session id)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - SQLite user store (sqlx)                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: Metrics endpoint
//! - `auth`: Google OAuth, find-or-create and session handling
//! - `data`: User store
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus counters

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned for each request. Everything inside is either immutable or
/// internally pooled.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Identity provider (Google in production)
    pub provider: Arc<dyn auth::IdentityProvider>,

    /// Find-or-create on provider sign-in
    pub callback: auth::ProviderCallbackHandler,

    /// Session identity encoding
    pub codec: auth::SessionUserCodec,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Connect to SQLite database and run migrations
    /// 2. Configure the Google strategy
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!(path = %config.database.path.display(), "Database connected");

        let provider = auth::GoogleStrategy::new(&config.auth.google, &config.server.base_url)?;
        tracing::info!(
            redirect_url = %auth::google_callback_url(&config.server.base_url),
            "Google strategy configured"
        );

        tracing::info!("Application state initialized successfully");

        Ok(Self::from_parts(config, Arc::new(db), Arc::new(provider)))
    }

    /// Assemble state from already constructed collaborators.
    pub fn from_parts(
        config: config::AppConfig,
        store: Arc<dyn data::UserStore>,
        provider: Arc<dyn auth::IdentityProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            callback: auth::ProviderCallbackHandler::new(store.clone()),
            codec: auth::SessionUserCodec::new(store),
            provider,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.is_https() {
        return CorsLayer::permissive();
    }

    let allowed_origin = url::Url::parse(&server.base_url)
        .map(|url| url.origin().ascii_serialization())
        .unwrap_or_else(|_| server.base_url.clone());
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
