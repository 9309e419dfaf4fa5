//! Common test utilities for E2E tests

use std::sync::Arc;

use async_trait::async_trait;
use oauthgate::auth::session::{SESSION_COOKIE, Session, create_session_token};
use oauthgate::auth::{
    AuthorizationRequest, IdentityProvider, ProfileValue, ProviderProfile, ProviderTokens,
};
use oauthgate::data::{Database, UserId};
use oauthgate::error::ProviderError;
use oauthgate::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const TEST_SECRET: &str = "test-secret-key-32-bytes-long!!!";
pub const STUB_STATE: &str = "stub-csrf-state";
pub const STUB_CODE: &str = "stub-authorization-code";
pub const STUB_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Identity provider that accepts a single code and returns a fixed profile
pub struct StubProvider {
    pub profile: ProviderProfile,
}

impl StubProvider {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            profile: ProviderProfile {
                id: format!("sub-{email}"),
                display_name: name.to_string(),
                emails: vec![ProfileValue::new(email)],
                photos: vec![ProfileValue::new("https://example.com/photo.png")],
            },
        }
    }
}

#[async_trait]
impl IdentityProvider for StubProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    fn authorization_request(&self) -> AuthorizationRequest {
        AuthorizationRequest {
            url: format!("{STUB_AUTH_URL}?client_id=test-client-id&state={STUB_STATE}"),
            csrf_state: STUB_STATE.to_string(),
            pkce_verifier: "stub-pkce-verifier".to_string(),
        }
    }

    async fn exchange_code(
        &self,
        code: &str,
        _pkce_verifier: &str,
    ) -> Result<(ProviderTokens, ProviderProfile), ProviderError> {
        if code != STUB_CODE {
            return Err(ProviderError::TokenExchange("invalid_grant".to_string()));
        }

        Ok((
            ProviderTokens {
                access_token: "stub-access-token".to_string(),
                refresh_token: None,
            },
            self.profile.clone(),
        ))
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub db: Arc<Database>,
    pub _temp_dir: TempDir,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server whose provider signs in "Test User"
    pub async fn new() -> Self {
        Self::with_provider(StubProvider::new("Test User", "test@example.com")).await
    }

    /// Create a new test server instance around a provider
    pub async fn with_provider(provider: impl IdentityProvider + 'static) -> Self {
        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                base_url: "http://localhost:8080".to_string(),
            },
            database: config::DatabaseConfig {
                path: db_path.clone(),
            },
            auth: config::AuthConfig {
                session_secret: TEST_SECRET.to_string(),
                session_max_age: 604800,
                success_redirect: "/".to_string(),
                failure_redirect: "/login?error=oauth".to_string(),
                google: config::GoogleOAuthConfig {
                    client_id: "test-client-id".to_string(),
                    client_secret: "test-client-secret".to_string(),
                },
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let db = Arc::new(Database::connect(&db_path).await.unwrap());
        let state = AppState::from_parts(config, db.clone(), Arc::new(provider));

        // Create HTTP client
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = oauthgate::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            db,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Start the sign-in flow and return the signed `oauth_state` cookie value
    pub async fn begin_sign_in(&self) -> String {
        let response = self
            .client
            .get(self.url("/auth/google"))
            .send()
            .await
            .expect("request succeeds");
        assert!(response.status().is_redirection());

        cookie_value(&response, "oauth_state").expect("oauth_state cookie")
    }

    /// Run the whole provider round trip and return the callback response
    pub async fn complete_sign_in(&self) -> reqwest::Response {
        let state_cookie = self.begin_sign_in().await;

        self.client
            .get(self.url(&format!(
                "/auth/google/callback?code={STUB_CODE}&state={STUB_STATE}"
            )))
            .header("Cookie", format!("oauth_state={state_cookie}"))
            .send()
            .await
            .expect("request succeeds")
    }

    /// Create a session token for an arbitrary user id
    pub fn create_test_token(&self, user_id: &UserId) -> String {
        let session = Session::new(user_id.clone(), self.state.config.auth.session_max_age);

        create_session_token(&session, &self.state.config.auth.session_secret)
            .expect("Failed to create test token")
    }

    /// Cookie header carrying a session token
    pub fn session_cookie(token: &str) -> String {
        format!("{SESSION_COOKIE}={token}")
    }
}

/// Value of a cookie set by a response, if any
pub fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.strip_prefix(prefix.as_str()))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
        .find(|value| !value.is_empty())
}

/// All `Set-Cookie` header values of a response
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}
