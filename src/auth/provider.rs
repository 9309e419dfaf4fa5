//! Identity provider strategy
//!
//! The OAuth2 protocol work (authorization URL, PKCE, code exchange) is done
//! by the `oauth2` crate. This module configures it for Google and turns the
//! userinfo response into a [`ProviderProfile`].

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};

use super::profile::{GoogleUserInfo, ProviderProfile, ProviderTokens};
use crate::config::GoogleOAuthConfig;
use crate::error::ProviderError;

/// Path the provider redirects back to, appended to the public base URL
pub const GOOGLE_CALLBACK_PATH: &str = "/auth/google/callback";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Everything needed to send the browser to the provider
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub csrf_state: String,
    pub pkce_verifier: String,
}

/// An OAuth2 identity provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short provider name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Build the authorization URL with a fresh CSRF state and PKCE challenge.
    fn authorization_request(&self) -> AuthorizationRequest;

    /// Exchange an authorization code and fetch the signed-in user's profile.
    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<(ProviderTokens, ProviderProfile), ProviderError>;
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Full redirect URL for a public base URL
pub fn google_callback_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), GOOGLE_CALLBACK_PATH)
}

/// Google sign-in (authorization code flow with PKCE)
pub struct GoogleStrategy {
    client: ConfiguredClient,
    http_client: reqwest::Client,
}

impl GoogleStrategy {
    /// Configure the strategy from credentials and the public base URL.
    pub fn new(config: &GoogleOAuthConfig, base_url: &str) -> Result<Self, ProviderError> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(GOOGLE_AUTH_URL.to_string())?)
            .set_token_uri(TokenUrl::new(GOOGLE_TOKEN_URL.to_string())?)
            .set_redirect_uri(RedirectUrl::new(google_callback_url(base_url))?);

        // Token endpoint responses must not be followed across redirects.
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("oauthgate/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            http_client,
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, ProviderError> {
        let info: GoogleUserInfo = self
            .http_client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !info.email_verified {
            tracing::warn!(sub = %info.sub, "Google account email is not verified");
        }

        Ok(info.into())
    }
}

#[async_trait]
impl IdentityProvider for GoogleStrategy {
    fn name(&self) -> &'static str {
        "google"
    }

    fn authorization_request(&self) -> AuthorizationRequest {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        AuthorizationRequest {
            url: auth_url.to_string(),
            csrf_state: csrf_state.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        }
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<(ProviderTokens, ProviderProfile), ProviderError> {
        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| ProviderError::TokenExchange(e.to_string()))?;

        let tokens = ProviderTokens {
            access_token: token_result.access_token().secret().clone(),
            refresh_token: token_result
                .refresh_token()
                .map(|token| token.secret().clone()),
        };

        let profile = self.fetch_profile(&tokens.access_token).await?;
        Ok((tokens, profile))
    }
}
