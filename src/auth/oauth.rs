//! Google OAuth flow
//!
//! Implements the browser side of the authorization code flow and hands the
//! confirmed identity to the [`ProviderCallbackHandler`](super::ProviderCallbackHandler).

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::cookies::{removal_cookie, token_cookie};
use super::middleware::CurrentUser;
use super::provider::GOOGLE_CALLBACK_PATH;
use super::session::{
    OAUTH_STATE_COOKIE, OAuthState, SESSION_COOKIE, Session, create_session_token,
    create_state_token, verify_state_token,
};
use crate::AppState;
use crate::error::AppError;
use crate::metrics::PROVIDER_CALLBACKS_TOTAL;

/// Create authentication router
///
/// Routes:
/// - GET /auth/google - Redirect to Google
/// - GET /auth/google/callback - OAuth callback
/// - GET /auth/me - Current session user
/// - POST /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/auth/google", get(google_redirect))
        .route(GOOGLE_CALLBACK_PATH, get(google_callback))
        .route("/auth/me", get(current_user))
        .route("/logout", post(logout))
}

// =============================================================================
// Google OAuth
// =============================================================================

/// GET /auth/google
///
/// Redirects user to the Google authorization page.
///
/// # Steps
/// 1. Generate CSRF state and PKCE verifier
/// 2. Store both in a signed cookie
/// 3. Redirect to Google
async fn google_redirect(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let request = state.provider.authorization_request();
    let oauth_state = OAuthState::new(request.csrf_state, request.pkce_verifier);
    let token = create_state_token(&oauth_state, &state.config.auth.session_secret)?;

    let jar = jar.add(token_cookie(
        OAUTH_STATE_COOKIE,
        token,
        state.config.server.is_https(),
    ));

    Ok((jar, Redirect::to(&request.url)))
}

/// Query parameters from the provider callback
#[derive(Debug, Deserialize)]
struct CallbackQuery {
    /// Authorization code
    code: Option<String>,
    /// CSRF state token
    state: Option<String>,
    /// Set instead of `code` when the user denied access
    error: Option<String>,
}

/// GET /auth/google/callback
///
/// Handles OAuth callback from Google.
///
/// # Steps
/// 1. Verify CSRF state against the signed cookie
/// 2. Exchange code for tokens and fetch the profile
/// 3. Find or create the local user
/// 4. Store the encoded user id in the session cookie
/// 5. Redirect to the success (or failure) location
async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let provider = state.provider.name();
    let auth = &state.config.auth;

    let oauth_state = verify_csrf_state(query.state.as_deref(), &jar, &auth.session_secret)?;
    let jar = jar.add(removal_cookie(OAUTH_STATE_COOKIE));
    let failure = Redirect::to(&auth.failure_redirect);

    if let Some(error) = query.error {
        tracing::warn!(provider, %error, "Provider returned an authorization error");
        record_callback(provider, "denied");
        return Ok((jar, failure));
    }

    let code = query
        .code
        .ok_or_else(|| AppError::Validation("missing authorization code".to_string()))?;

    let (tokens, profile) = match state
        .provider
        .exchange_code(&code, &oauth_state.pkce_verifier)
        .await
    {
        Ok(exchanged) => exchanged,
        Err(error) => {
            tracing::error!(provider, %error, "Provider code exchange failed");
            record_callback(provider, "error");
            return Ok((jar, failure));
        }
    };

    let user = match state.callback.resolve_with_outcome(&tokens, &profile).await {
        Ok((user, resolution)) => {
            record_callback(provider, resolution.as_str());
            user
        }
        Err(error) => {
            tracing::error!(provider, %error, "Provider sign-in rejected");
            record_callback(provider, "error");
            return Ok((jar, failure));
        }
    };

    let session = Session::new(state.codec.encode(&user), auth.session_max_age);
    let token = create_session_token(&session, &auth.session_secret)?;
    let jar = jar.add(token_cookie(
        SESSION_COOKIE,
        token,
        state.config.server.is_https(),
    ));

    tracing::info!(provider, user_id = %user.id, "Session established");

    Ok((jar, Redirect::to(&auth.success_redirect)))
}

// =============================================================================
// Session
// =============================================================================

/// GET /auth/me
///
/// Returns the user restored from the session.
async fn current_user(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(user)
}

/// POST /logout
///
/// Clears session cookies and redirects to the root.
async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar
        .add(removal_cookie(SESSION_COOKIE))
        .add(removal_cookie(OAUTH_STATE_COOKIE));
    (jar, Redirect::to("/"))
}

// =============================================================================
// Helpers
// =============================================================================

/// Verify CSRF state from cookie matches callback state
fn verify_csrf_state(
    returned: Option<&str>,
    jar: &CookieJar,
    secret: &str,
) -> Result<OAuthState, AppError> {
    let cookie = jar.get(OAUTH_STATE_COOKIE).ok_or(AppError::Unauthorized)?;
    let oauth_state = verify_state_token(cookie.value(), secret)?;

    match returned {
        Some(returned) if returned == oauth_state.csrf_state => Ok(oauth_state),
        _ => {
            tracing::warn!("OAuth state mismatch");
            Err(AppError::Unauthorized)
        }
    }
}

fn record_callback(provider: &str, outcome: &str) {
    PROVIDER_CALLBACKS_TOTAL
        .with_label_values(&[provider, outcome])
        .inc();
}
