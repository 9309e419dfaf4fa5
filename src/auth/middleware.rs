//! Authentication extractors
//!
//! Restore the signed-in user from the session cookie (or a bearer token
//! carrying the same signed value) on every request that asks for it.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;

use super::cookies::removal_cookie;
use super::session::{SESSION_COOKIE, verify_session_token};
use crate::AppState;
use crate::data::UserRecord;
use crate::error::{AppError, AuthError};

fn extract_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
        .or_else(|| {
            let jar = CookieJar::from_headers(headers);
            jar.get(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_owned())
        })
}

/// Verify a session token and load the user it names.
pub async fn authenticate_token(token: &str, state: &AppState) -> Result<UserRecord, AppError> {
    let session = verify_session_token(token, &state.config.auth.session_secret)?;
    let user = state.codec.decode(&session.user_id).await?;
    Ok(user)
}

/// Rejection for requests without a usable session
///
/// A session whose user can no longer be resolved is invalidated by
/// removing the cookie along with the 401.
#[derive(Debug)]
pub struct SessionRejection {
    error: AppError,
}

impl From<AppError> for SessionRejection {
    fn from(error: AppError) -> Self {
        Self { error }
    }
}

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        match self.error {
            AppError::Auth(AuthError::SessionResolution(_)) => {
                let jar = CookieJar::new().add(removal_cookie(SESSION_COOKIE));
                (jar, self.error).into_response()
            }
            error => error.into_response(),
        }
    }
}

/// Extractor for current authenticated user
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}", user.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = SessionRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<UserRecord>().cloned() {
            return Ok(CurrentUser(user));
        }

        let state = AppState::from_ref(state);
        let token = extract_token_from_headers(&parts.headers).ok_or(AppError::Unauthorized)?;
        let user = authenticate_token(&token, &state).await?;
        parts.extensions.insert(user.clone());

        Ok(CurrentUser(user))
    }
}
