//! Session management
//!
//! Uses HMAC-signed tokens stored in cookies.
//! No server-side session storage needed: the token holds only the user id,
//! the user itself is reloaded through [`super::SessionUserCodec`].

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;

use crate::data::UserId;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Name of the cookie carrying the in-flight authorization state
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

/// How long an authorization round-trip may take
pub const OAUTH_STATE_TTL_SECONDS: i64 = 600;

/// User session data
///
/// Stored in a signed cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Encoded session user
    pub user_id: UserId,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId, max_age_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            created_at: now,
            expires_at: now + Duration::seconds(max_age_seconds),
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// CSRF state and PKCE verifier for one authorization round-trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub csrf_state: String,
    pub pkce_verifier: String,
    pub expires_at: DateTime<Utc>,
}

impl OAuthState {
    pub fn new(csrf_state: String, pkce_verifier: String) -> Self {
        Self {
            csrf_state,
            pkce_verifier,
            expires_at: Utc::now() + Duration::seconds(OAUTH_STATE_TTL_SECONDS),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Create a signed session token
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
///
/// # Arguments
/// * `session` - Session data to encode
/// * `secret` - HMAC secret key
pub fn create_session_token(session: &Session, secret: &str) -> Result<String, AppError> {
    sign_payload(session, secret)
}

/// Verify and decode a session token
///
/// # Errors
/// Returns `Unauthorized` if the signature is invalid, the token is
/// malformed or the session has expired
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, AppError> {
    let session: Session = verify_payload(token, secret)?;
    if session.is_expired() {
        return Err(AppError::Unauthorized);
    }
    Ok(session)
}

/// Create a signed authorization-state token
pub fn create_state_token(state: &OAuthState, secret: &str) -> Result<String, AppError> {
    sign_payload(state, secret)
}

/// Verify and decode an authorization-state token
pub fn verify_state_token(token: &str, secret: &str) -> Result<OAuthState, AppError> {
    let state: OAuthState = verify_payload(token, secret)?;
    if state.is_expired() {
        return Err(AppError::Unauthorized);
    }
    Ok(state)
}

fn sign_payload<T: Serialize>(payload: &T, secret: &str) -> Result<String, AppError> {
    // 1. Serialize payload to JSON
    let payload = serde_json::to_string(payload).map_err(|e| AppError::Internal(e.into()))?;

    // 2. Base64 encode the payload
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    // 3. Create HMAC-SHA256 signature
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    // 4. Return "{payload}.{signature}"
    Ok(format!("{}.{}", payload_b64, signature_b64))
}

fn verify_payload<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, AppError> {
    // 1. Split token into payload and signature
    let (payload_b64, signature_b64) = token.split_once('.').ok_or(AppError::Unauthorized)?;
    if signature_b64.contains('.') {
        return Err(AppError::Unauthorized);
    }

    // 2. Verify HMAC signature
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;

    mac.verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized)?;

    // 3. Decode and deserialize payload
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized)?;

    serde_json::from_slice(&payload_bytes).map_err(|_| AppError::Unauthorized)
}
