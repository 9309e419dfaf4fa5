//! Google OAuth authentication
//!
//! Handles:
//! - Google OAuth flow
//! - Find-or-create of the local user
//! - Session management
//! - Authentication extractors

mod callback;
mod codec;
mod cookies;
mod middleware;
mod oauth;
pub mod profile;
mod provider;
pub mod session;

pub use callback::{ProviderCallbackHandler, Resolution};
pub use codec::SessionUserCodec;
pub use middleware::{CurrentUser, authenticate_token};
pub use oauth::auth_router;
pub use profile::{ProfileValue, ProviderProfile, ProviderTokens};
pub use provider::{
    AuthorizationRequest, GOOGLE_CALLBACK_PATH, GoogleStrategy, IdentityProvider,
    google_callback_url,
};
pub use session::{Session, create_session_token, verify_session_token};
