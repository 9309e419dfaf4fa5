//! Provider identity data
//!
//! What the identity provider hands back after a successful sign-in. None of
//! this is persisted; it lives for one callback invocation.

use serde::{Deserialize, Serialize};

/// A single candidate value (email address, photo URL) from the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileValue {
    pub value: String,
}

impl ProfileValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Identity attributes confirmed by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    /// Provider-side subject identifier
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub emails: Vec<ProfileValue>,
    #[serde(default)]
    pub photos: Vec<ProfileValue>,
}

impl ProviderProfile {
    /// First email candidate, if the provider reported a non-empty one.
    pub fn canonical_email(&self) -> Option<&str> {
        self.emails
            .first()
            .map(|email| email.value.as_str())
            .filter(|email| !email.is_empty())
    }

    /// First photo candidate, if any.
    pub fn canonical_photo(&self) -> Option<&str> {
        self.photos
            .first()
            .map(|photo| photo.value.as_str())
            .filter(|photo| !photo.is_empty())
    }
}

/// Tokens issued by the provider's token endpoint
///
/// Passed through to the callback handler; never stored.
#[derive(Clone)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for ProviderTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderTokens")
            .field("access_token", &"[redacted]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// Google OpenID Connect userinfo response
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub sub: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
}

impl From<GoogleUserInfo> for ProviderProfile {
    fn from(info: GoogleUserInfo) -> Self {
        Self {
            id: info.sub,
            display_name: info.name.unwrap_or_default(),
            emails: info.email.into_iter().map(ProfileValue::new).collect(),
            photos: info.picture.into_iter().map(ProfileValue::new).collect(),
        }
    }
}
