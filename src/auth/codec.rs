//! Session user codec
//!
//! The session cookie carries only a user id. `encode` produces it at sign-in,
//! `decode` turns it back into the stored user on later requests.

use std::sync::Arc;

use crate::data::{StoreError, UserId, UserRecord, UserStore};
use crate::error::AuthError;
use crate::metrics::SESSION_RESOLUTIONS_TOTAL;

#[derive(Clone)]
pub struct SessionUserCodec {
    store: Arc<dyn UserStore>,
}

impl SessionUserCodec {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Identifier to place in the session.
    pub fn encode(&self, user: &UserRecord) -> UserId {
        user.user_id()
    }

    /// Load the user a session points at.
    ///
    /// A user deleted since the session was issued is reported the same way
    /// as any other store failure.
    pub async fn decode(&self, id: &UserId) -> Result<UserRecord, AuthError> {
        let result = match self.store.find_user_by_id(id.as_str()).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(AuthError::SessionResolution(StoreError::NotFound)),
            Err(error) => Err(AuthError::SessionResolution(error)),
        };

        match &result {
            Ok(_) => SESSION_RESOLUTIONS_TOTAL.with_label_values(&["success"]).inc(),
            Err(error) => {
                tracing::debug!(user_id = %id, %error, "Session user could not be resolved");
                SESSION_RESOLUTIONS_TOTAL.with_label_values(&["error"]).inc();
            }
        }

        result
    }
}
