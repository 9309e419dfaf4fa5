//! Provider callback handling
//!
//! Maps a provider-confirmed identity to exactly one local user, registering
//! the user on first sign-in.

use std::sync::Arc;

use super::profile::{ProviderProfile, ProviderTokens};
use crate::data::{NewUser, StoreError, UserRecord, UserStore};
use crate::error::AuthError;

/// How a successful callback resolved the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// An existing user signed in
    Login,
    /// A user row was created for this sign-in
    Registration,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Login => "login",
            Resolution::Registration => "registration",
        }
    }
}

/// Find-or-create over the user store, keyed on the profile's canonical email
#[derive(Clone)]
pub struct ProviderCallbackHandler {
    store: Arc<dyn UserStore>,
}

impl ProviderCallbackHandler {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Resolve the local user for a provider sign-in.
    ///
    /// Tokens are not used beyond logging their presence.
    pub async fn resolve(
        &self,
        tokens: &ProviderTokens,
        profile: &ProviderProfile,
    ) -> Result<UserRecord, AuthError> {
        self.resolve_with_outcome(tokens, profile)
            .await
            .map(|(user, _)| user)
    }

    /// Like [`resolve`](Self::resolve), also reporting whether the user was
    /// found or created.
    ///
    /// # Errors
    /// - [`AuthError::MissingEmail`] if the profile has no email; the store is not touched
    /// - [`AuthError::Lookup`] if the email lookup fails for a reason other than "no rows"
    /// - [`AuthError::Creation`] if the insert fails
    pub async fn resolve_with_outcome(
        &self,
        tokens: &ProviderTokens,
        profile: &ProviderProfile,
    ) -> Result<(UserRecord, Resolution), AuthError> {
        tracing::debug!(
            profile_id = %profile.id,
            emails = profile.emails.len(),
            display_name = %profile.display_name,
            has_refresh_token = tokens.refresh_token.is_some(),
            "Provider callback received"
        );

        let Some(email) = profile.canonical_email() else {
            tracing::warn!(profile_id = %profile.id, "No email found in provider profile");
            return Err(AuthError::MissingEmail);
        };
        let name = profile.display_name.as_str();
        if let Some(picture) = profile.canonical_photo() {
            tracing::trace!(%picture, "Provider profile picture");
        }

        tracing::debug!(%email, "Looking for existing user");

        match self.store.find_user_by_email(email).await {
            Ok(Some(user)) => {
                tracing::info!(user_id = %user.id, %email, "Existing user signed in");
                return Ok((user, Resolution::Login));
            }
            Ok(None) => {}
            Err(error) => {
                tracing::error!(%error, %email, "Failed to look up user by email");
                return Err(AuthError::Lookup(error));
            }
        }

        tracing::debug!(%email, "Creating new user");

        match self.store.insert_user(NewUser::from_provider(name, email)).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, %email, "New user registered");
                Ok((user, Resolution::Registration))
            }
            Err(StoreError::Conflict(reason)) => self.refetch_after_conflict(email, reason).await,
            Err(error) => {
                tracing::error!(%error, %email, "Failed to create user");
                Err(AuthError::Creation(error))
            }
        }
    }

    /// A concurrent sign-in registered the same email between our lookup and
    /// insert. The row it created is this user.
    async fn refetch_after_conflict(
        &self,
        email: &str,
        reason: String,
    ) -> Result<(UserRecord, Resolution), AuthError> {
        tracing::warn!(%email, %reason, "User insert conflicted, re-fetching");

        match self.store.find_user_by_email(email).await {
            Ok(Some(user)) => {
                tracing::info!(user_id = %user.id, %email, "Existing user signed in");
                Ok((user, Resolution::Login))
            }
            Ok(None) => Err(AuthError::Creation(StoreError::Conflict(reason))),
            Err(error) => {
                tracing::error!(%error, %email, "Failed to re-fetch user after conflict");
                Err(AuthError::Creation(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::profile::ProfileValue;
    use crate::data::{Database, MockUserStore};
    use chrono::Utc;
    use tempfile::TempDir;

    fn tokens() -> ProviderTokens {
        ProviderTokens {
            access_token: "access".to_string(),
            refresh_token: None,
        }
    }

    fn profile(name: &str, emails: &[&str]) -> ProviderProfile {
        ProviderProfile {
            id: "google-sub-1".to_string(),
            display_name: name.to_string(),
            emails: emails.iter().copied().map(ProfileValue::new).collect(),
            photos: vec![ProfileValue::new("https://example.com/ann.png")],
        }
    }

    fn stored(name: &str, email: &str) -> UserRecord {
        UserRecord {
            id: "01HZX8J6Q4M2V7K3T9N5B1C0DE".to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password: None,
            created_at: Utc::now(),
        }
    }

    async fn sqlite_store() -> (Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::connect(&temp_dir.path().join("users.db"))
            .await
            .unwrap();
        (Arc::new(db), temp_dir)
    }

    #[tokio::test]
    async fn missing_email_touches_no_store() {
        // No expectations: any store call panics.
        let handler = ProviderCallbackHandler::new(Arc::new(MockUserStore::new()));

        let err = handler
            .resolve(&tokens(), &profile("Ann", &[]))
            .await
            .expect_err("profile without email must fail");
        assert!(matches!(err, AuthError::MissingEmail));
    }

    #[tokio::test]
    async fn existing_user_is_returned_without_write() {
        let existing = stored("Ann", "a@x.com");
        let returned = existing.clone();

        let mut store = MockUserStore::new();
        store
            .expect_find_user_by_email()
            .withf(|email| email == "a@x.com")
            .times(1)
            .returning(move |_| Ok(Some(returned.clone())));
        store.expect_insert_user().never();

        let handler = ProviderCallbackHandler::new(Arc::new(store));
        let (user, outcome) = handler
            .resolve_with_outcome(&tokens(), &profile("Ann2", &["a@x.com"]))
            .await
            .unwrap();

        assert_eq!(user, existing);
        assert_eq!(outcome, Resolution::Login);
    }

    #[tokio::test]
    async fn lookup_failure_skips_creation() {
        let mut store = MockUserStore::new();
        store
            .expect_find_user_by_email()
            .times(1)
            .returning(|_| Err(StoreError::Database(sqlx::Error::PoolTimedOut)));
        store.expect_insert_user().never();

        let handler = ProviderCallbackHandler::new(Arc::new(store));
        let err = handler
            .resolve(&tokens(), &profile("Ann", &["a@x.com"]))
            .await
            .expect_err("lookup failure must propagate");

        assert!(matches!(
            err,
            AuthError::Lookup(StoreError::Database(sqlx::Error::PoolTimedOut))
        ));
    }

    #[tokio::test]
    async fn new_user_is_created_without_password() {
        let mut store = MockUserStore::new();
        store
            .expect_find_user_by_email()
            .times(1)
            .returning(|_| Ok(None));
        store
            .expect_insert_user()
            .withf(|user| {
                user.name == "Ann" && user.email == "a@x.com" && user.password.is_none()
            })
            .times(1)
            .returning(|user| Ok(stored(&user.name, &user.email)));

        let handler = ProviderCallbackHandler::new(Arc::new(store));
        let (user, outcome) = handler
            .resolve_with_outcome(&tokens(), &profile("Ann", &["a@x.com", "other@x.com"]))
            .await
            .unwrap();

        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.password, None);
        assert_eq!(outcome, Resolution::Registration);
    }

    #[tokio::test]
    async fn insert_failure_is_creation_error() {
        let mut store = MockUserStore::new();
        store.expect_find_user_by_email().returning(|_| Ok(None));
        store
            .expect_insert_user()
            .times(1)
            .returning(|_| Err(StoreError::Database(sqlx::Error::PoolClosed)));

        let handler = ProviderCallbackHandler::new(Arc::new(store));
        let err = handler
            .resolve(&tokens(), &profile("Ann", &["a@x.com"]))
            .await
            .expect_err("insert failure must propagate");

        assert!(matches!(
            err,
            AuthError::Creation(StoreError::Database(sqlx::Error::PoolClosed))
        ));
    }

    #[tokio::test]
    async fn insert_conflict_returns_concurrently_created_user() {
        let winner = stored("Ann", "a@x.com");
        let returned = winner.clone();

        let mut store = MockUserStore::new();
        let mut lookups = 0;
        store
            .expect_find_user_by_email()
            .times(2)
            .returning(move |_| {
                lookups += 1;
                if lookups == 1 {
                    Ok(None)
                } else {
                    Ok(Some(returned.clone()))
                }
            });
        store.expect_insert_user().times(1).returning(|_| {
            Err(StoreError::Conflict(
                "UNIQUE constraint failed: users.email".to_string(),
            ))
        });

        let handler = ProviderCallbackHandler::new(Arc::new(store));
        let (user, outcome) = handler
            .resolve_with_outcome(&tokens(), &profile("Ann", &["a@x.com"]))
            .await
            .unwrap();

        assert_eq!(user, winner);
        assert_eq!(outcome, Resolution::Login);
    }

    #[tokio::test]
    async fn conflict_without_row_is_creation_error() {
        let mut store = MockUserStore::new();
        store
            .expect_find_user_by_email()
            .times(2)
            .returning(|_| Ok(None));
        store
            .expect_insert_user()
            .returning(|_| Err(StoreError::Conflict("users.email".to_string())));

        let handler = ProviderCallbackHandler::new(Arc::new(store));
        let err = handler
            .resolve(&tokens(), &profile("Ann", &["a@x.com"]))
            .await
            .expect_err("unresolvable conflict must fail");

        assert!(matches!(err, AuthError::Creation(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn registers_ann_then_signs_her_in_unchanged() {
        let (db, _temp_dir) = sqlite_store().await;
        let handler = ProviderCallbackHandler::new(db.clone());

        let (created, outcome) = handler
            .resolve_with_outcome(&tokens(), &profile("Ann", &["a@x.com"]))
            .await
            .unwrap();
        assert_eq!(outcome, Resolution::Registration);
        assert_eq!(created.name, "Ann");
        assert_eq!(created.email, "a@x.com");
        assert_eq!(created.password, None);
        assert!(!created.id.is_empty());

        let (again, outcome) = handler
            .resolve_with_outcome(&tokens(), &profile("Ann2", &["a@x.com"]))
            .await
            .unwrap();
        assert_eq!(outcome, Resolution::Login);
        assert_eq!(again, created);
        assert_eq!(again.name, "Ann");
        assert_eq!(db.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_sign_ins_resolve_to_one_user() {
        let (db, _temp_dir) = sqlite_store().await;
        let handler = ProviderCallbackHandler::new(db.clone());

        let first_profile = profile("Ann", &["race@x.com"]);
        let second_profile = profile("Ann", &["race@x.com"]);
        let first_tokens = tokens();
        let second_tokens = tokens();
        let (first, second) = tokio::join!(
            handler.resolve(&first_tokens, &first_profile),
            handler.resolve(&second_tokens, &second_profile),
        );

        assert_eq!(first.unwrap().id, second.unwrap().id);
        assert_eq!(db.count_users().await.unwrap(), 1);
    }
}
