//! User consent storage trait.
//!
//! Consents are keyed by `(user_id, client_id)` and used to skip the consent
//! screen when a later request asks for a subset of the approved scopes.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Consent;

/// Storage trait for user consent records.
#[async_trait]
pub trait ConsentStorage: Send + Sync {
    /// Finds the consent for a user+client combination.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find(&self, user_id: &str, client_id: &str) -> AuthResult<Option<Consent>>;

    /// Saves or replaces consent for a user+client combination (upsert).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn save(&self, consent: &Consent) -> AuthResult<()>;

    /// Revokes consent. Returns `false` if none existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke(&self, user_id: &str, client_id: &str) -> AuthResult<bool>;

    /// Lists all consents granted by a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list_for_user(&self, user_id: &str) -> AuthResult<Vec<Consent>>;
}
