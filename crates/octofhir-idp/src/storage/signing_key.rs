//! Signing key storage trait.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::SigningKey;

/// Storage trait for signing keys.
///
/// Backends must maintain the invariant that at most one stored key is active.
/// Keys whose grace period has ended are reported as absent by every read.
#[async_trait]
pub trait SigningKeyStorage: Send + Sync {
    /// Returns the active key, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_active(&self) -> AuthResult<Option<SigningKey>>;

    /// Finds an unexpired key by `kid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_kid(&self, kid: &str) -> AuthResult<Option<SigningKey>>;

    /// Lists every unexpired key, active first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list_valid(&self) -> AuthResult<Vec<SigningKey>>;

    /// Installs `new_key` as the active key in one step.
    ///
    /// The previously active key, if any, becomes inactive with
    /// `expires_at = retire_at`. Returns the retired key.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_key` is not marked active or the write fails.
    async fn rotate(
        &self,
        new_key: &SigningKey,
        retire_at: OffsetDateTime,
    ) -> AuthResult<Option<SigningKey>>;

    /// Removes keys whose grace period has ended.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
