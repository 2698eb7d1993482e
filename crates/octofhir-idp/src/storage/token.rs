//! Issued token storage trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::TokenRecord;

/// Storage trait for issued access/refresh token pairs.
///
/// Records are addressed by the digests of their token values. A record is
/// visible by access digest while the access token is unexpired, and by
/// refresh digest while the refresh token is unexpired.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Stores a newly issued token pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn create(&self, record: &TokenRecord) -> AuthResult<()>;

    /// Finds a record by access token digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_access_token(&self, access_token_hash: &str)
    -> AuthResult<Option<TokenRecord>>;

    /// Finds a record by refresh token digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_refresh_token(
        &self,
        refresh_token_hash: &str,
    ) -> AuthResult<Option<TokenRecord>>;

    /// Atomically removes and returns the record owning a refresh token.
    ///
    /// Concurrent callers presenting the same refresh token observe at most
    /// one `Some`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn consume_refresh_token(
        &self,
        refresh_token_hash: &str,
    ) -> AuthResult<Option<TokenRecord>>;

    /// Deletes a record by id. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, id: Uuid) -> AuthResult<bool>;

    /// Removes records whose access and refresh halves have both expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
