//! Authorization code storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::AuthorizationCode;

/// Storage trait for authorization codes.
///
/// Expired codes must be reported as absent by every read.
#[async_trait]
pub trait AuthorizationCodeStorage: Send + Sync {
    /// Stores a newly issued code.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()>;

    /// Looks up a code without consuming it.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_code(&self, code: &str) -> AuthResult<Option<AuthorizationCode>>;

    /// Atomically removes and returns a code.
    ///
    /// This is the one-time-use guarantee: of any number of concurrent callers
    /// presenting the same code, at most one receives `Some`. An expired code is
    /// removed as well and reported as `None`, so `cleanup_expired` will not
    /// count it afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn consume(&self, code: &str) -> AuthResult<Option<AuthorizationCode>>;

    /// Removes expired codes. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
