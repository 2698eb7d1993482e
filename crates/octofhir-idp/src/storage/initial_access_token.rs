//! Initial access token storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::InitialAccessToken;

/// Storage trait for registration initial access tokens.
#[async_trait]
pub trait InitialAccessTokenStorage: Send + Sync {
    /// Stores a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn create(&self, token: &InitialAccessToken) -> AuthResult<()>;

    /// Finds an unexpired token by digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<InitialAccessToken>>;

    /// Atomically marks an unused, unexpired token as used by `client_id`.
    ///
    /// Returns `false` if the token is unknown, expired, or already used.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn mark_used(&self, token_hash: &str, client_id: &str) -> AuthResult<bool>;
}
