//! Client registration storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Client;

/// Storage trait for client registrations.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Finds a client by its client ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>>;

    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if a client with the same ID exists or the write fails.
    async fn create(&self, client: &Client) -> AuthResult<Client>;

    /// Replaces an existing client.
    ///
    /// # Errors
    ///
    /// Returns an error if the client does not exist or the write fails.
    async fn update(&self, client: &Client) -> AuthResult<Client>;

    /// Deletes a client. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, client_id: &str) -> AuthResult<bool>;

    /// Lists all clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list(&self) -> AuthResult<Vec<Client>>;
}
