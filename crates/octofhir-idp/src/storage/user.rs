//! User storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::User;

/// Storage trait for end users.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Finds a user by subject id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: &str) -> AuthResult<Option<User>>;

    /// Finds a user by login name.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>>;

    /// Creates a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the id or username is taken or the write fails.
    async fn create(&self, user: &User) -> AuthResult<User>;
}
