//! Storage traits for identity provider data.
//!
//! The engine only depends on these traits. Each entity collection has its
//! own trait so backends can lock, shard, or persist collections
//! independently. [`memory::InMemoryStorage`] implements all of them.
//!
//! Every read treats expired records as absent. Operations that enforce
//! single use (`consume`, `consume_refresh_token`, `mark_used`, `rotate`) must
//! be atomic with respect to concurrent callers.

pub mod client;
pub mod code;
pub mod consent;
pub mod initial_access_token;
pub mod memory;
pub mod session;
pub mod signing_key;
pub mod token;
pub mod user;

use std::sync::Arc;

pub use client::ClientStorage;
pub use code::AuthorizationCodeStorage;
pub use consent::ConsentStorage;
pub use initial_access_token::InitialAccessTokenStorage;
pub use memory::InMemoryStorage;
pub use session::{AuthSessionStorage, UserSessionStorage};
pub use signing_key::SigningKeyStorage;
pub use token::TokenStorage;
pub use user::UserStorage;

/// Handles to every storage collection the engine uses.
#[derive(Clone)]
pub struct IdpStores {
    /// Client registrations.
    pub clients: Arc<dyn ClientStorage>,
    /// Authorization codes.
    pub codes: Arc<dyn AuthorizationCodeStorage>,
    /// Issued token pairs.
    pub tokens: Arc<dyn TokenStorage>,
    /// In-flight authorization requests.
    pub auth_sessions: Arc<dyn AuthSessionStorage>,
    /// Authenticated browser sessions.
    pub user_sessions: Arc<dyn UserSessionStorage>,
    /// Consent grants.
    pub consents: Arc<dyn ConsentStorage>,
    /// Signing keys.
    pub signing_keys: Arc<dyn SigningKeyStorage>,
    /// Registration initial access tokens.
    pub initial_access_tokens: Arc<dyn InitialAccessTokenStorage>,
    /// End users.
    pub users: Arc<dyn UserStorage>,
}

impl IdpStores {
    /// Builds the handles from a backend that implements every collection.
    #[must_use]
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ClientStorage
            + AuthorizationCodeStorage
            + TokenStorage
            + AuthSessionStorage
            + UserSessionStorage
            + ConsentStorage
            + SigningKeyStorage
            + InitialAccessTokenStorage
            + UserStorage
            + 'static,
    {
        Self {
            clients: backend.clone(),
            codes: backend.clone(),
            tokens: backend.clone(),
            auth_sessions: backend.clone(),
            user_sessions: backend.clone(),
            consents: backend.clone(),
            signing_keys: backend.clone(),
            initial_access_tokens: backend.clone(),
            users: backend,
        }
    }

    /// Fresh in-memory storage.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(InMemoryStorage::new()))
    }

    /// Removes expired records from every collection that expires.
    ///
    /// Returns the total number of records removed.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered.
    pub async fn cleanup_expired(&self) -> crate::AuthResult<u64> {
        let mut removed = 0;
        removed += self.codes.cleanup_expired().await?;
        removed += self.tokens.cleanup_expired().await?;
        removed += self.auth_sessions.cleanup_expired().await?;
        removed += self.user_sessions.cleanup_expired().await?;
        removed += self.signing_keys.cleanup_expired().await?;
        Ok(removed)
    }
}
