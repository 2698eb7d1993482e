//! Signing key lifecycle: bootstrap, rotation, signing, verification, JWKS.
//!
//! The active key is a stored entity, not process state. Rotation is a single
//! storage call that retires the active key (`expires_at = now + grace`) and
//! installs the new one, so several processes sharing a backend agree on
//! which key signs.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::config::{SigningConfig, to_time_duration};
use crate::error::AuthError;
use crate::storage::SigningKeyStorage;
use crate::types::SigningKey;

use super::jwt::{JwtError, Jwks, SigningKeyPair, generate_signing_key, token_kid};

/// Owns signing keys and the cache of their parsed form.
pub struct KeyManager {
    storage: Arc<dyn SigningKeyStorage>,
    issuer: String,
    config: SigningConfig,
    parsed: DashMap<String, Arc<SigningKeyPair>>,
}

impl KeyManager {
    /// Creates a key manager.
    #[must_use]
    pub fn new(
        storage: Arc<dyn SigningKeyStorage>,
        issuer: impl Into<String>,
        config: SigningConfig,
    ) -> Self {
        Self {
            storage,
            issuer: issuer.into(),
            config,
            parsed: DashMap::new(),
        }
    }

    /// Returns the issuer tokens are signed for.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Makes sure an active key exists, generating one if needed.
    ///
    /// Returns the active key id.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or key generation fails.
    pub async fn ensure_active_key(&self) -> AuthResult<String> {
        match self.storage.find_active().await? {
            Some(key) => Ok(key.kid),
            None => {
                tracing::info!("No active signing key found, generating one");
                self.rotate().await
            }
        }
    }

    /// Generates a new key, makes it active, and retires the previous one.
    ///
    /// The previous key keeps verifying tokens until the configured grace
    /// period has elapsed. Returns the new key id.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation or storage fails.
    pub async fn rotate(&self) -> AuthResult<String> {
        let bits = self.config.key_size_bits;
        let key = tokio::task::spawn_blocking(move || generate_signing_key(bits))
            .await
            .map_err(|e| AuthError::internal(format!("Key generation task failed: {e}")))??;

        let retire_at =
            OffsetDateTime::now_utc() + to_time_duration(self.config.rotation_grace_period);
        let retired = self.storage.rotate(&key, retire_at).await?;

        tracing::info!(
            kid = %key.kid,
            retired_kid = ?retired.as_ref().map(|k| k.kid.as_str()),
            retire_at = %retire_at,
            "Signing key rotated"
        );

        self.prune_cache().await?;
        Ok(key.kid)
    }

    /// Signs claims with the active key.
    ///
    /// # Errors
    ///
    /// Returns an error if no key can be obtained or encoding fails.
    pub async fn sign<T: Serialize + Sync>(&self, claims: &T) -> AuthResult<String> {
        let key = match self.storage.find_active().await? {
            Some(key) => key,
            None => {
                let kid = self.ensure_active_key().await?;
                self.storage
                    .find_by_kid(&kid)
                    .await?
                    .ok_or_else(|| AuthError::internal("Active signing key disappeared"))?
            }
        };

        let pair = self.parsed_key(&key)?;
        Ok(pair.encode(claims)?)
    }

    /// Verifies a token signed by any unexpired key, selected by its `kid`.
    ///
    /// Unknown and expired key ids fail closed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` for any verification failure.
    pub async fn verify<T: DeserializeOwned>(&self, token: &str) -> AuthResult<T> {
        let kid = token_kid(token)?;
        let key = self
            .storage
            .find_by_kid(&kid)
            .await?
            .ok_or_else(|| JwtError::key_not_found(&kid))?;

        let pair = self.parsed_key(&key)?;
        Ok(pair.decode(token, &self.issuer)?)
    }

    /// Public key set of every unexpired key, active first.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails or a stored key cannot be parsed.
    pub async fn jwks(&self) -> AuthResult<Jwks> {
        let keys = self.storage.list_valid().await?;
        let mut jwks = Jwks::default();
        for key in &keys {
            jwks.keys.push(self.parsed_key(key)?.to_jwk());
        }
        Ok(jwks)
    }

    fn parsed_key(&self, key: &SigningKey) -> Result<Arc<SigningKeyPair>, JwtError> {
        if let Some(pair) = self.parsed.get(&key.kid) {
            return Ok(pair.clone());
        }

        let pair = Arc::new(SigningKeyPair::from_signing_key(key)?);
        self.parsed.insert(key.kid.clone(), pair.clone());
        Ok(pair)
    }

    async fn prune_cache(&self) -> AuthResult<()> {
        let valid: Vec<String> = self
            .storage
            .list_valid()
            .await?
            .into_iter()
            .map(|k| k.kid)
            .collect();
        self.parsed.retain(|kid, _| valid.contains(kid));
        Ok(())
    }
}
