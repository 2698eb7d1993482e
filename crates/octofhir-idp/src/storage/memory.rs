//! In-memory storage backend.
//!
//! Each collection sits behind its own `tokio::sync::RwLock`, so requests
//! touching different collections never contend. Single-use operations take
//! the write lock for the whole check-and-remove.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AuthError;
use crate::types::{
    AuthSession, AuthorizationCode, Client, Consent, InitialAccessToken, SigningKey, TokenRecord,
    User, UserSession,
};
use crate::AuthResult;

use super::{
    AuthSessionStorage, AuthorizationCodeStorage, ClientStorage, ConsentStorage,
    InitialAccessTokenStorage, SigningKeyStorage, TokenStorage, UserSessionStorage, UserStorage,
};

/// Token records plus digest indexes.
#[derive(Default)]
struct TokenTable {
    records: HashMap<Uuid, TokenRecord>,
    by_access: HashMap<String, Uuid>,
    by_refresh: HashMap<String, Uuid>,
}

impl TokenTable {
    fn remove(&mut self, id: Uuid) -> Option<TokenRecord> {
        let record = self.records.remove(&id)?;
        self.by_access.remove(&record.access_token_hash);
        if let Some(refresh) = &record.refresh_token_hash {
            self.by_refresh.remove(refresh);
        }
        Some(record)
    }
}

/// In-memory implementation of every storage trait.
#[derive(Default)]
pub struct InMemoryStorage {
    clients: RwLock<HashMap<String, Client>>,
    codes: RwLock<HashMap<String, AuthorizationCode>>,
    tokens: RwLock<TokenTable>,
    auth_sessions: RwLock<HashMap<Uuid, AuthSession>>,
    user_sessions: RwLock<HashMap<Uuid, UserSession>>,
    consents: RwLock<HashMap<(String, String), Consent>>,
    signing_keys: RwLock<HashMap<String, SigningKey>>,
    initial_access_tokens: RwLock<HashMap<String, InitialAccessToken>>,
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

// =============================================================================
// Clients
// =============================================================================

#[async_trait]
impl ClientStorage for InMemoryStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.clients.read().await.get(client_id).cloned())
    }

    async fn create(&self, client: &Client) -> AuthResult<Client> {
        let mut clients = self.clients.write().await;
        if clients.contains_key(&client.client_id) {
            return Err(AuthError::storage(format!(
                "Client '{}' already exists",
                client.client_id
            )));
        }
        clients.insert(client.client_id.clone(), client.clone());
        Ok(client.clone())
    }

    async fn update(&self, client: &Client) -> AuthResult<Client> {
        let mut clients = self.clients.write().await;
        match clients.get_mut(&client.client_id) {
            Some(existing) => {
                *existing = client.clone();
                Ok(client.clone())
            }
            None => Err(AuthError::storage(format!(
                "Client '{}' not found",
                client.client_id
            ))),
        }
    }

    async fn delete(&self, client_id: &str) -> AuthResult<bool> {
        Ok(self.clients.write().await.remove(client_id).is_some())
    }

    async fn list(&self) -> AuthResult<Vec<Client>> {
        Ok(self.clients.read().await.values().cloned().collect())
    }
}

// =============================================================================
// Authorization Codes
// =============================================================================

#[async_trait]
impl AuthorizationCodeStorage for InMemoryStorage {
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()> {
        self.codes
            .write()
            .await
            .insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn find_by_code(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        Ok(self
            .codes
            .read()
            .await
            .get(code)
            .filter(|c| !c.is_expired())
            .cloned())
    }

    async fn consume(&self, code: &str) -> AuthResult<Option<AuthorizationCode>> {
        let removed = self.codes.write().await.remove(code);
        Ok(removed.filter(|c| !c.is_expired()))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, c| !c.is_expired_at(now));
        Ok(count(before - codes.len()))
    }
}

// =============================================================================
// Tokens
// =============================================================================

#[async_trait]
impl TokenStorage for InMemoryStorage {
    async fn create(&self, record: &TokenRecord) -> AuthResult<()> {
        let mut table = self.tokens.write().await;
        table
            .by_access
            .insert(record.access_token_hash.clone(), record.id);
        if let Some(refresh) = &record.refresh_token_hash {
            table.by_refresh.insert(refresh.clone(), record.id);
        }
        table.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_access_token(
        &self,
        access_token_hash: &str,
    ) -> AuthResult<Option<TokenRecord>> {
        let now = OffsetDateTime::now_utc();
        let table = self.tokens.read().await;
        Ok(table
            .by_access
            .get(access_token_hash)
            .and_then(|id| table.records.get(id))
            .filter(|r| !r.is_access_expired_at(now))
            .cloned())
    }

    async fn find_by_refresh_token(
        &self,
        refresh_token_hash: &str,
    ) -> AuthResult<Option<TokenRecord>> {
        let now = OffsetDateTime::now_utc();
        let table = self.tokens.read().await;
        Ok(table
            .by_refresh
            .get(refresh_token_hash)
            .and_then(|id| table.records.get(id))
            .filter(|r| !r.is_refresh_expired_at(now))
            .cloned())
    }

    async fn consume_refresh_token(
        &self,
        refresh_token_hash: &str,
    ) -> AuthResult<Option<TokenRecord>> {
        let now = OffsetDateTime::now_utc();
        let mut table = self.tokens.write().await;
        let Some(id) = table.by_refresh.get(refresh_token_hash).copied() else {
            return Ok(None);
        };
        Ok(table
            .remove(id)
            .filter(|r| !r.is_refresh_expired_at(now)))
    }

    async fn delete(&self, id: Uuid) -> AuthResult<bool> {
        Ok(self.tokens.write().await.remove(id).is_some())
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut table = self.tokens.write().await;
        let expired: Vec<Uuid> = table
            .records
            .values()
            .filter(|r| r.is_expired_at(now))
            .map(|r| r.id)
            .collect();
        for id in &expired {
            table.remove(*id);
        }
        Ok(count(expired.len()))
    }
}

// =============================================================================
// Sessions
// =============================================================================

#[async_trait]
impl AuthSessionStorage for InMemoryStorage {
    async fn create(&self, session: &AuthSession) -> AuthResult<()> {
        self.auth_sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<AuthSession>> {
        Ok(self
            .auth_sessions
            .read()
            .await
            .get(&id)
            .filter(|s| !s.is_expired())
            .cloned())
    }

    async fn update(&self, session: &AuthSession) -> AuthResult<()> {
        let mut sessions = self.auth_sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => Err(AuthError::storage("Authorization session not found")),
        }
    }

    async fn delete(&self, id: Uuid) -> AuthResult<bool> {
        Ok(self.auth_sessions.write().await.remove(&id).is_some())
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut sessions = self.auth_sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        Ok(count(before - sessions.len()))
    }
}

#[async_trait]
impl UserSessionStorage for InMemoryStorage {
    async fn create(&self, session: &UserSession) -> AuthResult<()> {
        self.user_sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<UserSession>> {
        Ok(self
            .user_sessions
            .read()
            .await
            .get(&id)
            .filter(|s| !s.is_expired())
            .cloned())
    }

    async fn find_latest_for_user(&self, user_id: &str) -> AuthResult<Option<UserSession>> {
        Ok(self
            .user_sessions
            .read()
            .await
            .values()
            .filter(|s| s.user_id == user_id && !s.is_expired())
            .max_by_key(|s| s.auth_time)
            .cloned())
    }

    async fn update(&self, session: &UserSession) -> AuthResult<()> {
        let mut sessions = self.user_sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(existing) => {
                *existing = session.clone();
                Ok(())
            }
            None => Err(AuthError::storage("User session not found")),
        }
    }

    async fn delete(&self, id: Uuid) -> AuthResult<bool> {
        Ok(self.user_sessions.write().await.remove(&id).is_some())
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let mut sessions = self.user_sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        Ok(count(before - sessions.len()))
    }
}

// =============================================================================
// Consents
// =============================================================================

#[async_trait]
impl ConsentStorage for InMemoryStorage {
    async fn find(&self, user_id: &str, client_id: &str) -> AuthResult<Option<Consent>> {
        Ok(self
            .consents
            .read()
            .await
            .get(&(user_id.to_string(), client_id.to_string()))
            .cloned())
    }

    async fn save(&self, consent: &Consent) -> AuthResult<()> {
        self.consents.write().await.insert(
            (consent.user_id.clone(), consent.client_id.clone()),
            consent.clone(),
        );
        Ok(())
    }

    async fn revoke(&self, user_id: &str, client_id: &str) -> AuthResult<bool> {
        Ok(self
            .consents
            .write()
            .await
            .remove(&(user_id.to_string(), client_id.to_string()))
            .is_some())
    }

    async fn list_for_user(&self, user_id: &str) -> AuthResult<Vec<Consent>> {
        Ok(self
            .consents
            .read()
            .await
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Signing Keys
// =============================================================================

#[async_trait]
impl SigningKeyStorage for InMemoryStorage {
    async fn find_active(&self) -> AuthResult<Option<SigningKey>> {
        Ok(self
            .signing_keys
            .read()
            .await
            .values()
            .find(|k| k.active)
            .cloned())
    }

    async fn find_by_kid(&self, kid: &str) -> AuthResult<Option<SigningKey>> {
        Ok(self
            .signing_keys
            .read()
            .await
            .get(kid)
            .filter(|k| !k.is_expired())
            .cloned())
    }

    async fn list_valid(&self) -> AuthResult<Vec<SigningKey>> {
        let mut keys: Vec<SigningKey> = self
            .signing_keys
            .read()
            .await
            .values()
            .filter(|k| !k.is_expired())
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.active.cmp(&a.active).then(b.created_at.cmp(&a.created_at)));
        Ok(keys)
    }

    async fn rotate(
        &self,
        new_key: &SigningKey,
        retire_at: OffsetDateTime,
    ) -> AuthResult<Option<SigningKey>> {
        if !new_key.active {
            return Err(AuthError::storage("Rotated-in signing key must be active"));
        }

        let mut keys = self.signing_keys.write().await;
        if keys.contains_key(&new_key.kid) {
            return Err(AuthError::storage(format!(
                "Signing key '{}' already exists",
                new_key.kid
            )));
        }

        let mut retired = None;
        for key in keys.values_mut().filter(|k| k.active) {
            key.active = false;
            key.expires_at = Some(retire_at);
            retired = Some(key.clone());
        }
        keys.insert(new_key.kid.clone(), new_key.clone());
        Ok(retired)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut keys = self.signing_keys.write().await;
        let before = keys.len();
        keys.retain(|_, k| !k.is_expired_at(now));
        Ok(count(before - keys.len()))
    }
}

// =============================================================================
// Initial Access Tokens
// =============================================================================

#[async_trait]
impl InitialAccessTokenStorage for InMemoryStorage {
    async fn create(&self, token: &InitialAccessToken) -> AuthResult<()> {
        self.initial_access_tokens
            .write()
            .await
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<InitialAccessToken>> {
        Ok(self
            .initial_access_tokens
            .read()
            .await
            .get(token_hash)
            .filter(|t| !t.is_expired())
            .cloned())
    }

    async fn mark_used(&self, token_hash: &str, client_id: &str) -> AuthResult<bool> {
        let mut tokens = self.initial_access_tokens.write().await;
        match tokens.get_mut(token_hash) {
            Some(token) if !token.used && !token.is_expired() => {
                token.used = true;
                token.used_by = Some(client_id.to_string());
                token.used_at = Some(OffsetDateTime::now_utc());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// =============================================================================
// Users
// =============================================================================

#[async_trait]
impl UserStorage for InMemoryStorage {
    async fn find_by_id(&self, id: &str) -> AuthResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, user: &User) -> AuthResult<User> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) || users.values().any(|u| u.username == user.username) {
            return Err(AuthError::storage(format!(
                "User '{}' already exists",
                user.username
            )));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::Duration;

    use super::*;

    fn code(value: &str, expires_in: Duration) -> AuthorizationCode {
        let now = OffsetDateTime::now_utc();
        AuthorizationCode {
            id: Uuid::new_v4(),
            code: value.to_string(),
            client_id: "app".to_string(),
            user_id: "alice".to_string(),
            redirect_uri: "https://app.example.com/cb".to_string(),
            scope: "openid".to_string(),
            nonce: None,
            code_challenge: None,
            code_challenge_method: None,
            auth_time: now.unix_timestamp(),
            acr: None,
            amr: Vec::new(),
            created_at: now,
            expires_at: now + expires_in,
        }
    }

    #[tokio::test]
    async fn test_consume_is_single_use_under_concurrency() {
        let storage = Arc::new(InMemoryStorage::new());
        AuthorizationCodeStorage::create(storage.as_ref(), &code("abc", Duration::minutes(10)))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let storage = storage.clone();
            handles.push(tokio::spawn(async move {
                storage.consume("abc").await.unwrap().is_some()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_expired_code_reads_as_absent() {
        let storage = InMemoryStorage::new();
        AuthorizationCodeStorage::create(&storage, &code("old", Duration::seconds(-1)))
            .await
            .unwrap();

        assert!(storage.find_by_code("old").await.unwrap().is_none());
        assert!(storage.consume("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_initial_access_token_single_use() {
        let storage = InMemoryStorage::new();
        let token = InitialAccessToken::new("iat-1", None);
        InitialAccessTokenStorage::create(&storage, &token)
            .await
            .unwrap();

        assert!(storage.mark_used(&token.token_hash, "c1").await.unwrap());
        assert!(!storage.mark_used(&token.token_hash, "c2").await.unwrap());

        let stored = storage.find_by_hash(&token.token_hash).await.unwrap().unwrap();
        assert_eq!(stored.used_by.as_deref(), Some("c1"));
        assert!(stored.used_at.is_some());
    }
}
