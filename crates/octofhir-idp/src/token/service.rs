//! Token issuance engine.
//!
//! Handles the two token-endpoint grants plus the token minting used by the
//! implicit flow, revocation, introspection, and userinfo lookups.
//!
//! Access tokens are RS256 JWTs; refresh tokens are opaque random strings.
//! Both halves are persisted only as SHA-256 digests inside one
//! [`TokenRecord`], so deleting the record revokes the pair.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::config::{OAuthConfig, to_time_duration};
use crate::crypto::{PkceMethod, generate_token, hash_secret, token_hash, verify_pkce};
use crate::error::AuthError;
use crate::oauth::token::TokenResponse;
use crate::storage::{AuthorizationCodeStorage, IdpStores, TokenStorage, UserStorage};
use crate::types::{Client, GrantType, TokenRecord, User, UserInfo};

use super::jwt::{AccessTokenClaims, IdTokenClaims};
use super::keys::KeyManager;
use super::lifecycle::{IntrospectionResponse, TokenTypeHint};

/// Who and what a set of tokens is issued for.
#[derive(Debug, Clone, Copy)]
pub struct IssueContext<'a> {
    pub client_id: &'a str,
    pub user: &'a User,
    pub scope: &'a str,
    pub nonce: Option<&'a str>,
    pub auth_time: Option<i64>,
    pub acr: Option<&'a str>,
    pub amr: &'a [String],
}

impl IssueContext<'_> {
    fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

/// Tokens returned in the fragment of an implicit-flow redirect.
#[derive(Debug, Clone)]
pub struct ImplicitTokens {
    pub id_token: String,
    pub access_token: Option<String>,
    pub expires_in: u64,
}

/// Token service for the authorization_code and refresh_token grants.
pub struct TokenService {
    keys: Arc<KeyManager>,
    codes: Arc<dyn AuthorizationCodeStorage>,
    tokens: Arc<dyn TokenStorage>,
    users: Arc<dyn UserStorage>,
    config: OAuthConfig,
}

impl TokenService {
    /// Creates a token service.
    #[must_use]
    pub fn new(stores: &IdpStores, keys: Arc<KeyManager>, config: OAuthConfig) -> Self {
        Self {
            keys,
            codes: stores.codes.clone(),
            tokens: stores.tokens.clone(),
            users: stores.users.clone(),
            config,
        }
    }

    /// The key manager tokens are signed with.
    #[must_use]
    pub fn keys(&self) -> &Arc<KeyManager> {
        &self.keys
    }

    fn access_token_lifetime_secs(&self) -> u64 {
        self.config.access_token_lifetime.as_secs()
    }

    // =========================================================================
    // Grants
    // =========================================================================

    /// Exchanges an authorization code for tokens.
    ///
    /// The code is consumed before any other check, so a code presented with
    /// the wrong client, redirect URI, or verifier cannot be retried.
    ///
    /// # Errors
    ///
    /// - `InvalidGrant` if the code is unknown, expired, already used, bound to
    ///   another client or redirect URI, or the PKCE verifier does not match
    /// - `InvalidRequest` if a PKCE-bound code is presented without a verifier
    pub async fn exchange_code(
        &self,
        client: &Client,
        code: &str,
        redirect_uri: Option<&str>,
        code_verifier: Option<&str>,
    ) -> AuthResult<TokenResponse> {
        let Some(code) = self.codes.consume(code).await? else {
            tracing::warn!(
                client_id = %client.client_id,
                "Authorization code is invalid, expired, or already used"
            );
            return Err(AuthError::invalid_grant(
                "Authorization code is invalid or expired",
            ));
        };

        if code.client_id != client.client_id {
            tracing::warn!(
                client_id = %client.client_id,
                code_client_id = %code.client_id,
                "Authorization code presented by a different client"
            );
            return Err(AuthError::invalid_grant(
                "Authorization code was issued to a different client",
            ));
        }

        if redirect_uri != Some(code.redirect_uri.as_str()) {
            return Err(AuthError::invalid_grant(
                "redirect_uri does not match the authorization request",
            ));
        }

        match (&code.code_challenge, code_verifier) {
            (Some(challenge), Some(verifier)) => {
                let method = code.code_challenge_method.unwrap_or(PkceMethod::Plain);
                verify_pkce(challenge, method, verifier)?;
            }
            (Some(_), None) => {
                return Err(AuthError::invalid_request("code_verifier is required"));
            }
            (None, Some(_)) => {
                return Err(AuthError::invalid_grant(
                    "code_verifier sent for a code issued without a challenge",
                ));
            }
            (None, None) => {}
        }

        let user = self.load_user(&code.user_id).await?;
        let ctx = IssueContext {
            client_id: &client.client_id,
            user: &user,
            scope: &code.scope,
            nonce: code.nonce.as_deref(),
            auth_time: Some(code.auth_time),
            acr: code.acr.as_deref(),
            amr: &code.amr,
        };

        let with_refresh = client.is_grant_type_allowed(GrantType::RefreshToken);
        let response = self.mint(&ctx, with_refresh, Some(code.id)).await?;

        tracing::info!(
            client_id = %client.client_id,
            user_id = %user.id,
            scope = %code.scope,
            "Authorization code exchanged"
        );
        Ok(response)
    }

    /// Rotates a refresh token.
    ///
    /// The old token pair is deleted; only the returned refresh token is usable
    /// afterwards. A `scope` narrower than the original grant may be requested.
    ///
    /// # Errors
    ///
    /// - `InvalidGrant` if the refresh token is unknown, expired, already rotated,
    ///   or belongs to another client, or the client may not use the grant
    /// - `InvalidScope` if the requested scope exceeds the original grant
    pub async fn refresh(
        &self,
        client: &Client,
        refresh_token: &str,
        scope: Option<&str>,
    ) -> AuthResult<TokenResponse> {
        if !client.is_grant_type_allowed(GrantType::RefreshToken) {
            return Err(AuthError::invalid_grant(
                "Client is not allowed to use the refresh_token grant",
            ));
        }

        let digest = hash_secret(refresh_token);
        let Some(existing) = self.tokens.find_by_refresh_token(&digest).await? else {
            return Err(AuthError::invalid_grant("Refresh token is invalid or expired"));
        };

        if existing.client_id != client.client_id {
            tracing::warn!(
                client_id = %client.client_id,
                token_client_id = %existing.client_id,
                "Refresh token presented by a different client"
            );
            return Err(AuthError::invalid_grant(
                "Refresh token was issued to a different client",
            ));
        }

        let granted = match scope {
            Some(requested) => {
                let original: Vec<&str> = existing.scope.split_whitespace().collect();
                if !requested.split_whitespace().all(|s| original.contains(&s)) {
                    return Err(AuthError::invalid_scope(
                        "Requested scope exceeds the original grant",
                    ));
                }
                requested.to_string()
            }
            None => existing.scope.clone(),
        };

        let Some(consumed) = self.tokens.consume_refresh_token(&digest).await? else {
            tracing::warn!(client_id = %client.client_id, "Refresh token already rotated");
            return Err(AuthError::invalid_grant("Refresh token is invalid or expired"));
        };

        let user = self.load_user(&consumed.user_id).await?;
        let ctx = IssueContext {
            client_id: &client.client_id,
            user: &user,
            scope: &granted,
            nonce: None,
            auth_time: consumed.auth_time,
            acr: None,
            amr: &[],
        };

        let response = self.mint(&ctx, true, consumed.authorization_code_id).await?;

        tracing::info!(
            client_id = %client.client_id,
            user_id = %user.id,
            "Refresh token rotated"
        );
        Ok(response)
    }

    /// Mints the front-channel tokens of the implicit flow.
    ///
    /// With `with_access_token` the access token is stored (without a refresh
    /// token) and bound to the ID token through `at_hash`.
    ///
    /// # Errors
    ///
    /// Returns an error if signing or storage fails.
    pub async fn issue_implicit(
        &self,
        ctx: &IssueContext<'_>,
        with_access_token: bool,
    ) -> AuthResult<ImplicitTokens> {
        let access_token = if with_access_token {
            let (token, _) = self.mint_access_token(ctx, false, None).await?;
            Some(token)
        } else {
            None
        };

        let id_token = self.mint_id_token(ctx, access_token.as_deref(), None).await?;

        Ok(ImplicitTokens {
            id_token,
            access_token,
            expires_in: self.access_token_lifetime_secs(),
        })
    }

    // =========================================================================
    // Token Lifecycle
    // =========================================================================

    /// Revokes the token pair a presented access or refresh token belongs to.
    ///
    /// Unknown tokens and tokens of other clients are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    pub async fn revoke(
        &self,
        client: &Client,
        token: &str,
        hint: Option<TokenTypeHint>,
    ) -> AuthResult<()> {
        let Some((record, _)) = self.find_record(token, hint).await? else {
            tracing::debug!(client_id = %client.client_id, "Revocation of unknown token ignored");
            return Ok(());
        };

        if record.client_id != client.client_id {
            tracing::warn!(
                client_id = %client.client_id,
                token_client_id = %record.client_id,
                "Client attempted to revoke another client's token"
            );
            return Ok(());
        }

        self.tokens.delete(record.id).await?;
        tracing::info!(client_id = %client.client_id, user_id = %record.user_id, "Token revoked");
        Ok(())
    }

    /// Reports whether a token is active and, if so, its metadata.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails.
    pub async fn introspect(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
    ) -> AuthResult<IntrospectionResponse> {
        let Some((record, kind)) = self.find_record(token, hint).await? else {
            return Ok(IntrospectionResponse::inactive());
        };

        let (token_type, exp) = match kind {
            TokenTypeHint::AccessToken => ("Bearer", record.access_expires_at),
            TokenTypeHint::RefreshToken => (
                "refresh_token",
                record.refresh_expires_at.unwrap_or(record.access_expires_at),
            ),
        };

        Ok(IntrospectionResponse {
            active: true,
            scope: Some(record.scope),
            client_id: Some(record.client_id),
            token_type: Some(token_type.to_string()),
            exp: Some(exp.unix_timestamp()),
            iat: Some(record.issued_at.unix_timestamp()),
            sub: Some(record.user_id),
            iss: Some(self.keys.issuer().to_string()),
        })
    }

    /// Resolves a Bearer access token to the claims its scope releases.
    ///
    /// The JWT must verify and its record must still exist, so revoked tokens
    /// are rejected even before they expire.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the token is invalid, revoked, lacks the
    /// `openid` scope, or its user no longer exists.
    pub async fn userinfo(&self, access_token: &str) -> AuthResult<UserInfo> {
        let claims: AccessTokenClaims = self.keys.verify(access_token).await?;

        let record = self
            .tokens
            .find_by_access_token(&hash_secret(access_token))
            .await?
            .ok_or_else(|| AuthError::invalid_token("Access token has been revoked"))?;

        if !record.scope.split_whitespace().any(|s| s == "openid") {
            return Err(AuthError::invalid_token(
                "Access token was not granted the openid scope",
            ));
        }

        let user = self
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| AuthError::invalid_token("Token subject no longer exists"))?;

        Ok(user.claims_for_scope(&record.scope))
    }

    // =========================================================================
    // Minting
    // =========================================================================

    async fn mint(
        &self,
        ctx: &IssueContext<'_>,
        with_refresh: bool,
        authorization_code_id: Option<Uuid>,
    ) -> AuthResult<TokenResponse> {
        let (access_token, refresh_token) = self
            .mint_access_token(ctx, with_refresh, authorization_code_id)
            .await?;

        let id_token = if ctx.has_scope("openid") {
            Some(self.mint_id_token(ctx, Some(&access_token), None).await?)
        } else {
            None
        };

        Ok(TokenResponse::new(
            access_token,
            self.access_token_lifetime_secs(),
            ctx.scope.to_string(),
        )
        .with_refresh_token(refresh_token)
        .with_id_token(id_token))
    }

    /// Signs an access token and stores its record. Returns the access token
    /// and, when requested, the paired refresh token.
    async fn mint_access_token(
        &self,
        ctx: &IssueContext<'_>,
        with_refresh: bool,
        authorization_code_id: Option<Uuid>,
    ) -> AuthResult<(String, Option<String>)> {
        let now = OffsetDateTime::now_utc();
        let access_expires_at = now + to_time_duration(self.config.access_token_lifetime);

        let claims = AccessTokenClaims {
            iss: self.keys.issuer().to_string(),
            sub: ctx.user.id.clone(),
            aud: ctx.client_id.to_string(),
            exp: access_expires_at.unix_timestamp(),
            iat: now.unix_timestamp(),
            jti: Uuid::new_v4().to_string(),
            scope: ctx.scope.to_string(),
            client_id: ctx.client_id.to_string(),
        };
        let access_token = self.keys.sign(&claims).await?;

        let refresh_token = with_refresh.then(generate_token);

        let record = TokenRecord {
            id: Uuid::new_v4(),
            access_token_hash: hash_secret(&access_token),
            refresh_token_hash: refresh_token.as_deref().map(hash_secret),
            client_id: ctx.client_id.to_string(),
            user_id: ctx.user.id.clone(),
            scope: ctx.scope.to_string(),
            authorization_code_id,
            auth_time: ctx.auth_time,
            issued_at: now,
            access_expires_at,
            refresh_expires_at: refresh_token
                .as_ref()
                .map(|_| now + to_time_duration(self.config.refresh_token_lifetime)),
        };
        self.tokens.create(&record).await?;

        Ok((access_token, refresh_token))
    }

    async fn mint_id_token(
        &self,
        ctx: &IssueContext<'_>,
        access_token: Option<&str>,
        code: Option<&str>,
    ) -> AuthResult<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + to_time_duration(self.config.id_token_lifetime);
        let released = ctx.user.claims_for_scope(ctx.scope);

        let claims = IdTokenClaims {
            iss: self.keys.issuer().to_string(),
            sub: ctx.user.id.clone(),
            aud: ctx.client_id.to_string(),
            exp: exp.unix_timestamp(),
            iat: now.unix_timestamp(),
            auth_time: ctx.auth_time,
            nonce: ctx.nonce.map(str::to_string),
            acr: ctx.acr.map(str::to_string),
            amr: ctx.amr.to_vec(),
            at_hash: access_token.map(token_hash),
            c_hash: code.map(token_hash),
            name: released.name,
            given_name: released.given_name,
            family_name: released.family_name,
            picture: released.picture,
            email: released.email,
            email_verified: released.email_verified,
        };

        self.keys.sign(&claims).await
    }

    async fn load_user(&self, user_id: &str) -> AuthResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("The authorizing user no longer exists"))
    }

    /// Finds the record a raw token belongs to, trying the hinted half first.
    async fn find_record(
        &self,
        token: &str,
        hint: Option<TokenTypeHint>,
    ) -> AuthResult<Option<(TokenRecord, TokenTypeHint)>> {
        let digest = hash_secret(token);
        let order = match hint {
            Some(TokenTypeHint::RefreshToken) => {
                [TokenTypeHint::RefreshToken, TokenTypeHint::AccessToken]
            }
            _ => [TokenTypeHint::AccessToken, TokenTypeHint::RefreshToken],
        };

        for kind in order {
            let found = match kind {
                TokenTypeHint::AccessToken => self.tokens.find_by_access_token(&digest).await?,
                TokenTypeHint::RefreshToken => self.tokens.find_by_refresh_token(&digest).await?,
            };
            if let Some(record) = found {
                return Ok(Some((record, kind)));
            }
        }

        Ok(None)
    }
}
