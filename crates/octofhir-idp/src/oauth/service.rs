//! Authorization flow controller.
//!
//! Validates authorization requests, drives them through login and consent,
//! and issues the code or implicit tokens once the end user is authenticated
//! and has approved the requested scopes.
//!
//! # Error delivery
//!
//! Until the client and its redirect URI are confirmed, errors are returned to
//! the caller as `Err` and rendered as a direct response. After that every
//! failure becomes an error redirect, so this module never redirects to an
//! unregistered URI.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::config::{OAuthConfig, to_time_duration};
use crate::crypto::PkceMethod;
use crate::crypto::pkce::validate_verifier;
use crate::error::AuthError;
use crate::session::SessionService;
use crate::storage::{AuthorizationCodeStorage, ClientStorage, IdpStores};
use crate::token::{IssueContext, TokenService};
use crate::types::{
    AuthSession, AuthorizationCode, Client, ConsentDecision, Prompt, ResponseType, UserSession,
};

use super::authorize::{AuthorizationRequest, ResponseMode, build_error_redirect, build_redirect};

/// What the authorization endpoint should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeOutcome {
    /// Send the browser to the client with this URL (success or error).
    Redirect(String),
    /// Show the login page for this authorization session.
    Login { session_id: Uuid },
    /// Show the consent page for this authorization session.
    Consent { session_id: Uuid },
}

/// Authorization flow controller.
pub struct AuthorizationService {
    pub(super) clients: Arc<dyn ClientStorage>,
    codes: Arc<dyn AuthorizationCodeStorage>,
    pub(super) sessions: Arc<SessionService>,
    tokens: Arc<TokenService>,
    config: OAuthConfig,
}

impl AuthorizationService {
    /// Creates the controller.
    #[must_use]
    pub fn new(
        stores: &IdpStores,
        sessions: Arc<SessionService>,
        tokens: Arc<TokenService>,
        config: OAuthConfig,
    ) -> Self {
        Self {
            clients: stores.clients.clone(),
            codes: stores.codes.clone(),
            sessions,
            tokens,
            config,
        }
    }

    /// Processes an authorization request.
    ///
    /// `browser_session` is the user session id from the session cookie, if any.
    ///
    /// # Errors
    ///
    /// Errors are returned directly only when the redirect URI cannot be trusted:
    /// - `InvalidRequest` if `client_id` or `redirect_uri` is missing, or the
    ///   redirect URI is not registered for the client
    /// - `InvalidClient` if the client is unknown
    ///
    /// Storage failures are also returned directly. Every other problem is
    /// encoded into an [`AuthorizeOutcome::Redirect`].
    pub async fn authorize(
        &self,
        request: &AuthorizationRequest,
        browser_session: Option<Uuid>,
    ) -> AuthResult<AuthorizeOutcome> {
        let client_id = request
            .client_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AuthError::invalid_request("Missing required parameter: client_id"))?;

        let client = self
            .clients
            .find_by_client_id(client_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(client_id = %client_id, "Authorization request for unknown client");
                AuthError::invalid_client("Unknown client")
            })?;

        let redirect_uri = request
            .redirect_uri
            .as_deref()
            .ok_or_else(|| AuthError::invalid_request("Missing required parameter: redirect_uri"))?;

        if !client.is_redirect_uri_allowed(redirect_uri) {
            tracing::warn!(
                client_id = %client_id,
                "Authorization request with unregistered redirect_uri"
            );
            return Err(AuthError::invalid_request(
                "redirect_uri is not registered for this client",
            ));
        }

        // The redirect URI is trusted from here on.
        let session = match self.validate(&client, request, redirect_uri) {
            Ok(session) => session,
            Err(err) => {
                tracing::debug!(
                    client_id = %client_id,
                    error = err.oauth_error_code(),
                    "Authorization request rejected"
                );
                let mode = request
                    .response_type
                    .as_deref()
                    .map_or(ResponseMode::Query, ResponseMode::for_raw_response_type);
                let url =
                    build_error_redirect(redirect_uri, &err, request.state.as_deref(), mode)?;
                return Ok(AuthorizeOutcome::Redirect(url));
            }
        };

        self.sessions.create_auth_session(&session).await?;
        self.advance(session, browser_session).await
    }

    /// Checks the request against the client registration and builds the
    /// authorization session that carries it through login and consent.
    fn validate(
        &self,
        client: &Client,
        request: &AuthorizationRequest,
        redirect_uri: &str,
    ) -> AuthResult<AuthSession> {
        // 1. response_type
        let raw_response_type = request
            .response_type
            .as_deref()
            .ok_or_else(|| {
                AuthError::invalid_request("Missing required parameter: response_type")
            })?;
        let response_type: ResponseType = raw_response_type
            .parse()
            .map_err(AuthError::unsupported_response_type)?;
        if !client.is_response_type_allowed(response_type) {
            return Err(AuthError::unsupported_response_type(raw_response_type));
        }

        // 2. scope
        let requested_scope = request.scope.as_deref().unwrap_or_default();
        let scopes: Vec<&str> = requested_scope.split_whitespace().collect();
        if !scopes.contains(&"openid") {
            return Err(AuthError::invalid_scope("The openid scope is required"));
        }
        if let Some(unknown) = scopes
            .iter()
            .find(|s| !self.config.scopes_supported.iter().any(|supported| supported == *s))
        {
            return Err(AuthError::invalid_scope(format!(
                "Scope '{unknown}' is not supported"
            )));
        }
        if let Some(denied) = client.first_disallowed_scope(requested_scope) {
            return Err(AuthError::invalid_scope(format!(
                "Scope '{denied}' is not allowed for this client"
            )));
        }

        // 3. nonce (required whenever an ID token leaves the front channel)
        if response_type.uses_fragment() && request.nonce.as_deref().is_none_or(str::is_empty) {
            return Err(AuthError::invalid_request(
                "nonce is required for implicit response types",
            ));
        }

        // 4. PKCE
        let code_challenge_method = match (
            request.code_challenge.as_deref(),
            request.code_challenge_method.as_deref(),
        ) {
            (None, None) => None,
            (None, Some(_)) => {
                return Err(AuthError::invalid_request(
                    "code_challenge_method requires code_challenge",
                ));
            }
            (Some(challenge), method) => {
                let method = method
                    .map(str::parse::<PkceMethod>)
                    .transpose()?
                    .unwrap_or(PkceMethod::Plain);
                // Challenges share the verifier alphabet and length bounds.
                validate_verifier(challenge)
                    .map_err(|_| AuthError::invalid_request("Malformed code_challenge"))?;
                Some(method)
            }
        };

        // 5. prompt and max_age
        let prompt = match request.prompt.as_deref() {
            Some(raw) => Prompt::parse_list(raw).map_err(|value| {
                AuthError::invalid_request(format!("Invalid prompt value: {value}"))
            })?,
            None => Vec::new(),
        };

        let max_age = request
            .max_age
            .as_deref()
            .map(|raw| {
                raw.parse::<i64>()
                    .ok()
                    .filter(|age| *age >= 0)
                    .ok_or_else(|| {
                        AuthError::invalid_request("max_age must be a non-negative integer")
                    })
            })
            .transpose()?;

        let now = OffsetDateTime::now_utc();
        Ok(AuthSession {
            id: Uuid::new_v4(),
            client_id: client.client_id.clone(),
            redirect_uri: redirect_uri.to_string(),
            response_type,
            scope: scopes.join(" "),
            state: request.state.clone(),
            nonce: request.nonce.clone(),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method,
            prompt,
            max_age,
            acr_values: request.acr_values.clone(),
            user_id: None,
            user_session_id: None,
            consent: ConsentDecision::Pending,
            created_at: now,
            expires_at: self.sessions.auth_session_expiry(),
        })
    }

    /// Moves an authorization session as far as it can go without the end user.
    ///
    /// Picks the browser session that may satisfy the request, then either asks
    /// for login, asks for consent, or issues and finishes the flow.
    ///
    /// # Errors
    ///
    /// Returns an error only if storage fails before a redirect can be built.
    pub(super) async fn advance(
        &self,
        mut session: AuthSession,
        browser_session: Option<Uuid>,
    ) -> AuthResult<AuthorizeOutcome> {
        let user_session = match session.user_session_id {
            // Logged in during this flow.
            Some(id) => self.sessions.user_session(Some(id)).await?,
            None if session.has_prompt(Prompt::Login)
                || session.has_prompt(Prompt::SelectAccount) =>
            {
                None
            }
            None => self
                .sessions
                .user_session(browser_session)
                .await?
                .filter(|existing| satisfies_max_age(existing, session.max_age)),
        };

        let Some(mut user_session) = user_session else {
            if session.has_prompt(Prompt::None) {
                return self.finish_with_error(&session, &AuthError::LoginRequired).await;
            }
            tracing::debug!(session_id = %session.id, "Login required");
            return Ok(AuthorizeOutcome::Login {
                session_id: session.id,
            });
        };

        self.sessions.touch(&mut user_session).await?;
        session.user_id = Some(user_session.user_id.clone());
        session.user_session_id = Some(user_session.id);

        let consented = session.consent == ConsentDecision::Granted
            || (!session.has_prompt(Prompt::Consent)
                && self
                    .sessions
                    .consent_covers(&user_session.user_id, &session.client_id, &session.scopes())
                    .await?);

        if !consented {
            if session.has_prompt(Prompt::None) {
                return self
                    .finish_with_error(&session, &AuthError::ConsentRequired)
                    .await;
            }
            self.sessions.update_auth_session(&session).await?;
            tracing::debug!(session_id = %session.id, "Consent required");
            return Ok(AuthorizeOutcome::Consent {
                session_id: session.id,
            });
        }

        match self.issue(&session, &user_session).await {
            Ok(url) => {
                self.sessions.end_auth_session(session.id).await?;
                Ok(AuthorizeOutcome::Redirect(url))
            }
            Err(err) => {
                if err.is_server_error() {
                    tracing::error!(
                        session_id = %session.id,
                        client_id = %session.client_id,
                        error = %err,
                        "Authorization response issuance failed"
                    );
                }
                self.finish_with_error(&session, &err).await
            }
        }
    }

    /// Ends the flow and redirects back to the client with an error.
    pub(super) async fn finish_with_error(
        &self,
        session: &AuthSession,
        err: &AuthError,
    ) -> AuthResult<AuthorizeOutcome> {
        self.sessions.end_auth_session(session.id).await?;
        let url = build_error_redirect(
            &session.redirect_uri,
            err,
            session.state.as_deref(),
            response_mode(session.response_type),
        )?;
        Ok(AuthorizeOutcome::Redirect(url))
    }

    /// Issues the authorization response for a consented session.
    async fn issue(&self, session: &AuthSession, user_session: &UserSession) -> AuthResult<String> {
        let mut params: Vec<(&str, String)> = Vec::new();

        match session.response_type {
            ResponseType::Code => {
                let now = OffsetDateTime::now_utc();
                let code = AuthorizationCode {
                    id: Uuid::new_v4(),
                    code: AuthorizationCode::generate_code(),
                    client_id: session.client_id.clone(),
                    user_id: user_session.user_id.clone(),
                    redirect_uri: session.redirect_uri.clone(),
                    scope: session.scope.clone(),
                    nonce: session.nonce.clone(),
                    code_challenge: session.code_challenge.clone(),
                    code_challenge_method: session.code_challenge_method,
                    auth_time: user_session.auth_time_unix(),
                    acr: user_session.acr.clone(),
                    amr: user_session.amr.clone(),
                    created_at: now,
                    expires_at: now + to_time_duration(self.config.authorization_code_lifetime),
                };
                self.codes.create(&code).await?;

                tracing::info!(
                    client_id = %session.client_id,
                    user_id = %user_session.user_id,
                    pkce = code.code_challenge.is_some(),
                    "Authorization code issued"
                );
                params.push(("code", code.code));
            }
            ResponseType::IdToken | ResponseType::TokenIdToken => {
                let user = self.sessions.user(&user_session.user_id).await?;
                let ctx = IssueContext {
                    client_id: &session.client_id,
                    user: &user,
                    scope: &session.scope,
                    nonce: session.nonce.as_deref(),
                    auth_time: Some(user_session.auth_time_unix()),
                    acr: user_session.acr.as_deref(),
                    amr: &user_session.amr,
                };
                let tokens = self
                    .tokens
                    .issue_implicit(&ctx, session.response_type == ResponseType::TokenIdToken)
                    .await?;

                tracing::info!(
                    client_id = %session.client_id,
                    user_id = %user_session.user_id,
                    response_type = %session.response_type,
                    "Implicit tokens issued"
                );
                if let Some(access_token) = tokens.access_token {
                    params.push(("access_token", access_token));
                    params.push(("token_type", "Bearer".to_string()));
                    params.push(("expires_in", tokens.expires_in.to_string()));
                }
                params.push(("id_token", tokens.id_token));
            }
        }

        if let Some(state) = &session.state {
            params.push(("state", state.clone()));
        }

        let params: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
        build_redirect(
            &session.redirect_uri,
            &params,
            response_mode(session.response_type),
        )
    }
}

fn response_mode(response_type: ResponseType) -> ResponseMode {
    if response_type.uses_fragment() {
        ResponseMode::Fragment
    } else {
        ResponseMode::Query
    }
}

fn satisfies_max_age(session: &UserSession, max_age: Option<i64>) -> bool {
    max_age.is_none_or(|age| session.is_auth_time_fresh(time::Duration::seconds(age)))
}
