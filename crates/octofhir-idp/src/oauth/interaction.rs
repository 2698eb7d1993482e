//! Login and consent steps of the authorization flow.
//!
//! An authorization session moves through:
//!
//! ```text
//! unauthenticated -> authenticating -> authenticated-unconsented -> consented -> terminal
//! ```
//!
//! `authenticating` is the `POST /login` call itself. Reaching `consented`
//! hands the session back to [`AuthorizationService::advance`], which issues
//! the response and ends the session.

use uuid::Uuid;

use crate::AuthResult;
use crate::error::AuthError;
use crate::types::{AuthSession, ConsentDecision};

use super::service::{AuthorizationService, AuthorizeOutcome};

/// Position of an authorization session in the login/consent workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// No end user is attached yet.
    Unauthenticated,
    /// Logged in, waiting for the consent decision.
    AuthenticatedUnconsented,
    /// Consent granted; ready for issuance.
    Consented,
}

impl FlowState {
    /// Derives the state from a stored session.
    #[must_use]
    pub fn of(session: &AuthSession) -> Self {
        match (session.is_authenticated(), session.consent) {
            (false, _) => Self::Unauthenticated,
            (true, ConsentDecision::Granted) => Self::Consented,
            (true, _) => Self::AuthenticatedUnconsented,
        }
    }
}

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials were rejected; show the login page again.
    Failed,
    /// Credentials accepted. The browser must carry `user_session_id` from now on.
    Authenticated {
        user_session_id: Uuid,
        next: AuthorizeOutcome,
    },
}

/// What the login and consent pages need to render.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub session: AuthSession,
    pub client_name: String,
}

impl AuthorizationService {
    /// Loads an in-flight authorization session for rendering.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the session is unknown or expired.
    pub async fn pending_request(&self, session_id: Uuid) -> AuthResult<PendingRequest> {
        let session = self.sessions.auth_session(session_id).await?;
        let client_name = self
            .clients
            .find_by_client_id(&session.client_id)
            .await?
            .map_or_else(
                || session.client_id.clone(),
                |client| client.display_name().to_string(),
            );

        Ok(PendingRequest {
            session,
            client_name,
        })
    }

    /// Verifies credentials for an in-flight authorization session.
    ///
    /// On success a new browser session replaces `previous_browser_session`
    /// and the flow continues to consent or issuance. Failures never reveal
    /// whether the username exists.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the session is unknown or expired, or a
    /// storage error.
    pub async fn login(
        &self,
        session_id: Uuid,
        username: &str,
        password: &str,
        previous_browser_session: Option<Uuid>,
    ) -> AuthResult<LoginOutcome> {
        let mut session = self.sessions.auth_session(session_id).await?;

        let Some(user) = self.sessions.authenticate(username, password).await? else {
            return Ok(LoginOutcome::Failed);
        };

        let user_session = self
            .sessions
            .start_user_session(&user, previous_browser_session)
            .await?;

        session.user_id = Some(user.id.clone());
        session.user_session_id = Some(user_session.id);
        self.sessions.update_auth_session(&session).await?;

        let next = self.advance(session, Some(user_session.id)).await?;
        Ok(LoginOutcome::Authenticated {
            user_session_id: user_session.id,
            next,
        })
    }

    /// Applies the end user's consent decision.
    ///
    /// Approval stores (or extends) the user's consent for the client and
    /// continues to issuance. Denial ends the flow with an `access_denied`
    /// redirect.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the session is unknown, not waiting for
    /// consent, or the decision does not come from the browser that logged in.
    pub async fn consent(
        &self,
        session_id: Uuid,
        approve: bool,
        browser_session: Option<Uuid>,
    ) -> AuthResult<AuthorizeOutcome> {
        let mut session = self.sessions.auth_session(session_id).await?;

        if FlowState::of(&session) != FlowState::AuthenticatedUnconsented {
            return Err(AuthError::invalid_request(
                "The authorization request is not awaiting consent",
            ));
        }

        if browser_session.is_none() || session.user_session_id != browser_session {
            tracing::warn!(session_id = %session.id, "Consent from a different browser session");
            return Err(AuthError::invalid_request(
                "Consent must be given by the authenticated browser",
            ));
        }

        let Some(user_id) = session.user_id.clone() else {
            return Err(AuthError::invalid_request(
                "The authorization request is not authenticated",
            ));
        };

        if !approve {
            session.consent = ConsentDecision::Denied;
            tracing::info!(
                user_id = %user_id,
                client_id = %session.client_id,
                "Consent denied"
            );
            let denied = AuthError::access_denied("The end user denied the request");
            return self.finish_with_error(&session, &denied).await;
        }

        self.sessions
            .grant_consent(&user_id, &session.client_id, &session.scopes())
            .await?;
        session.consent = ConsentDecision::Granted;
        self.sessions.update_auth_session(&session).await?;

        self.advance(session, browser_session).await
    }
}
