//! Authorization, login, and consent endpoints.
//!
//! `/authorize` validates the request and sends the browser on to `/login`
//! or `/consent` with the authorization session id in `session_id`, or
//! straight back to the client. Logging in sets the browser session cookie.
//!
//! Errors that cannot be redirected to the client are rendered as an HTML
//! error page.

use axum::Form;
use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{IdpConfig, to_time_duration};
use crate::error::AuthError;
use crate::oauth::{AuthorizationRequest, AuthorizeOutcome, FlowState, LoginOutcome};

use super::IdpState;
use super::pages::{render_consent_form, render_error_page, render_login_form};

const LOGIN_FAILED: &str = "Invalid username or password";

/// `session_id` query parameter of the login and consent pages.
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub session_id: String,
}

/// Login form body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Consent form body. `action` is `approve` or `deny`.
#[derive(Debug, Deserialize)]
pub struct ConsentForm {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub action: String,
}

/// `GET /authorize`
pub async fn authorize(
    State(state): State<IdpState>,
    jar: CookieJar,
    Query(request): Query<AuthorizationRequest>,
) -> Response {
    debug!(
        client_id = ?request.client_id,
        response_type = ?request.response_type,
        "Processing authorization request"
    );

    let browser_session = browser_session(&jar, &state.config);
    match state.authorization.authorize(&request, browser_session).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => error_page(&e),
    }
}

/// `GET /login`
pub async fn login_page(
    State(state): State<IdpState>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let pending = match parse_session_id(&query.session_id) {
        Ok(id) => state.authorization.pending_request(id).await,
        Err(e) => Err(e),
    };

    match pending {
        Ok(pending) => Html(render_login_form(
            &pending.client_name,
            &pending.session.id.to_string(),
            None,
        ))
        .into_response(),
        Err(e) => error_page(&e),
    }
}

/// `POST /login`
pub async fn login_submit(
    State(state): State<IdpState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let session_id = match parse_session_id(&form.session_id) {
        Ok(id) => id,
        Err(e) => return error_page(&e),
    };

    let previous = browser_session(&jar, &state.config);
    let outcome = state
        .authorization
        .login(session_id, &form.username, &form.password, previous)
        .await;

    match outcome {
        Ok(LoginOutcome::Authenticated {
            user_session_id,
            next,
        }) => {
            let jar = jar.add(session_cookie(&state.config, user_session_id));
            (jar, outcome_response(next)).into_response()
        }
        Ok(LoginOutcome::Failed) => match state.authorization.pending_request(session_id).await {
            Ok(pending) => Html(render_login_form(
                &pending.client_name,
                &session_id.to_string(),
                Some(LOGIN_FAILED),
            ))
            .into_response(),
            Err(e) => error_page(&e),
        },
        Err(e) => error_page(&e),
    }
}

/// `GET /consent`
pub async fn consent_page(
    State(state): State<IdpState>,
    Query(query): Query<SessionQuery>,
) -> Response {
    let pending = match parse_session_id(&query.session_id) {
        Ok(id) => state.authorization.pending_request(id).await,
        Err(e) => Err(e),
    };

    match pending {
        Ok(pending) if FlowState::of(&pending.session) == FlowState::AuthenticatedUnconsented => {
            let scopes: Vec<String> = pending
                .session
                .scopes()
                .into_iter()
                .map(str::to_string)
                .collect();
            Html(render_consent_form(
                &pending.client_name,
                &scopes,
                &pending.session.id.to_string(),
            ))
            .into_response()
        }
        Ok(_) => error_page(&AuthError::invalid_request(
            "The authorization request is not awaiting consent",
        )),
        Err(e) => error_page(&e),
    }
}

/// `POST /consent`
pub async fn consent_submit(
    State(state): State<IdpState>,
    jar: CookieJar,
    Form(form): Form<ConsentForm>,
) -> Response {
    let session_id = match parse_session_id(&form.session_id) {
        Ok(id) => id,
        Err(e) => return error_page(&e),
    };

    let approve = match form.action.as_str() {
        "approve" => true,
        "deny" => false,
        _ => {
            return error_page(&AuthError::invalid_request(
                "action must be 'approve' or 'deny'",
            ));
        }
    };

    let browser_session = browser_session(&jar, &state.config);
    match state
        .authorization
        .consent(session_id, approve, browser_session)
        .await
    {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => error_page(&e),
    }
}

fn outcome_response(outcome: AuthorizeOutcome) -> Response {
    match outcome {
        AuthorizeOutcome::Redirect(url) => Redirect::to(&url).into_response(),
        AuthorizeOutcome::Login { session_id } => {
            Redirect::to(&format!("login?session_id={session_id}")).into_response()
        }
        AuthorizeOutcome::Consent { session_id } => {
            Redirect::to(&format!("consent?session_id={session_id}")).into_response()
        }
    }
}

fn error_page(e: &AuthError) -> Response {
    if e.is_server_error() {
        error!(error = %e, "Authorization endpoint failed");
    } else {
        info!(error = e.oauth_error_code(), "Authorization request rejected");
    }

    (
        e.status_code(),
        Html(render_error_page(e.oauth_error_code(), &e.public_description())),
    )
        .into_response()
}

fn parse_session_id(raw: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(raw)
        .map_err(|_| AuthError::invalid_request("Missing or malformed session_id"))
}

/// User session id carried by the session cookie.
fn browser_session(jar: &CookieJar, config: &IdpConfig) -> Option<Uuid> {
    jar.get(&config.cookies.session_cookie_name)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

fn session_cookie(config: &IdpConfig, user_session_id: Uuid) -> Cookie<'static> {
    Cookie::build((
        config.cookies.session_cookie_name.clone(),
        user_session_id.to_string(),
    ))
    .http_only(true)
    .secure(config.cookies.secure)
    .same_site(SameSite::Lax)
    .path("/")
    .max_age(to_time_duration(config.oauth.user_session_lifetime))
    .build()
}

#[cfg(test)]
mod tests {
    use axum::http::{StatusCode, header};

    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let config = IdpConfig::default();
        let id = Uuid::new_v4();
        let cookie = session_cookie(&config, id);

        assert_eq!(cookie.name(), "idp_session");
        assert_eq!(cookie.value(), id.to_string());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn test_browser_session_ignores_garbage() {
        let config = IdpConfig::default();
        let jar = CookieJar::new().add(Cookie::new("idp_session", "not-a-uuid"));
        assert_eq!(browser_session(&jar, &config), None);

        let id = Uuid::new_v4();
        let jar = CookieJar::new().add(Cookie::new("idp_session", id.to_string()));
        assert_eq!(browser_session(&jar, &config), Some(id));
    }

    #[test]
    fn test_outcome_redirects() {
        let id = Uuid::new_v4();
        let response = outcome_response(AuthorizeOutcome::Login { session_id: id });
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            &format!("login?session_id={id}")
        );

        let response = outcome_response(AuthorizeOutcome::Redirect(
            "https://app.example.com/cb?code=x".to_string(),
        ));
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://app.example.com/cb?code=x"
        );
    }

    #[test]
    fn test_error_page_status() {
        let response = error_page(&AuthError::invalid_client("Unknown client"));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = error_page(&AuthError::invalid_request("bad"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
