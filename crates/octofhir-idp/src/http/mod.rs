//! Axum handlers for the provider's HTTP surface.
//!
//! | Path | Methods | Handler |
//! |------|---------|---------|
//! | `/.well-known/openid-configuration` | GET | [`discovery::openid_configuration`] |
//! | `/.well-known/jwks.json` | GET | [`discovery::jwks`] |
//! | `/authorize` | GET | [`authorize::authorize`] |
//! | `/login` | GET, POST | [`authorize::login_page`], [`authorize::login_submit`] |
//! | `/consent` | GET, POST | [`authorize::consent_page`], [`authorize::consent_submit`] |
//! | `/token` | POST | [`token::token`] |
//! | `/userinfo` | GET, POST | [`userinfo::userinfo`] |
//! | `/revoke` | POST | [`lifecycle::revoke`] |
//! | `/introspect` | POST | [`lifecycle::introspect`] |
//! | `/register` | POST | [`registration::register`] |
//! | `/register/{client_id}` | GET, PUT, DELETE | [`registration`] |
//!
//! The registration routes are mounted only when registration is enabled.

pub mod authorize;
pub mod discovery;
pub mod error;
pub mod lifecycle;
pub mod pages;
pub mod registration;
pub mod token;
pub mod userinfo;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderMap, header};
use axum::routing::{get, post};

use crate::config::IdpConfig;
use crate::oauth::AuthorizationService;
use crate::registration::RegistrationService;
use crate::session::SessionService;
use crate::storage::{ClientStorage, IdpStores};
use crate::token::{KeyManager, TokenService};

pub use error::{Challenge, OAuthErrorResponse};

/// Shared state of every provider handler.
#[derive(Clone)]
pub struct IdpState {
    pub config: Arc<IdpConfig>,
    pub clients: Arc<dyn ClientStorage>,
    pub keys: Arc<KeyManager>,
    pub tokens: Arc<TokenService>,
    pub authorization: Arc<AuthorizationService>,
    pub registration: Arc<RegistrationService>,
}

impl IdpState {
    /// Wires the engine services over a set of stores.
    #[must_use]
    pub fn new(stores: &IdpStores, config: IdpConfig) -> Self {
        let issuer = config.issuer_base().to_string();

        let keys = Arc::new(KeyManager::new(
            stores.signing_keys.clone(),
            issuer.clone(),
            config.signing.clone(),
        ));
        let tokens = Arc::new(TokenService::new(stores, keys.clone(), config.oauth.clone()));
        let sessions = Arc::new(SessionService::new(stores, config.oauth.clone()));
        let authorization = Arc::new(AuthorizationService::new(
            stores,
            sessions,
            tokens.clone(),
            config.oauth.clone(),
        ));
        let registration = Arc::new(RegistrationService::new(
            stores,
            config.registration.clone(),
            config.oauth.scopes_supported.clone(),
            issuer,
        ));

        Self {
            config: Arc::new(config),
            clients: stores.clients.clone(),
            keys,
            tokens,
            authorization,
            registration,
        }
    }
}

/// Builds the provider router.
pub fn router(state: IdpState) -> Router {
    let mut router = Router::new()
        .route(
            "/.well-known/openid-configuration",
            get(discovery::openid_configuration),
        )
        .route("/.well-known/jwks.json", get(discovery::jwks))
        .route("/authorize", get(authorize::authorize))
        .route(
            "/login",
            get(authorize::login_page).post(authorize::login_submit),
        )
        .route(
            "/consent",
            get(authorize::consent_page).post(authorize::consent_submit),
        )
        .route("/token", post(token::token))
        .route("/userinfo", get(userinfo::userinfo).post(userinfo::userinfo))
        .route("/revoke", post(lifecycle::revoke))
        .route("/introspect", post(lifecycle::introspect));

    if state.config.registration.enabled {
        router = router
            .route("/register", post(registration::register))
            .route(
                "/register/{client_id}",
                get(registration::read)
                    .put(registration::update)
                    .delete(registration::delete),
            );
    }

    router.with_state(state)
}

/// Value of an `Authorization` header.
fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Token of an `Authorization: Bearer` header. The scheme is case-insensitive.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = authorization_header(headers)?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer   xyz "));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic YTpi"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
