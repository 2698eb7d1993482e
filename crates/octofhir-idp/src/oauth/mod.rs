//! OAuth 2.0 / OpenID Connect authorization server.
//!
//! - [`authorize`] - authorization request parameters and redirect building
//! - [`service`] - the authorization flow controller
//! - [`interaction`] - login and consent steps of an in-flight request
//! - [`client_auth`] - client authentication at the token endpoint
//! - [`token`] - token endpoint request/response types
//!
//! # Authorization Code Flow
//!
//! ```ignore
//! let outcome = authorization.authorize(&request, cookie_session).await?;
//! // Login { session_id } -> render the login page
//! let login = authorization.login(session_id, "alice", "secret", None).await?;
//! // Consent { session_id } -> render the consent page
//! let outcome = authorization.consent(session_id, true, Some(user_session_id)).await?;
//! // Redirect(url) carries `code` and `state`
//! let tokens = token_service.exchange_code(&client, &code, Some(redirect_uri), Some(verifier)).await?;
//! ```

pub mod authorize;
pub mod client_auth;
pub mod interaction;
pub mod service;
pub mod token;

pub use authorize::{AuthorizationRequest, ResponseMode, build_error_redirect, build_redirect};
pub use client_auth::{ClientCredentials, authenticate_client, parse_basic_auth};
pub use interaction::{FlowState, LoginOutcome, PendingRequest};
pub use service::{AuthorizationService, AuthorizeOutcome};
pub use token::{TokenRequest, TokenResponse};
