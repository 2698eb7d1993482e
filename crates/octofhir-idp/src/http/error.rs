//! JSON error responses.
//!
//! Every direct error is `{"error": ..., "error_description": ...}` with the
//! status from [`AuthError::status_code`]. A 401 names the authentication
//! scheme the endpoint expects.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AuthError;

/// Authentication scheme advertised in `WWW-Authenticate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Challenge {
    /// Client authentication (token, revocation, introspection).
    Basic,
    /// Bearer tokens (userinfo, client configuration).
    Bearer,
}

/// Wire shape of an OAuth 2.0 error.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    error_description: String,
}

/// An [`AuthError`] bound to the challenge of the endpoint that produced it.
#[derive(Debug)]
pub struct OAuthErrorResponse {
    error: AuthError,
    challenge: Challenge,
}

impl OAuthErrorResponse {
    /// Error from an endpoint that authenticates clients.
    #[must_use]
    pub fn basic(error: AuthError) -> Self {
        Self {
            error,
            challenge: Challenge::Basic,
        }
    }

    /// Error from a Bearer-protected endpoint.
    #[must_use]
    pub fn bearer(error: AuthError) -> Self {
        Self {
            error,
            challenge: Challenge::Bearer,
        }
    }
}

impl From<AuthError> for OAuthErrorResponse {
    fn from(error: AuthError) -> Self {
        Self::bearer(error)
    }
}

impl IntoResponse for OAuthErrorResponse {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        if self.error.is_server_error() {
            tracing::error!(
                error = %self.error,
                category = ?self.error.category(),
                "Request failed with server error"
            );
        }

        let body = ErrorBody {
            error: self.error.oauth_error_code(),
            error_description: self.error.public_description(),
        };

        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

        if status == StatusCode::UNAUTHORIZED {
            let challenge = match self.challenge {
                Challenge::Basic => HeaderValue::from_static("Basic realm=\"idp\""),
                Challenge::Bearer => match self.error.oauth_error_code() {
                    "invalid_token" => {
                        HeaderValue::from_static("Bearer realm=\"idp\", error=\"invalid_token\"")
                    }
                    _ => HeaderValue::from_static("Bearer realm=\"idp\""),
                },
            };
            headers.insert(header::WWW_AUTHENTICATE, challenge);
        }

        response
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        OAuthErrorResponse::bearer(self).into_response()
    }
}
