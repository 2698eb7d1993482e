//! Token endpoint.
//!
//! ```ignore
//! POST /token
//! Content-Type: application/x-www-form-urlencoded
//! Authorization: Basic <base64(client_id:client_secret)>
//!
//! grant_type=authorization_code
//! &code=SplxlOBeZQQYbYS6WxSbIA
//! &redirect_uri=https://app.example.com/callback
//! &code_verifier=dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk
//! ```

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use tracing::{debug, info, warn};

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::{ClientCredentials, TokenRequest, TokenResponse, authenticate_client};
use crate::types::{Client, GrantType};

use super::error::OAuthErrorResponse;
use super::{IdpState, authorization_header};

/// `POST /token`
pub async fn token(
    State(state): State<IdpState>,
    headers: HeaderMap,
    form: Result<Form<TokenRequest>, FormRejection>,
) -> Response {
    let request = match form {
        Ok(Form(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection, "Malformed token request");
            return OAuthErrorResponse::basic(AuthError::invalid_request(
                "Malformed token request body",
            ))
            .into_response();
        }
    };

    debug!(
        grant_type = %request.grant_type,
        client_id = ?request.client_id,
        "Processing token request"
    );

    let client = match authenticate(&state, &headers, &request).await {
        Ok(client) => client,
        Err(e) => {
            warn!(error = e.oauth_error_code(), "Client authentication failed");
            return OAuthErrorResponse::basic(e).into_response();
        }
    };

    match grant(&state, &client, &request).await {
        Ok(response) => {
            info!(
                client_id = %client.client_id,
                grant_type = %request.grant_type,
                "Token issued"
            );
            token_success_response(response)
        }
        Err(e) => {
            warn!(
                client_id = %client.client_id,
                grant_type = %request.grant_type,
                error = e.oauth_error_code(),
                "Token request failed"
            );
            OAuthErrorResponse::basic(e).into_response()
        }
    }
}

async fn authenticate(
    state: &IdpState,
    headers: &HeaderMap,
    request: &TokenRequest,
) -> AuthResult<Client> {
    let credentials = ClientCredentials::extract(
        authorization_header(headers),
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    )?;
    authenticate_client(&credentials, state.clients.as_ref()).await
}

async fn grant(
    state: &IdpState,
    client: &Client,
    request: &TokenRequest,
) -> AuthResult<TokenResponse> {
    let grant_type = match request.grant_type.parse::<GrantType>() {
        Ok(GrantType::Implicit) | Err(_) => {
            return Err(AuthError::unsupported_grant_type(&request.grant_type));
        }
        Ok(grant_type) => grant_type,
    };

    if !client.is_grant_type_allowed(grant_type) {
        return Err(AuthError::invalid_grant(format!(
            "Client is not allowed to use the {grant_type} grant"
        )));
    }

    match grant_type {
        GrantType::AuthorizationCode => {
            let code = required(request.code.as_deref(), "code")?;
            state
                .tokens
                .exchange_code(
                    client,
                    code,
                    request.redirect_uri.as_deref(),
                    request.code_verifier.as_deref(),
                )
                .await
        }
        GrantType::RefreshToken => {
            let refresh_token = required(request.refresh_token.as_deref(), "refresh_token")?;
            state
                .tokens
                .refresh(client, refresh_token, request.scope.as_deref())
                .await
        }
        GrantType::Implicit => Err(AuthError::unsupported_grant_type(&request.grant_type)),
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> AuthResult<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::invalid_request(format!("Missing required parameter: {name}")))
}

fn token_success_response(response: TokenResponse) -> Response {
    let mut response = Json(response).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_parameter() {
        assert_eq!(required(Some("abc"), "code").unwrap(), "abc");

        let err = required(Some(""), "code").unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");
        assert!(required(None, "refresh_token").is_err());
    }

    #[test]
    fn test_success_response_is_not_cacheable() {
        let response = token_success_response(TokenResponse::new(
            "at".to_string(),
            3600,
            "openid".to_string(),
        ));
        assert_eq!(response.headers().get(header::CACHE_CONTROL).unwrap(), "no-store");
        assert_eq!(response.headers().get(header::PRAGMA).unwrap(), "no-cache");
    }
}
