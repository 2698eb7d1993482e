//! Token revocation (RFC 7009) and introspection (RFC 7662) endpoints.
//!
//! Both authenticate the calling client the same way as the token endpoint.

use axum::extract::State;
use axum::extract::rejection::FormRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::{ClientCredentials, authenticate_client};
use crate::token::TokenLifecycleRequest;
use crate::types::Client;

use super::error::OAuthErrorResponse;
use super::{IdpState, authorization_header};

/// `POST /revoke`
///
/// Responds 200 for unknown tokens and for tokens of other clients.
pub async fn revoke(
    State(state): State<IdpState>,
    headers: HeaderMap,
    form: Result<Form<TokenLifecycleRequest>, FormRejection>,
) -> Response {
    let (client, request) = match authenticate(&state, &headers, form).await {
        Ok(authenticated) => authenticated,
        Err(e) => return OAuthErrorResponse::basic(e).into_response(),
    };

    match state
        .tokens
        .revoke(&client, &request.token, request.token_type_hint)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => OAuthErrorResponse::basic(e).into_response(),
    }
}

/// `POST /introspect`
pub async fn introspect(
    State(state): State<IdpState>,
    headers: HeaderMap,
    form: Result<Form<TokenLifecycleRequest>, FormRejection>,
) -> Response {
    let (client, request) = match authenticate(&state, &headers, form).await {
        Ok(authenticated) => authenticated,
        Err(e) => return OAuthErrorResponse::basic(e).into_response(),
    };

    match state
        .tokens
        .introspect(&request.token, request.token_type_hint)
        .await
    {
        Ok(response) => {
            tracing::debug!(
                client_id = %client.client_id,
                active = response.active,
                "Token introspected"
            );
            Json(response).into_response()
        }
        Err(e) => OAuthErrorResponse::basic(e).into_response(),
    }
}

async fn authenticate(
    state: &IdpState,
    headers: &HeaderMap,
    form: Result<Form<TokenLifecycleRequest>, FormRejection>,
) -> AuthResult<(Client, TokenLifecycleRequest)> {
    let Form(request) = form.map_err(|rejection| {
        AuthError::invalid_request(format!("Malformed request body: {}", rejection.body_text()))
    })?;

    let credentials = ClientCredentials::extract(
        authorization_header(headers),
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    )?;
    let client = authenticate_client(&credentials, state.clients.as_ref()).await?;

    if request.token.is_empty() {
        return Err(AuthError::invalid_request("Missing required parameter: token"));
    }

    Ok((client, request))
}
