//! Dynamic client registration endpoints.
//!
//! `POST /register` may require an initial access token as a bearer credential.
//! The client configuration endpoint `/register/{client_id}` always requires
//! the registration access token issued with the client.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::AuthResult;
use crate::error::AuthError;
use crate::registration::{ClientRegistrationRequest, ClientRegistrationResponse};

use super::{IdpState, bearer_token};

/// `POST /register`
pub async fn register(
    State(state): State<IdpState>,
    headers: HeaderMap,
    body: Result<Json<ClientRegistrationRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let request = metadata(body)?;
    let response = state
        .registration
        .register(request, bearer_token(&headers))
        .await?;

    Ok(with_no_store(StatusCode::CREATED, response))
}

/// `GET /register/{client_id}`
pub async fn read(
    State(state): State<IdpState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    let token = registration_access_token(&headers)?;
    let response = state.registration.read(&client_id, token).await?;
    Ok(with_no_store(StatusCode::OK, response))
}

/// `PUT /register/{client_id}`
pub async fn update(
    State(state): State<IdpState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<ClientRegistrationRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let token = registration_access_token(&headers)?;
    let request = metadata(body)?;
    let response = state
        .registration
        .update(&client_id, token, request)
        .await?;
    Ok(with_no_store(StatusCode::OK, response))
}

/// `DELETE /register/{client_id}`
pub async fn delete(
    State(state): State<IdpState>,
    Path(client_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, AuthError> {
    let token = registration_access_token(&headers)?;
    state.registration.delete(&client_id, token).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn registration_access_token(headers: &HeaderMap) -> AuthResult<&str> {
    bearer_token(headers)
        .ok_or_else(|| AuthError::invalid_token("Missing registration access token"))
}

fn metadata(
    body: Result<Json<ClientRegistrationRequest>, JsonRejection>,
) -> AuthResult<ClientRegistrationRequest> {
    body.map(|Json(request)| request).map_err(|rejection| {
        tracing::debug!(error = %rejection, "Malformed registration request");
        AuthError::invalid_client_metadata("Request body is not valid client metadata")
    })
}

fn with_no_store(status: StatusCode, body: ClientRegistrationResponse) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
