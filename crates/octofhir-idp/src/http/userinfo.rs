//! UserInfo endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

use crate::error::AuthError;
use crate::types::UserInfo;

use super::{IdpState, bearer_token};

/// `GET /userinfo` and `POST /userinfo`
///
/// Returns the claims released by the access token's scope.
pub async fn userinfo(
    State(state): State<IdpState>,
    headers: HeaderMap,
) -> Result<Json<UserInfo>, AuthError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AuthError::invalid_token("Missing bearer access token"))?;

    let info = state.tokens.userinfo(token).await?;
    tracing::debug!(sub = %info.sub, "UserInfo served");
    Ok(Json(info))
}
