//! Authorization endpoint request and redirect types.
//!
//! Successful code-flow responses and their errors travel in the redirect
//! query string. Implicit-flow responses (and errors for requests that asked
//! for tokens) travel in the fragment so they never reach the client's server.

use serde::Deserialize;
use url::Url;

use crate::AuthResult;
use crate::error::AuthError;

/// Authorization request parameters as received on `GET /authorize`.
///
/// Every field is optional at the wire level so that missing parameters are
/// reported as OAuth errors instead of generic extractor rejections.
///
/// ```text
/// GET /authorize?
///   response_type=code
///   &client_id=my-app
///   &redirect_uri=https://app.example.com/callback
///   &scope=openid profile
///   &state=af0ifjsldkj
///   &nonce=n-0S6_WzA2Mj
///   &code_challenge=E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM
///   &code_challenge_method=S256
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationRequest {
    #[serde(default)]
    pub response_type: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    /// Must exactly match one of the client's registered redirect URIs.
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Space-separated; must include `openid`.
    #[serde(default)]
    pub scope: Option<String>,

    /// Opaque value echoed back on every redirect.
    #[serde(default)]
    pub state: Option<String>,

    /// Echoed in the ID token. Required for implicit response types.
    #[serde(default)]
    pub nonce: Option<String>,

    #[serde(default)]
    pub code_challenge: Option<String>,

    /// `plain` or `S256`; `plain` when a challenge is sent without a method.
    #[serde(default)]
    pub code_challenge_method: Option<String>,

    /// Space-separated `none`, `login`, `consent`, `select_account`.
    #[serde(default)]
    pub prompt: Option<String>,

    /// Maximum authentication age in seconds.
    #[serde(default)]
    pub max_age: Option<String>,

    #[serde(default)]
    pub acr_values: Option<String>,
}

/// Where response parameters are placed on the redirect URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Query,
    Fragment,
}

impl ResponseMode {
    /// Response mode for a raw `response_type`, even one that failed to parse.
    ///
    /// Anything asking for a token is answered in the fragment.
    #[must_use]
    pub fn for_raw_response_type(raw: &str) -> Self {
        if raw
            .split_whitespace()
            .any(|part| part == "token" || part == "id_token")
        {
            Self::Fragment
        } else {
            Self::Query
        }
    }
}

/// Builds a redirect URL carrying response parameters.
///
/// Existing query parameters of the registered redirect URI are preserved.
///
/// # Errors
///
/// Returns `InvalidRequest` if the redirect URI is not an absolute URL.
pub fn build_redirect(
    redirect_uri: &str,
    params: &[(&str, &str)],
    mode: ResponseMode,
) -> AuthResult<String> {
    let mut url = Url::parse(redirect_uri)
        .map_err(|e| AuthError::invalid_request(format!("Invalid redirect_uri: {e}")))?;

    match mode {
        ResponseMode::Query => {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in params {
                pairs.append_pair(name, value);
            }
        }
        ResponseMode::Fragment => {
            let mut fragment = url::form_urlencoded::Serializer::new(String::new());
            for (name, value) in params {
                fragment.append_pair(name, value);
            }
            url.set_fragment(Some(&fragment.finish()));
        }
    }

    Ok(url.into())
}

/// Builds an error redirect with `error`, `error_description`, and `state`.
///
/// # Errors
///
/// Returns `InvalidRequest` if the redirect URI is not an absolute URL.
pub fn build_error_redirect(
    redirect_uri: &str,
    error: &AuthError,
    state: Option<&str>,
    mode: ResponseMode,
) -> AuthResult<String> {
    let description = error.public_description();
    let mut params = vec![
        ("error", error.oauth_error_code()),
        ("error_description", description.as_str()),
    ];
    if let Some(state) = state {
        params.push(("state", state));
    }

    build_redirect(redirect_uri, &params, mode)
}
