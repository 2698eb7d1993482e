//! Token endpoint request and response types.

use serde::{Deserialize, Serialize};

/// Form body of `POST /token`.
///
/// Only `grant_type` is always required; the rest depends on the grant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// `authorization_code` or `refresh_token`.
    pub grant_type: String,

    /// Authorization code (authorization_code grant).
    #[serde(default)]
    pub code: Option<String>,

    /// Redirect URI the code was issued for (authorization_code grant).
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// PKCE verifier (authorization_code grant).
    #[serde(default)]
    pub code_verifier: Option<String>,

    /// Refresh token (refresh_token grant).
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Optional narrower scope (refresh_token grant).
    #[serde(default)]
    pub scope: Option<String>,

    /// Client id for `client_secret_post` and public clients.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret for `client_secret_post`.
    #[serde(default)]
    pub client_secret: Option<String>,
}

/// Successful token endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenResponse {
    /// The access token (a signed JWT).
    pub access_token: String,

    /// Always `Bearer`.
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    /// Opaque refresh token, present when the client may use the refresh grant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// ID token, present when `openid` was granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Granted scope.
    pub scope: String,
}

impl TokenResponse {
    /// Creates a Bearer response carrying only the access token.
    #[must_use]
    pub fn new(access_token: String, expires_in: u64, scope: String) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            refresh_token: None,
            id_token: None,
            scope,
        }
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: Option<String>) -> Self {
        self.refresh_token = refresh_token;
        self
    }

    /// Sets the ID token.
    #[must_use]
    pub fn with_id_token(mut self, id_token: Option<String>) -> Self {
        self.id_token = id_token;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_decoding_of_code_grant() {
        let body = "grant_type=authorization_code&code=abc&redirect_uri=https%3A%2F%2Fapp.example.com%2Fcb&code_verifier=xyz";
        let request: TokenRequest = serde_urlencoded_like(body);
        assert_eq!(request.grant_type, "authorization_code");
        assert_eq!(request.code.as_deref(), Some("abc"));
        assert_eq!(
            request.redirect_uri.as_deref(),
            Some("https://app.example.com/cb")
        );
        assert!(request.refresh_token.is_none());
    }

    fn serde_urlencoded_like(body: &str) -> TokenRequest {
        let pairs: serde_json::Map<String, serde_json::Value> =
            url::form_urlencoded::parse(body.as_bytes())
                .map(|(k, v)| (k.into_owned(), serde_json::Value::String(v.into_owned())))
                .collect();
        serde_json::from_value(serde_json::Value::Object(pairs)).unwrap()
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let response = TokenResponse::new("at".to_string(), 3600, "openid".to_string());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["token_type"], "Bearer");
        assert!(json.get("refresh_token").is_none());
        assert!(json.get("id_token").is_none());
    }
}
