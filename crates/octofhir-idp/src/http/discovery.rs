//! OpenID Provider metadata and the JWK Set.

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use crate::config::IdpConfig;
use crate::error::AuthError;
use crate::token::jwt::SIGNING_ALGORITHM;

/// Claims the provider can release.
const CLAIMS_SUPPORTED: &[&str] = &[
    "sub",
    "iss",
    "aud",
    "exp",
    "iat",
    "auth_time",
    "nonce",
    "acr",
    "amr",
    "at_hash",
    "name",
    "given_name",
    "family_name",
    "picture",
    "email",
    "email_verified",
];

/// `GET /.well-known/openid-configuration`
pub async fn openid_configuration(State(state): State<super::IdpState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(provider_metadata(&state.config)),
    )
}

/// `GET /.well-known/jwks.json`
///
/// Lists every key that still verifies tokens, including retired keys in
/// their grace period.
pub async fn jwks(
    State(state): State<super::IdpState>,
) -> Result<impl IntoResponse, AuthError> {
    let jwks = state.keys.jwks().await?;
    Ok((
        [(header::CACHE_CONTROL, "public, max-age=300")],
        Json(jwks),
    ))
}

/// Builds the discovery document for a configuration.
#[must_use]
pub fn provider_metadata(config: &IdpConfig) -> Value {
    let mut metadata = json!({
        "issuer": config.issuer_base(),
        "authorization_endpoint": config.endpoint("/authorize"),
        "token_endpoint": config.endpoint("/token"),
        "userinfo_endpoint": config.endpoint("/userinfo"),
        "jwks_uri": config.endpoint("/.well-known/jwks.json"),
        "revocation_endpoint": config.endpoint("/revoke"),
        "introspection_endpoint": config.endpoint("/introspect"),
        "response_types_supported": ["code", "id_token", "token id_token"],
        "response_modes_supported": ["query", "fragment"],
        "grant_types_supported": ["authorization_code", "implicit", "refresh_token"],
        "subject_types_supported": ["public"],
        "id_token_signing_alg_values_supported": [SIGNING_ALGORITHM],
        "scopes_supported": config.oauth.scopes_supported,
        "token_endpoint_auth_methods_supported": [
            "client_secret_basic",
            "client_secret_post",
            "none"
        ],
        "revocation_endpoint_auth_methods_supported": [
            "client_secret_basic",
            "client_secret_post",
            "none"
        ],
        "claims_supported": CLAIMS_SUPPORTED,
        "code_challenge_methods_supported": ["plain", "S256"],
        "prompt_values_supported": ["none", "login", "consent", "select_account"]
    });

    if config.registration.enabled {
        metadata["registration_endpoint"] = json!(config.endpoint("/register"));
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_endpoints_follow_issuer() {
        let config = IdpConfig {
            issuer: "https://id.example.com/".to_string(),
            ..Default::default()
        };
        let metadata = provider_metadata(&config);

        assert_eq!(metadata["issuer"], "https://id.example.com");
        assert_eq!(metadata["token_endpoint"], "https://id.example.com/token");
        assert_eq!(
            metadata["jwks_uri"],
            "https://id.example.com/.well-known/jwks.json"
        );
        assert_eq!(
            metadata["registration_endpoint"],
            "https://id.example.com/register"
        );
        assert_eq!(metadata["id_token_signing_alg_values_supported"][0], "RS256");
        assert!(
            metadata["scopes_supported"]
                .as_array()
                .unwrap()
                .iter()
                .any(|s| s == "openid")
        );
    }

    #[test]
    fn test_registration_endpoint_omitted_when_disabled() {
        let mut config = IdpConfig::default();
        config.registration.enabled = false;
        let metadata = provider_metadata(&config);
        assert!(metadata.get("registration_endpoint").is_none());
    }
}
