//! Relying-party (client) domain types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::crypto::hash::verify_secret;

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types a client may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow.
    AuthorizationCode,
    /// Implicit flow (`id_token`, `token id_token`).
    Implicit,
    /// Refresh Token flow.
    RefreshToken,
}

impl GrantType {
    /// Returns the OAuth 2.0 grant_type parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Implicit => "implicit",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "implicit" => Ok(Self::Implicit),
            "refresh_token" => Ok(Self::RefreshToken),
            other => Err(other.to_string()),
        }
    }
}

// =============================================================================
// Response Type
// =============================================================================

/// Authorization endpoint response types.
///
/// Multi-valued response types are order-insensitive on the wire, so
/// `"id_token token"` and `"token id_token"` parse to the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResponseType {
    /// Authorization code, returned in the query string.
    Code,
    /// ID token only, returned in the fragment.
    IdToken,
    /// Access token and ID token, returned in the fragment.
    TokenIdToken,
}

impl ResponseType {
    /// Returns the canonical wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::IdToken => "id_token",
            Self::TokenIdToken => "token id_token",
        }
    }

    /// Returns `true` if the response travels in the URL fragment.
    #[must_use]
    pub fn uses_fragment(&self) -> bool {
        !matches!(self, Self::Code)
    }

    /// The grant type a client needs in order to use this response type.
    #[must_use]
    pub fn required_grant(&self) -> GrantType {
        match self {
            Self::Code => GrantType::AuthorizationCode,
            Self::IdToken | Self::TokenIdToken => GrantType::Implicit,
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts: Vec<&str> = s.split_whitespace().collect();
        parts.sort_unstable();
        parts.dedup();

        match parts.as_slice() {
            ["code"] => Ok(Self::Code),
            ["id_token"] => Ok(Self::IdToken),
            ["id_token", "token"] => Ok(Self::TokenIdToken),
            _ => Err(s.to_string()),
        }
    }
}

impl TryFrom<String> for ResponseType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResponseType> for String {
    fn from(value: ResponseType) -> Self {
        value.as_str().to_string()
    }
}

// =============================================================================
// Token Endpoint Auth Method
// =============================================================================

/// Token endpoint authentication methods (OpenID Connect Core section 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// Client secret via HTTP Basic Auth.
    #[default]
    ClientSecretBasic,
    /// Client secret in the request body.
    ClientSecretPost,
    /// Public client, no secret.
    None,
}

impl TokenEndpointAuthMethod {
    /// Returns the string representation of the auth method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::None => "none",
        }
    }

    /// Returns `true` if clients using this method hold a secret.
    #[must_use]
    pub fn requires_secret(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TokenEndpointAuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client_secret_basic" => Ok(Self::ClientSecretBasic),
            "client_secret_post" => Ok(Self::ClientSecretPost),
            "none" => Ok(Self::None),
            other => Err(other.to_string()),
        }
    }
}

/// OIDC Dynamic Registration `application_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationType {
    /// Browser-based or server-side web application.
    #[default]
    Web,
    /// Application installed on a device.
    Native,
}

// =============================================================================
// Client
// =============================================================================

/// A registered relying party.
///
/// Secrets are held only as [`crate::crypto::hash_secret`] digests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Digest of the client secret. `None` for public clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_hash: Option<String>,

    /// Human-readable display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Registered redirect URIs. Matching is byte-for-byte.
    pub redirect_uris: Vec<String>,

    /// Grant types this client may use.
    pub grant_types: Vec<GrantType>,

    /// Response types this client may request.
    pub response_types: Vec<ResponseType>,

    /// Space-delimited scopes this client may request.
    pub scope: String,

    /// How the client authenticates at the token endpoint.
    #[serde(default)]
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,

    /// Web or native application.
    #[serde(default)]
    pub application_type: ApplicationType,

    /// Algorithm for ID tokens issued to this client.
    #[serde(default = "default_signing_alg")]
    pub id_token_signed_response_alg: String,

    /// Contact e-mail addresses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<String>,

    /// Client home page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,

    /// Logo shown on the consent page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,

    /// Privacy policy URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_uri: Option<String>,

    /// Terms of service URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tos_uri: Option<String>,

    /// Software identifier from the registration request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_id: Option<String>,

    /// Software version from the registration request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,

    /// Digest of the registration access token (dynamically registered clients only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_access_token_hash: Option<String>,

    /// Unix time the client id was issued.
    pub client_id_issued_at: i64,
}

fn default_signing_alg() -> String {
    "RS256".to_string()
}

impl Client {
    /// Creates a client with the common defaults: code flow, `openid` scope,
    /// `client_secret_basic`.
    #[must_use]
    pub fn new(client_id: impl Into<String>, redirect_uris: Vec<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret_hash: None,
            client_name: None,
            redirect_uris,
            grant_types: vec![GrantType::AuthorizationCode],
            response_types: vec![ResponseType::Code],
            scope: "openid".to_string(),
            token_endpoint_auth_method: TokenEndpointAuthMethod::default(),
            application_type: ApplicationType::default(),
            id_token_signed_response_alg: default_signing_alg(),
            contacts: Vec::new(),
            client_uri: None,
            logo_uri: None,
            policy_uri: None,
            tos_uri: None,
            software_id: None,
            software_version: None,
            registration_access_token_hash: None,
            client_id_issued_at: time::OffsetDateTime::now_utc().unix_timestamp(),
        }
    }

    /// Validates the client registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the client violates a registration invariant.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        if self.redirect_uris.is_empty() {
            return Err(ClientValidationError::NoRedirectUris);
        }

        if self.grant_types.is_empty() {
            return Err(ClientValidationError::NoGrantTypes);
        }

        let has_secret = self
            .client_secret_hash
            .as_deref()
            .is_some_and(|s| !s.is_empty());

        if self.is_public() && has_secret {
            return Err(ClientValidationError::PublicClientWithSecret);
        }

        if !self.is_public() && !has_secret {
            return Err(ClientValidationError::MissingSecret);
        }

        for response_type in &self.response_types {
            if !self.grant_types.contains(&response_type.required_grant()) {
                return Err(ClientValidationError::ResponseTypeWithoutGrant(
                    *response_type,
                ));
            }
        }

        Ok(())
    }

    /// Returns `true` for public clients (no secret, `token_endpoint_auth_method=none`).
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.token_endpoint_auth_method == TokenEndpointAuthMethod::None
    }

    /// Checks if the given redirect URI is registered, byte for byte.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// Checks if the client may use the given grant type.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// Checks if the client may request the given response type.
    #[must_use]
    pub fn is_response_type_allowed(&self, response_type: ResponseType) -> bool {
        self.response_types.contains(&response_type)
    }

    /// Iterates the client's allowed scopes.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }

    /// Returns the first scope in `requested` this client may not ask for.
    #[must_use]
    pub fn first_disallowed_scope<'a>(&self, requested: &'a str) -> Option<&'a str> {
        requested
            .split_whitespace()
            .find(|s| !self.scopes().any(|allowed| allowed == *s))
    }

    /// Checks a presented secret against the stored digest in constant time.
    #[must_use]
    pub fn verify_secret(&self, secret: &str) -> bool {
        self.client_secret_hash
            .as_deref()
            .is_some_and(|hash| verify_secret(secret, hash))
    }

    /// Checks a presented registration access token against the stored digest.
    #[must_use]
    pub fn verify_registration_token(&self, token: &str) -> bool {
        self.registration_access_token_hash
            .as_deref()
            .is_some_and(|hash| verify_secret(token, hash))
    }

    /// Name shown to end users, falling back to the client id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.client_name.as_deref().unwrap_or(&self.client_id)
    }
}

/// Errors from [`Client::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID cannot be empty.
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// At least one redirect URI is required.
    #[error("At least one redirect URI is required")]
    NoRedirectUris,

    /// At least one grant type is required.
    #[error("At least one grant type is required")]
    NoGrantTypes,

    /// Public clients must not hold a secret.
    #[error("Public clients must not have a client secret")]
    PublicClientWithSecret,

    /// Confidential clients require a client secret.
    #[error("Confidential clients require a client secret")]
    MissingSecret,

    /// A response type needs a grant type the client lacks.
    #[error("Response type '{}' requires the '{}' grant type", .0, .0.required_grant())]
    ResponseTypeWithoutGrant(ResponseType),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash_secret;

    fn confidential() -> Client {
        let mut client = Client::new("app", vec!["https://app.example.com/cb".to_string()]);
        client.client_secret_hash = Some(hash_secret("s3cret"));
        client
    }

    #[test]
    fn test_valid_confidential_client() {
        assert!(confidential().validate().is_ok());
    }

    #[test]
    fn test_public_client_with_secret_rejected() {
        let mut client = confidential();
        client.token_endpoint_auth_method = TokenEndpointAuthMethod::None;
        assert_eq!(
            client.validate(),
            Err(ClientValidationError::PublicClientWithSecret)
        );

        client.client_secret_hash = None;
        assert!(client.validate().is_ok());
        assert!(client.is_public());
    }

    #[test]
    fn test_confidential_without_secret_rejected() {
        let mut client = confidential();
        client.client_secret_hash = None;
        assert_eq!(client.validate(), Err(ClientValidationError::MissingSecret));
    }

    #[test]
    fn test_implicit_response_type_needs_grant() {
        let mut client = confidential();
        client.response_types.push(ResponseType::IdToken);
        assert_eq!(
            client.validate(),
            Err(ClientValidationError::ResponseTypeWithoutGrant(
                ResponseType::IdToken
            ))
        );

        client.grant_types.push(GrantType::Implicit);
        assert!(client.validate().is_ok());
    }

    #[test]
    fn test_redirect_uri_exact_match() {
        let client = confidential();
        assert!(client.is_redirect_uri_allowed("https://app.example.com/cb"));
        assert!(!client.is_redirect_uri_allowed("https://app.example.com/cb/"));
        assert!(!client.is_redirect_uri_allowed("https://app.example.com/cb?x=1"));
        assert!(!client.is_redirect_uri_allowed("HTTPS://app.example.com/cb"));
    }

    #[test]
    fn test_scopes_allowed() {
        let mut client = confidential();
        client.scope = "openid profile email".to_string();
        assert_eq!(client.first_disallowed_scope("openid email"), None);
        assert_eq!(client.first_disallowed_scope("openid admin"), Some("admin"));
        assert_eq!(client.first_disallowed_scope(""), None);
    }

    #[test]
    fn test_verify_secret() {
        let client = confidential();
        assert!(client.verify_secret("s3cret"));
        assert!(!client.verify_secret("wrong"));
    }

    #[test]
    fn test_response_type_parsing_is_order_insensitive() {
        assert_eq!(
            "id_token token".parse::<ResponseType>().unwrap(),
            ResponseType::TokenIdToken
        );
        assert_eq!(
            "token id_token".parse::<ResponseType>().unwrap(),
            ResponseType::TokenIdToken
        );
        assert_eq!("code".parse::<ResponseType>().unwrap(), ResponseType::Code);
        assert!("token".parse::<ResponseType>().is_err());
        assert!("code id_token".parse::<ResponseType>().is_err());
    }

    #[test]
    fn test_response_type_serde() {
        let json = serde_json::to_string(&ResponseType::TokenIdToken).unwrap();
        assert_eq!(json, "\"token id_token\"");
        let parsed: ResponseType = serde_json::from_str("\"id_token token\"").unwrap();
        assert_eq!(parsed, ResponseType::TokenIdToken);
    }

    #[test]
    fn test_client_serialization_round_trip() {
        let client = confidential();
        let json = serde_json::to_value(&client).unwrap();
        assert_eq!(json["token_endpoint_auth_method"], "client_secret_basic");
        assert_eq!(json["grant_types"][0], "authorization_code");
        let back: Client = serde_json::from_value(json).unwrap();
        assert_eq!(back.client_id, "app");
    }
}
