//! Revocation (RFC 7009) and introspection (RFC 7662) wire types.
//!
//! Neither endpoint reveals why a token is unusable: unknown, expired, and
//! revoked tokens all introspect as `{"active": false}` and revoke with 200.

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Request Types
// =============================================================================

/// Hint about which half of a token pair is being presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenTypeHint {
    AccessToken,
    RefreshToken,
}

impl TokenTypeHint {
    /// Parses a registered hint value. Unknown hints yield `None`.
    #[must_use]
    pub fn from_hint(value: &str) -> Option<Self> {
        match value {
            "access_token" => Some(Self::AccessToken),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

fn lenient_hint<'de, D>(deserializer: D) -> Result<Option<TokenTypeHint>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(TokenTypeHint::from_hint))
}

/// Form body of `POST /revoke` and `POST /introspect`.
///
/// Client credentials travel alongside (Basic header or body fields).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenLifecycleRequest {
    /// The token value. Empty when absent.
    #[serde(default)]
    pub token: String,

    /// Optional lookup hint; both halves are searched regardless.
    #[serde(default, deserialize_with = "lenient_hint")]
    pub token_type_hint: Option<TokenTypeHint>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,
}

// =============================================================================
// Response Types
// =============================================================================

/// Token introspection response.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct IntrospectionResponse {
    /// Whether the token is currently usable. The only field of an inactive response.
    pub active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// `Bearer` for access tokens, `refresh_token` for refresh tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl IntrospectionResponse {
    /// Response for any token that is not active.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }
}
