//! Dynamic registration request and response bodies (RFC 7591, RFC 7592).

use serde::{Deserialize, Serialize};

use crate::types::{ApplicationType, Client};

/// Client metadata sent to `POST /register` and `PUT /register/{client_id}`.
///
/// Enumerated fields are kept as strings so unknown values surface as
/// `invalid_client_metadata` instead of a JSON rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientRegistrationRequest {
    /// Redirect URIs. At least one is required.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    #[serde(default)]
    pub client_name: Option<String>,

    /// Defaults to `["code"]`.
    #[serde(default)]
    pub response_types: Option<Vec<String>>,

    /// Defaults to `["authorization_code"]`.
    #[serde(default)]
    pub grant_types: Option<Vec<String>>,

    /// `web` (default) or `native`.
    #[serde(default)]
    pub application_type: Option<String>,

    /// Defaults to `client_secret_basic`.
    #[serde(default)]
    pub token_endpoint_auth_method: Option<String>,

    /// Space-delimited. Defaults to `openid`.
    #[serde(default)]
    pub scope: Option<String>,

    /// Only `RS256` is accepted.
    #[serde(default)]
    pub id_token_signed_response_alg: Option<String>,

    #[serde(default)]
    pub contacts: Vec<String>,

    #[serde(default)]
    pub client_uri: Option<String>,

    #[serde(default)]
    pub logo_uri: Option<String>,

    #[serde(default)]
    pub policy_uri: Option<String>,

    #[serde(default)]
    pub tos_uri: Option<String>,

    #[serde(default)]
    pub software_id: Option<String>,

    #[serde(default)]
    pub software_version: Option<String>,

    /// Signed JWT asserting client metadata.
    #[serde(default)]
    pub software_statement: Option<String>,

    /// Must equal the path client id on update (RFC 7592 section 2.2).
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Client information response.
///
/// Secrets appear only in the response that created them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientRegistrationResponse {
    pub client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    pub client_id_issued_at: i64,

    /// `0` (never) whenever a secret was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_access_token: Option<String>,

    pub registration_client_uri: String,

    pub redirect_uris: Vec<String>,
    pub response_types: Vec<String>,
    pub grant_types: Vec<String>,
    pub application_type: String,
    pub token_endpoint_auth_method: String,
    pub scope: String,
    pub id_token_signed_response_alg: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tos_uri: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
}

impl ClientRegistrationResponse {
    /// Builds the metadata view of a stored client, without any secrets.
    #[must_use]
    pub fn from_client(client: &Client, registration_client_uri: String) -> Self {
        Self {
            client_id: client.client_id.clone(),
            client_secret: None,
            client_id_issued_at: client.client_id_issued_at,
            client_secret_expires_at: (!client.is_public()).then_some(0),
            registration_access_token: None,
            registration_client_uri,
            redirect_uris: client.redirect_uris.clone(),
            response_types: client
                .response_types
                .iter()
                .map(|rt| rt.as_str().to_string())
                .collect(),
            grant_types: client
                .grant_types
                .iter()
                .map(|gt| gt.as_str().to_string())
                .collect(),
            application_type: match client.application_type {
                ApplicationType::Web => "web".to_string(),
                ApplicationType::Native => "native".to_string(),
            },
            token_endpoint_auth_method: client.token_endpoint_auth_method.as_str().to_string(),
            scope: client.scope.clone(),
            id_token_signed_response_alg: client.id_token_signed_response_alg.clone(),
            client_name: client.client_name.clone(),
            contacts: client.contacts.clone(),
            client_uri: client.client_uri.clone(),
            logo_uri: client.logo_uri.clone(),
            policy_uri: client.policy_uri.clone(),
            tos_uri: client.tos_uri.clone(),
            software_id: client.software_id.clone(),
            software_version: client.software_version.clone(),
        }
    }
}
