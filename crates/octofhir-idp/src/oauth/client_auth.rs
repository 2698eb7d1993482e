//! Client authentication for the token, revocation, and introspection endpoints.
//!
//! Supported methods:
//!
//! - `client_secret_basic`: credentials in the `Authorization: Basic` header
//! - `client_secret_post`: `client_id` and `client_secret` in the form body
//! - `none`: public clients identify themselves with `client_id` alone
//!
//! When a Basic header is present it wins and body credentials are ignored.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::ClientStorage;
use crate::types::{Client, TokenEndpointAuthMethod};

/// Credentials a caller presented at a client-authenticated endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCredentials {
    /// `Authorization: Basic base64(client_id:client_secret)`.
    Basic {
        client_id: String,
        client_secret: String,
    },
    /// Body parameters `client_id` and `client_secret`.
    Post {
        client_id: String,
        client_secret: String,
    },
    /// `client_id` only.
    Public { client_id: String },
}

impl ClientCredentials {
    /// Extracts credentials from an optional `Authorization` header value and
    /// the body's `client_id`/`client_secret` parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidClient` if a Basic header is present but malformed, or
    /// if no client identification was presented at all.
    pub fn extract(
        authorization: Option<&str>,
        body_client_id: Option<&str>,
        body_client_secret: Option<&str>,
    ) -> AuthResult<Self> {
        if let Some(header) = authorization.filter(|h| is_basic_scheme(h)) {
            let (client_id, client_secret) = parse_basic_auth(header)
                .ok_or_else(|| AuthError::invalid_client("Malformed Basic authorization header"))?;
            return Ok(Self::Basic {
                client_id,
                client_secret,
            });
        }

        match (body_client_id, body_client_secret) {
            (Some(client_id), Some(client_secret)) if !client_secret.is_empty() => {
                Ok(Self::Post {
                    client_id: client_id.to_string(),
                    client_secret: client_secret.to_string(),
                })
            }
            (Some(client_id), _) if !client_id.is_empty() => Ok(Self::Public {
                client_id: client_id.to_string(),
            }),
            _ => Err(AuthError::invalid_client("No client credentials provided")),
        }
    }

    /// The presented client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        match self {
            Self::Basic { client_id, .. }
            | Self::Post { client_id, .. }
            | Self::Public { client_id } => client_id,
        }
    }

    fn secret(&self) -> Option<&str> {
        match self {
            Self::Basic { client_secret, .. } | Self::Post { client_secret, .. } => {
                Some(client_secret)
            }
            Self::Public { .. } => None,
        }
    }
}

/// Authenticates a client against its registration.
///
/// Confidential clients must present a secret matching the stored digest,
/// by either secret method. Public clients authenticate with `client_id`
/// alone and must not present a secret.
///
/// # Errors
///
/// Returns `InvalidClient` if the client is unknown, the secret is missing or
/// wrong, or a public client presents a secret.
pub async fn authenticate_client(
    credentials: &ClientCredentials,
    clients: &dyn ClientStorage,
) -> AuthResult<Client> {
    let client_id = credentials.client_id();
    let client = clients
        .find_by_client_id(client_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!(client_id = %client_id, "Authentication of unknown client");
            AuthError::invalid_client("Client authentication failed")
        })?;

    match (client.token_endpoint_auth_method, credentials.secret()) {
        (TokenEndpointAuthMethod::None, None) => Ok(client),
        (TokenEndpointAuthMethod::None, Some(_)) => {
            tracing::warn!(client_id = %client_id, "Public client presented a secret");
            Err(AuthError::invalid_client(
                "Public clients must not authenticate with a secret",
            ))
        }
        (_, None) => Err(AuthError::invalid_client("Client authentication failed")),
        (_, Some(secret)) => {
            if client.verify_secret(secret) {
                Ok(client)
            } else {
                tracing::warn!(client_id = %client_id, "Invalid client secret");
                Err(AuthError::invalid_client("Client authentication failed"))
            }
        }
    }
}

/// Parses an HTTP Basic authorization header into `(client_id, client_secret)`.
///
/// Returns `None` for anything that is not a well-formed Basic credential.
#[must_use]
pub fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    let header_value = header_value.trim();
    if !is_basic_scheme(header_value) {
        return None;
    }

    let decoded = STANDARD.decode(header_value[6..].trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    // Split on the first colon; secrets may contain colons.
    let (client_id, client_secret) = credentials.split_once(':')?;
    if client_id.is_empty() {
        return None;
    }

    Some((client_id.to_string(), client_secret.to_string()))
}

fn is_basic_scheme(header_value: &str) -> bool {
    header_value
        .trim()
        .get(..6)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("basic "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash_secret;
    use crate::storage::InMemoryStorage;

    fn basic(id: &str, secret: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
    }

    async fn storage() -> InMemoryStorage {
        let storage = InMemoryStorage::new();

        let mut confidential = Client::new("web", vec!["https://app.example.com/cb".to_string()]);
        confidential.client_secret_hash = Some(hash_secret("s3cret"));
        ClientStorage::create(&storage, &confidential).await.unwrap();

        let mut public = Client::new("spa", vec!["https://spa.example.com/cb".to_string()]);
        public.token_endpoint_auth_method = TokenEndpointAuthMethod::None;
        ClientStorage::create(&storage, &public).await.unwrap();

        storage
    }

    #[test]
    fn test_parse_basic_auth() {
        assert_eq!(
            parse_basic_auth(&basic("web", "a:b")),
            Some(("web".to_string(), "a:b".to_string()))
        );
        assert_eq!(parse_basic_auth("Bearer abc"), None);
        assert_eq!(parse_basic_auth("Basic !!!"), None);
        assert_eq!(parse_basic_auth(&basic("", "secret")), None);
    }

    #[test]
    fn test_basic_header_wins_over_body() {
        let credentials =
            ClientCredentials::extract(Some(&basic("web", "s3cret")), Some("other"), Some("x"))
                .unwrap();
        assert_eq!(credentials.client_id(), "web");
        assert!(matches!(credentials, ClientCredentials::Basic { .. }));
    }

    #[test]
    fn test_extract_without_header() {
        let post = ClientCredentials::extract(None, Some("web"), Some("s3cret")).unwrap();
        assert!(matches!(post, ClientCredentials::Post { .. }));

        let public = ClientCredentials::extract(None, Some("spa"), None).unwrap();
        assert_eq!(
            public,
            ClientCredentials::Public {
                client_id: "spa".to_string()
            }
        );

        let err = ClientCredentials::extract(None, None, None).unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_client");

        let err = ClientCredentials::extract(Some("Basic %%%"), None, None).unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_client");
    }

    #[tokio::test]
    async fn test_confidential_client_authentication() {
        let storage = storage().await;

        let ok = ClientCredentials::extract(Some(&basic("web", "s3cret")), None, None).unwrap();
        assert_eq!(
            authenticate_client(&ok, &storage).await.unwrap().client_id,
            "web"
        );

        let post = ClientCredentials::extract(None, Some("web"), Some("s3cret")).unwrap();
        assert!(authenticate_client(&post, &storage).await.is_ok());

        let wrong = ClientCredentials::extract(None, Some("web"), Some("nope")).unwrap();
        let err = authenticate_client(&wrong, &storage).await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);

        let missing = ClientCredentials::extract(None, Some("web"), None).unwrap();
        assert!(authenticate_client(&missing, &storage).await.is_err());
    }

    #[tokio::test]
    async fn test_public_and_unknown_clients() {
        let storage = storage().await;

        let public = ClientCredentials::extract(None, Some("spa"), None).unwrap();
        assert!(authenticate_client(&public, &storage).await.is_ok());

        let with_secret = ClientCredentials::extract(None, Some("spa"), Some("x")).unwrap();
        assert!(authenticate_client(&with_secret, &storage).await.is_err());

        let unknown = ClientCredentials::extract(None, Some("ghost"), None).unwrap();
        let err = authenticate_client(&unknown, &storage).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_client");
    }
}
