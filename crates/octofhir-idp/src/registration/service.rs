//! Dynamic client registration and management (RFC 7591, RFC 7592).

use std::sync::Arc;

use url::{Host, Url};

use crate::AuthResult;
use crate::config::RegistrationConfig;
use crate::crypto::{generate_client_id, generate_token, hash_secret};
use crate::error::AuthError;
use crate::storage::{ClientStorage, IdpStores, InitialAccessTokenStorage};
use crate::token::jwt::SIGNING_ALGORITHM;
use crate::types::{ApplicationType, Client, GrantType, ResponseType, TokenEndpointAuthMethod};

use super::statement::SoftwareStatement;
use super::types::{ClientRegistrationRequest, ClientRegistrationResponse};

/// Registers clients and serves their configuration endpoint.
pub struct RegistrationService {
    clients: Arc<dyn ClientStorage>,
    initial_access_tokens: Arc<dyn InitialAccessTokenStorage>,
    config: RegistrationConfig,
    scopes_supported: Vec<String>,
    issuer: String,
}

impl RegistrationService {
    /// Creates a registration service.
    ///
    /// `issuer` is the base URL for `registration_client_uri` values.
    #[must_use]
    pub fn new(
        stores: &IdpStores,
        config: RegistrationConfig,
        scopes_supported: Vec<String>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            clients: stores.clients.clone(),
            initial_access_tokens: stores.initial_access_tokens.clone(),
            config,
            scopes_supported,
            issuer: issuer.into().trim_end_matches('/').to_string(),
        }
    }

    fn registration_client_uri(&self, client_id: &str) -> String {
        format!("{}/register/{client_id}", self.issuer)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a new client.
    ///
    /// The response is the only place the client secret and the registration
    /// access token are ever returned in plain form.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` if an initial access token is required and missing,
    ///   unknown, expired, or already used
    /// - `InvalidSoftwareStatement` / `UnapprovedSoftwareStatement` for a bad
    ///   or untrusted software statement
    /// - `InvalidRedirectUri` / `InvalidClientMetadata` for bad metadata
    pub async fn register(
        &self,
        request: ClientRegistrationRequest,
        initial_access_token: Option<&str>,
    ) -> AuthResult<ClientRegistrationResponse> {
        let initial_access_token_hash = if self.config.require_initial_access_token {
            Some(self.check_initial_access_token(initial_access_token).await?)
        } else {
            None
        };

        let statement = request
            .software_statement
            .as_deref()
            .map(|jwt| {
                SoftwareStatement::approve(jwt, &self.config.allowed_software_statement_issuers)
            })
            .transpose()?;

        let mut client = self.build_client(generate_client_id(), &request)?;
        if let Some(statement) = statement {
            // Statement claims take precedence over plain request metadata.
            client.software_id = statement.software_id.or(client.software_id);
            client.software_version = statement.software_version.or(client.software_version);
            client.client_name = statement.client_name.or(client.client_name);
        }

        let client_secret = (!client.is_public()).then(generate_token);
        client.client_secret_hash = client_secret.as_deref().map(hash_secret);

        let registration_access_token = generate_token();
        client.registration_access_token_hash = Some(hash_secret(&registration_access_token));

        client.validate()?;

        if let Some(hash) = initial_access_token_hash {
            let marked = self
                .initial_access_tokens
                .mark_used(&hash, &client.client_id)
                .await?;
            if !marked {
                // Spent by a concurrent registration.
                return Err(AuthError::invalid_token(
                    "Initial access token has already been used",
                ));
            }
        }

        let client = self.clients.create(&client).await?;

        tracing::info!(
            client_id = %client.client_id,
            application_type = ?client.application_type,
            auth_method = %client.token_endpoint_auth_method,
            "Client registered"
        );

        let mut response = ClientRegistrationResponse::from_client(
            &client,
            self.registration_client_uri(&client.client_id),
        );
        response.client_secret = client_secret;
        response.registration_access_token = Some(registration_access_token);
        Ok(response)
    }

    /// Checks a presented initial access token, returning its digest.
    async fn check_initial_access_token(&self, token: Option<&str>) -> AuthResult<String> {
        let token = token
            .ok_or_else(|| AuthError::invalid_token("An initial access token is required"))?;
        let hash = hash_secret(token);

        let record = self
            .initial_access_tokens
            .find_by_hash(&hash)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Registration with unknown initial access token");
                AuthError::invalid_token("Invalid initial access token")
            })?;

        if record.used || record.is_expired() {
            tracing::warn!("Registration with spent initial access token");
            return Err(AuthError::invalid_token("Invalid initial access token"));
        }

        Ok(hash)
    }

    // =========================================================================
    // Client Configuration Endpoint
    // =========================================================================

    /// Returns the current metadata of a registered client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` if the client is unknown or the registration
    /// access token does not belong to it.
    pub async fn read(
        &self,
        client_id: &str,
        registration_access_token: &str,
    ) -> AuthResult<ClientRegistrationResponse> {
        let client = self.authorize(client_id, registration_access_token).await?;
        Ok(ClientRegistrationResponse::from_client(
            &client,
            self.registration_client_uri(client_id),
        ))
    }

    /// Replaces the metadata of a registered client.
    ///
    /// The client id, issue time, and registration access token are kept. A
    /// new secret is issued only when the client moves from public to
    /// confidential.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` as for [`Self::read`]
    /// - `InvalidRequest` if the body names a different `client_id`
    /// - `InvalidRedirectUri` / `InvalidClientMetadata` for bad metadata
    pub async fn update(
        &self,
        client_id: &str,
        registration_access_token: &str,
        request: ClientRegistrationRequest,
    ) -> AuthResult<ClientRegistrationResponse> {
        let existing = self.authorize(client_id, registration_access_token).await?;

        if request.client_id.as_deref().is_some_and(|id| id != client_id) {
            return Err(AuthError::invalid_request(
                "client_id in the body does not match the registration",
            ));
        }
        if request.software_statement.is_some() {
            return Err(AuthError::invalid_client_metadata(
                "software_statement cannot be changed after registration",
            ));
        }

        let mut client = self.build_client(existing.client_id.clone(), &request)?;
        client.client_id_issued_at = existing.client_id_issued_at;
        client.registration_access_token_hash = existing.registration_access_token_hash.clone();
        client.software_id = client.software_id.or(existing.software_id);
        client.software_version = client.software_version.or(existing.software_version);

        let mut new_secret = None;
        if !client.is_public() {
            match existing.client_secret_hash {
                Some(hash) => client.client_secret_hash = Some(hash),
                None => {
                    let secret = generate_token();
                    client.client_secret_hash = Some(hash_secret(&secret));
                    new_secret = Some(secret);
                }
            }
        }

        client.validate()?;
        let client = self.clients.update(&client).await?;
        tracing::info!(client_id = %client_id, "Client registration updated");

        let mut response =
            ClientRegistrationResponse::from_client(&client, self.registration_client_uri(client_id));
        response.client_secret = new_secret;
        Ok(response)
    }

    /// Deletes a registered client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` as for [`Self::read`].
    pub async fn delete(&self, client_id: &str, registration_access_token: &str) -> AuthResult<()> {
        self.authorize(client_id, registration_access_token).await?;
        self.clients.delete(client_id).await?;
        tracing::info!(client_id = %client_id, "Client registration deleted");
        Ok(())
    }

    /// Resolves the client a registration access token manages.
    async fn authorize(&self, client_id: &str, token: &str) -> AuthResult<Client> {
        let client = self.clients.find_by_client_id(client_id).await?;

        match client {
            Some(client) if client.verify_registration_token(token) => Ok(client),
            _ => {
                tracing::warn!(client_id = %client_id, "Invalid registration access token");
                Err(AuthError::invalid_token("Invalid registration access token"))
            }
        }
    }

    // =========================================================================
    // Metadata Validation
    // =========================================================================

    /// Builds a client (without secrets) from validated request metadata.
    fn build_client(
        &self,
        client_id: String,
        request: &ClientRegistrationRequest,
    ) -> AuthResult<Client> {
        if request.redirect_uris.is_empty() {
            return Err(AuthError::invalid_client_metadata(
                "At least one redirect_uri is required",
            ));
        }

        let application_type = match request.application_type.as_deref() {
            None | Some("web") => ApplicationType::Web,
            Some("native") => ApplicationType::Native,
            Some(other) => {
                return Err(AuthError::invalid_client_metadata(format!(
                    "Unsupported application_type '{other}'"
                )));
            }
        };

        let token_endpoint_auth_method = match request.token_endpoint_auth_method.as_deref() {
            None => TokenEndpointAuthMethod::default(),
            Some(raw) => raw.parse().map_err(|other: String| {
                AuthError::invalid_client_metadata(format!(
                    "Unsupported token_endpoint_auth_method '{other}'"
                ))
            })?,
        };

        let response_types = parse_list::<ResponseType>(
            request.response_types.as_deref(),
            ResponseType::Code,
            "response_type",
        )?;
        let grant_types = parse_list::<GrantType>(
            request.grant_types.as_deref(),
            GrantType::AuthorizationCode,
            "grant_type",
        )?;

        // omitted scope means every scope the provider supports
        let default_scope = self.scopes_supported.join(" ");
        let scope = request.scope.as_deref().unwrap_or(&default_scope);
        if let Some(unknown) = scope
            .split_whitespace()
            .find(|s| !self.scopes_supported.iter().any(|supported| supported == s))
        {
            return Err(AuthError::invalid_client_metadata(format!(
                "Scope '{unknown}' is not supported"
            )));
        }

        if request
            .id_token_signed_response_alg
            .as_deref()
            .is_some_and(|alg| alg != SIGNING_ALGORITHM)
        {
            return Err(AuthError::invalid_client_metadata(format!(
                "id_token_signed_response_alg must be {SIGNING_ALGORITHM}"
            )));
        }

        let implicit = grant_types.contains(&GrantType::Implicit);
        for uri in &request.redirect_uris {
            validate_redirect_uri(uri, application_type, implicit)?;
        }

        let mut client = Client::new(client_id, request.redirect_uris.clone());
        client.client_name = request.client_name.clone();
        client.response_types = response_types;
        client.grant_types = grant_types;
        client.scope = scope.split_whitespace().collect::<Vec<_>>().join(" ");
        client.token_endpoint_auth_method = token_endpoint_auth_method;
        client.application_type = application_type;
        client.contacts = request.contacts.clone();
        client.client_uri = request.client_uri.clone();
        client.logo_uri = request.logo_uri.clone();
        client.policy_uri = request.policy_uri.clone();
        client.tos_uri = request.tos_uri.clone();
        client.software_id = request.software_id.clone();
        client.software_version = request.software_version.clone();
        Ok(client)
    }
}

fn parse_list<T: std::str::FromStr<Err = String> + PartialEq>(
    values: Option<&[String]>,
    default: T,
    field: &str,
) -> AuthResult<Vec<T>> {
    let Some(values) = values else {
        return Ok(vec![default]);
    };

    let mut parsed = Vec::with_capacity(values.len());
    for value in values {
        let item: T = value.parse().map_err(|other: String| {
            AuthError::invalid_client_metadata(format!("Unsupported {field} '{other}'"))
        })?;
        if !parsed.contains(&item) {
            parsed.push(item);
        }
    }

    if parsed.is_empty() {
        return Err(AuthError::invalid_client_metadata(format!(
            "At least one {field} is required"
        )));
    }
    Ok(parsed)
}

/// Checks one redirect URI against the rules for the application type.
///
/// - never a fragment, always absolute
/// - web: `http`/`https`; clients using the implicit grant need `https` on a
///   non-loopback host
/// - native: a custom scheme, or `http` on a loopback host
fn validate_redirect_uri(uri: &str, application_type: ApplicationType, implicit: bool) -> AuthResult<()> {
    let url = Url::parse(uri)
        .map_err(|e| AuthError::invalid_redirect_uri(format!("'{uri}' is not a valid URL: {e}")))?;

    if url.fragment().is_some() {
        return Err(AuthError::invalid_redirect_uri(format!(
            "'{uri}' must not contain a fragment"
        )));
    }

    let loopback = is_loopback(&url);
    match (application_type, url.scheme()) {
        (ApplicationType::Web, "https") if implicit && loopback => {
            Err(AuthError::invalid_redirect_uri(format!(
                "'{uri}' must not use a loopback host for implicit clients"
            )))
        }
        (ApplicationType::Web, "https") => Ok(()),
        (ApplicationType::Web, "http") if implicit => Err(AuthError::invalid_redirect_uri(
            format!("'{uri}' must use https for implicit clients"),
        )),
        (ApplicationType::Web, "http") => Ok(()),
        (ApplicationType::Web, _) => Err(AuthError::invalid_redirect_uri(format!(
            "'{uri}' must use http or https for web clients"
        ))),
        (ApplicationType::Native, "http") if loopback => Ok(()),
        (ApplicationType::Native, "http" | "https") => Err(AuthError::invalid_redirect_uri(
            format!("'{uri}' must use a custom scheme or an http loopback address for native clients"),
        )),
        (ApplicationType::Native, _) => Ok(()),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthConfig;
    use crate::registration::statement::tests::statement;
    use crate::types::InitialAccessToken;

    fn service(stores: &IdpStores, config: RegistrationConfig) -> RegistrationService {
        RegistrationService::new(
            stores,
            config,
            OAuthConfig::default().scopes_supported,
            "https://id.example.com/",
        )
    }

    fn web_request() -> ClientRegistrationRequest {
        ClientRegistrationRequest {
            redirect_uris: vec!["https://app.example.com/cb".to_string()],
            client_name: Some("Example".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_register_confidential_client() {
        let stores = IdpStores::in_memory();
        let registration = service(&stores, RegistrationConfig::default());

        let response = registration.register(web_request(), None).await.unwrap();
        let secret = response.client_secret.clone().unwrap();
        let token = response.registration_access_token.clone().unwrap();
        assert_eq!(
            response.registration_client_uri,
            format!("https://id.example.com/register/{}", response.client_id)
        );
        assert_eq!(response.token_endpoint_auth_method, "client_secret_basic");
        assert_eq!(response.client_secret_expires_at, Some(0));

        let stored = stores
            .clients
            .find_by_client_id(&response.client_id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.verify_secret(&secret));
        assert!(stored.verify_registration_token(&token));
        assert_ne!(stored.client_secret_hash.as_deref(), Some(secret.as_str()));
    }

    #[tokio::test]
    async fn test_register_public_client_has_no_secret() {
        let stores = IdpStores::in_memory();
        let registration = service(&stores, RegistrationConfig::default());

        let mut request = web_request();
        request.token_endpoint_auth_method = Some("none".to_string());
        let response = registration.register(request, None).await.unwrap();
        assert!(response.client_secret.is_none());
        assert!(response.registration_access_token.is_some());
    }

    #[tokio::test]
    async fn test_empty_redirect_uris_rejected() {
        let stores = IdpStores::in_memory();
        let registration = service(&stores, RegistrationConfig::default());

        let err = registration
            .register(ClientRegistrationRequest::default(), None)
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_client_metadata");
    }

    #[tokio::test]
    async fn test_metadata_validation() {
        let stores = IdpStores::in_memory();
        let registration = service(&stores, RegistrationConfig::default());

        let mut request = web_request();
        request.response_types = Some(vec!["id_token".to_string()]);
        let err = registration.register(request, None).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_client_metadata");

        let mut request = web_request();
        request.grant_types = Some(vec!["client_credentials".to_string()]);
        let err = registration.register(request, None).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_client_metadata");

        let mut request = web_request();
        request.scope = Some("openid admin".to_string());
        let err = registration.register(request, None).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_client_metadata");

        let mut request = web_request();
        request.redirect_uris = vec!["https://app.example.com/cb#frag".to_string()];
        let err = registration.register(request, None).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_redirect_uri");
    }

    #[tokio::test]
    async fn test_omitted_scope_defaults_to_supported_scopes() {
        let stores = IdpStores::in_memory();
        let registration = service(&stores, RegistrationConfig::default());

        let response = registration.register(web_request(), None).await.unwrap();
        let stored = stores
            .clients
            .find_by_client_id(&response.client_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.scope, OAuthConfig::default().scopes_supported.join(" "));
        assert!(stored.scopes().any(|s| s == "profile"));
    }

    #[test]
    fn test_redirect_uri_rules() {
        use ApplicationType::{Native, Web};

        assert!(validate_redirect_uri("https://app.example.com/cb", Web, false).is_ok());
        assert!(validate_redirect_uri("http://app.example.com/cb", Web, false).is_ok());
        assert!(validate_redirect_uri("http://app.example.com/cb", Web, true).is_err());
        assert!(validate_redirect_uri("https://localhost/cb", Web, true).is_err());
        assert!(validate_redirect_uri("com.example.app:/cb", Web, false).is_err());

        assert!(validate_redirect_uri("com.example.app:/oauth2redirect", Native, false).is_ok());
        assert!(validate_redirect_uri("http://127.0.0.1:8400/cb", Native, false).is_ok());
        assert!(validate_redirect_uri("http://[::1]:8400/cb", Native, false).is_ok());
        assert!(validate_redirect_uri("http://localhost/cb", Native, false).is_ok());
        assert!(validate_redirect_uri("http://app.example.com/cb", Native, false).is_err());
        assert!(validate_redirect_uri("https://localhost/cb", Native, false).is_err());
        assert!(validate_redirect_uri("not a url", Native, false).is_err());
    }

    #[tokio::test]
    async fn test_initial_access_token_is_single_use() {
        let stores = IdpStores::in_memory();
        stores
            .initial_access_tokens
            .create(&InitialAccessToken::new("iat-1", None))
            .await
            .unwrap();
        let registration = service(
            &stores,
            RegistrationConfig {
                require_initial_access_token: true,
                ..Default::default()
            },
        );

        let err = registration.register(web_request(), None).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_token");

        let err = registration
            .register(web_request(), Some("wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_token");

        let response = registration
            .register(web_request(), Some("iat-1"))
            .await
            .unwrap();

        let record = stores
            .initial_access_tokens
            .find_by_hash(&hash_secret("iat-1"))
            .await
            .unwrap()
            .unwrap();
        assert!(record.used);
        assert_eq!(record.used_by.as_deref(), Some(response.client_id.as_str()));

        let err = registration
            .register(web_request(), Some("iat-1"))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_token");
    }

    #[tokio::test]
    async fn test_software_statement() {
        let stores = IdpStores::in_memory();
        let registration = service(
            &stores,
            RegistrationConfig {
                allowed_software_statement_issuers: vec!["https://vendor.example.com".to_string()],
                ..Default::default()
            },
        );

        let mut request = web_request();
        request.software_statement = Some(statement(&serde_json::json!({
            "iss": "https://vendor.example.com",
            "software_id": "vendor-app",
            "client_name": "Vendor App"
        })));
        let response = registration.register(request, None).await.unwrap();
        assert_eq!(response.software_id.as_deref(), Some("vendor-app"));
        assert_eq!(response.client_name.as_deref(), Some("Vendor App"));

        let mut request = web_request();
        request.software_statement = Some(statement(&serde_json::json!({
            "iss": "https://rogue.example.com"
        })));
        let err = registration.register(request, None).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "unapproved_software_statement");

        let mut request = web_request();
        request.software_statement = Some("garbage".to_string());
        let err = registration.register(request, None).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_software_statement");
    }

    #[tokio::test]
    async fn test_client_configuration_endpoint() {
        let stores = IdpStores::in_memory();
        let registration = service(&stores, RegistrationConfig::default());

        let mut request = web_request();
        request.token_endpoint_auth_method = Some("none".to_string());
        let created = registration.register(request, None).await.unwrap();
        let client_id = created.client_id.clone();
        let token = created.registration_access_token.unwrap();

        let read = registration.read(&client_id, &token).await.unwrap();
        assert_eq!(read.client_name.as_deref(), Some("Example"));
        assert!(read.registration_access_token.is_none());

        let err = registration.read(&client_id, "wrong").await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_token");

        // Moving to a confidential method issues a secret.
        let mut update = web_request();
        update.client_name = Some("Renamed".to_string());
        update.token_endpoint_auth_method = Some("client_secret_post".to_string());
        let updated = registration.update(&client_id, &token, update).await.unwrap();
        assert_eq!(updated.client_name.as_deref(), Some("Renamed"));
        assert_eq!(updated.client_id_issued_at, created.client_id_issued_at);
        assert!(updated.client_secret.is_some());

        let mut mismatched = web_request();
        mismatched.client_id = Some("someone-else".to_string());
        assert!(registration.update(&client_id, &token, mismatched).await.is_err());

        registration.delete(&client_id, &token).await.unwrap();
        let err = registration.read(&client_id, &token).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_token");
    }
}
