//! Loads the clients, users, and initial access tokens declared in the
//! configuration file into storage.

use anyhow::{Context, anyhow};
use octofhir_idp::IdpStores;
use octofhir_idp::crypto::hash_secret;
use octofhir_idp::crypto::password::{hash_password, is_password_hash};
use octofhir_idp::types::{Client, InitialAccessToken, TokenEndpointAuthMethod, User};

use crate::config::{AppConfig, StaticClient, StaticUser};

/// Counts of seeded records, for the startup log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub clients: usize,
    pub users: usize,
    pub initial_access_tokens: usize,
}

/// Writes every static record from `cfg` into `stores`.
///
/// Clients that already exist are replaced so restarts against a shared
/// backend pick up edited entries.
pub async fn seed(stores: &IdpStores, cfg: &AppConfig) -> anyhow::Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for entry in &cfg.clients {
        let client = client_from_config(entry)?;
        let existing = stores.clients.find_by_client_id(&client.client_id).await?;
        if existing.is_some() {
            stores.clients.update(&client).await?;
        } else {
            stores.clients.create(&client).await?;
        }
        tracing::debug!(client_id = %client.client_id, "seeded client");
        summary.clients += 1;
    }

    for entry in &cfg.users {
        let user = user_from_config(entry)?;
        if stores.users.find_by_username(&user.username).await?.is_some() {
            tracing::debug!(username = %user.username, "user already present, skipping");
            continue;
        }
        stores.users.create(&user).await?;
        summary.users += 1;
    }

    for token in &cfg.initial_access_tokens {
        stores
            .initial_access_tokens
            .create(&InitialAccessToken::new(token, None))
            .await?;
        summary.initial_access_tokens += 1;
    }

    Ok(summary)
}

/// Builds a validated client, hashing its secret.
pub fn client_from_config(entry: &StaticClient) -> anyhow::Result<Client> {
    let mut client = Client::new(entry.client_id.clone(), entry.redirect_uris.clone());
    client.client_secret_hash = entry.client_secret.as_deref().map(hash_secret);
    client.client_name = entry.client_name.clone();
    client.grant_types = entry.grant_types.clone();
    client.response_types = entry.response_types.clone();
    client.scope = entry.scope.clone();
    client.application_type = entry.application_type;
    client.token_endpoint_auth_method = entry.token_endpoint_auth_method.unwrap_or(
        if entry.client_secret.is_some() {
            TokenEndpointAuthMethod::ClientSecretBasic
        } else {
            TokenEndpointAuthMethod::None
        },
    );

    client
        .validate()
        .with_context(|| format!("client '{}'", entry.client_id))?;
    Ok(client)
}

/// Builds a user, hashing a plain password. PHC hashes are kept as given.
pub fn user_from_config(entry: &StaticUser) -> anyhow::Result<User> {
    let password_hash = if is_password_hash(&entry.password) {
        entry.password.clone()
    } else {
        hash_password(&entry.password)
            .map_err(|e| anyhow!("hashing password for user '{}': {e}", entry.username))?
    };

    Ok(User {
        id: entry.id.clone().unwrap_or_else(|| entry.username.clone()),
        username: entry.username.clone(),
        password_hash,
        name: entry.name.clone(),
        given_name: entry.given_name.clone(),
        family_name: entry.family_name.clone(),
        picture: entry.picture.clone(),
        email: entry.email.clone(),
        email_verified: entry.email_verified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use octofhir_idp::crypto::password::verify_password;
    use octofhir_idp::types::{ApplicationType, GrantType, ResponseType};

    fn static_client(secret: Option<&str>) -> StaticClient {
        StaticClient {
            client_id: "app".into(),
            client_secret: secret.map(str::to_string),
            client_name: Some("App".into()),
            redirect_uris: vec!["https://app.example.com/cb".into()],
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            response_types: vec![ResponseType::Code],
            scope: "openid profile".into(),
            token_endpoint_auth_method: None,
            application_type: ApplicationType::Web,
        }
    }

    fn static_user(password: &str) -> StaticUser {
        StaticUser {
            id: None,
            username: "alice".into(),
            password: password.into(),
            name: Some("Alice".into()),
            given_name: None,
            family_name: None,
            picture: None,
            email: Some("alice@example.com".into()),
            email_verified: true,
        }
    }

    #[test]
    fn test_auth_method_follows_secret() {
        let confidential = client_from_config(&static_client(Some("s3cret"))).unwrap();
        assert_eq!(
            confidential.token_endpoint_auth_method,
            TokenEndpointAuthMethod::ClientSecretBasic
        );
        assert!(confidential.verify_secret("s3cret"));

        let public = client_from_config(&static_client(None)).unwrap();
        assert_eq!(public.token_endpoint_auth_method, TokenEndpointAuthMethod::None);
        assert!(public.client_secret_hash.is_none());
    }

    #[test]
    fn test_invalid_client_names_entry() {
        let mut entry = static_client(Some("s3cret"));
        entry.redirect_uris.clear();
        let err = client_from_config(&entry).unwrap_err();
        assert!(format!("{err:#}").contains("client 'app'"));
    }

    #[test]
    fn test_user_password_hashed_or_kept() {
        let user = user_from_config(&static_user("wonderland")).unwrap();
        assert_eq!(user.id, "alice");
        assert!(verify_password("wonderland", &user.password_hash));

        let prehashed = user_from_config(&static_user(&user.password_hash)).unwrap();
        assert_eq!(prehashed.password_hash, user.password_hash);
    }

    #[tokio::test]
    async fn test_seed_is_idempotent_for_users() {
        let stores = IdpStores::in_memory();
        let cfg = AppConfig {
            clients: vec![static_client(Some("s3cret"))],
            users: vec![static_user("wonderland")],
            initial_access_tokens: vec!["iat-1".into()],
            ..Default::default()
        };

        let first = seed(&stores, &cfg).await.unwrap();
        assert_eq!(
            first,
            SeedSummary {
                clients: 1,
                users: 1,
                initial_access_tokens: 1
            }
        );

        let reseed = AppConfig {
            initial_access_tokens: vec![],
            ..cfg
        };
        let second = seed(&stores, &reseed).await.unwrap();
        assert_eq!(second.clients, 1);
        assert_eq!(second.users, 0);
        assert!(stores.clients.find_by_client_id("app").await.unwrap().is_some());
    }
}
