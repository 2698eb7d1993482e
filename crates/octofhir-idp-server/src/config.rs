use std::net::SocketAddr;
use std::time::Duration;

use octofhir_idp::config::IdpConfig;
use octofhir_idp::types::{ApplicationType, GrantType, ResponseType, TokenEndpointAuthMethod};
use serde::{Deserialize, Serialize};

/// Process configuration: listener, logging, the provider itself, and the
/// records seeded at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub idp: IdpConfig,
    #[serde(default)]
    pub housekeeping: HousekeepingConfig,
    /// Clients registered at startup.
    #[serde(default)]
    pub clients: Vec<StaticClient>,
    /// End users created at startup.
    #[serde(default)]
    pub users: Vec<StaticUser>,
    /// Initial access tokens accepted by `POST /register`.
    #[serde(default)]
    pub initial_access_tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Periodic removal of expired records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HousekeepingConfig {
    #[serde(default = "default_housekeeping_interval", with = "humantime_serde")]
    pub interval: Duration,
}
fn default_housekeeping_interval() -> Duration {
    Duration::from_secs(5 * 60)
}
impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            interval: default_housekeeping_interval(),
        }
    }
}

/// A client declared in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticClient {
    pub client_id: String,
    /// Plain secret; hashed before it is stored. Omit for public clients.
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    pub redirect_uris: Vec<String>,
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<GrantType>,
    #[serde(default = "default_response_types")]
    pub response_types: Vec<ResponseType>,
    #[serde(default = "default_client_scope")]
    pub scope: String,
    /// Defaults to `client_secret_basic` with a secret, `none` without.
    #[serde(default)]
    pub token_endpoint_auth_method: Option<TokenEndpointAuthMethod>,
    #[serde(default)]
    pub application_type: ApplicationType,
}

fn default_grant_types() -> Vec<GrantType> {
    vec![GrantType::AuthorizationCode, GrantType::RefreshToken]
}
fn default_response_types() -> Vec<ResponseType> {
    vec![ResponseType::Code]
}
fn default_client_scope() -> String {
    "openid profile email offline_access".into()
}

/// An end user declared in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticUser {
    /// Subject identifier. Defaults to the username.
    #[serde(default)]
    pub id: Option<String>,
    pub username: String,
    /// Plain password, or an Argon2 PHC hash stored as is.
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

impl AppConfig {
    pub fn addr(&self) -> SocketAddr {
        let ip = self
            .server
            .host
            .parse()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0]));
        SocketAddr::new(ip, self.server.port)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        if self.housekeeping.interval.is_zero() {
            return Err("housekeeping.interval must be > 0".into());
        }
        self.idp.validate().map_err(|e| format!("idp: {e}"))?;

        for (i, client) in self.clients.iter().enumerate() {
            if client.client_id.is_empty() {
                return Err(format!("clients[{i}].client_id must not be empty"));
            }
            if self.clients[..i]
                .iter()
                .any(|c| c.client_id == client.client_id)
            {
                return Err(format!("duplicate client_id '{}'", client.client_id));
            }
        }

        for (i, user) in self.users.iter().enumerate() {
            if user.username.is_empty() {
                return Err(format!("users[{i}].username must not be empty"));
            }
            if self.users[..i].iter().any(|u| u.username == user.username) {
                return Err(format!("duplicate username '{}'", user.username));
            }
        }

        if self.initial_access_tokens.iter().any(String::is_empty) {
            return Err("initial_access_tokens must not contain empty values".into());
        }

        Ok(())
    }
}

pub mod loader {
    use std::path::PathBuf;

    use config::{Config, Environment, File};

    use super::AppConfig;

    /// Environment prefix for overrides, e.g. `OCTOFHIR_IDP__SERVER__PORT=9090`.
    pub const ENV_PREFIX: &str = "OCTOFHIR_IDP";

    /// Default configuration file name.
    pub const DEFAULT_CONFIG_PATH: &str = "octofhir-idp.toml";

    /// Loads the TOML file at `path` (if it exists), applies environment
    /// overrides, and validates the result.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.addr().port(), 8080);
        assert_eq!(cfg.housekeeping.interval, Duration::from_secs(300));
    }

    #[test]
    fn test_duplicate_seeds_rejected() {
        let client = StaticClient {
            client_id: "app".into(),
            client_secret: Some("s3cret".into()),
            client_name: None,
            redirect_uris: vec!["https://app.example.com/cb".into()],
            grant_types: default_grant_types(),
            response_types: default_response_types(),
            scope: default_client_scope(),
            token_endpoint_auth_method: None,
            application_type: ApplicationType::Web,
        };
        let cfg = AppConfig {
            clients: vec![client.clone(), client],
            ..Default::default()
        };
        assert!(cfg.validate().unwrap_err().contains("duplicate client_id"));
    }

    #[test]
    fn test_invalid_idp_section_rejected() {
        let mut cfg = AppConfig::default();
        cfg.idp.issuer = "not a url".into();
        assert!(cfg.validate().unwrap_err().starts_with("idp:"));
    }
}
