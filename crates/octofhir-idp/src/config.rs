//! Identity provider configuration.
//!
//! All sections deserialize with defaults so a minimal TOML file only needs
//! the `issuer`. Durations use humantime notation (`"10m"`, `"30d"`).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root identity provider configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [idp]
/// issuer = "https://id.example.com"
///
/// [idp.oauth]
/// access_token_lifetime = "1h"
///
/// [idp.signing]
/// rotation_grace_period = "30d"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdpConfig {
    /// Issuer identifier (`iss` claim, discovery `issuer`).
    /// Endpoint URLs are derived from it.
    pub issuer: String,

    /// Protocol lifetimes and supported scopes.
    pub oauth: OAuthConfig,

    /// Token signing and key rotation.
    pub signing: SigningConfig,

    /// Dynamic client registration.
    pub registration: RegistrationConfig,

    /// Browser session cookie.
    pub cookies: CookieConfig,
}

impl Default for IdpConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            oauth: OAuthConfig::default(),
            signing: SigningConfig::default(),
            registration: RegistrationConfig::default(),
            cookies: CookieConfig::default(),
        }
    }
}

/// OAuth 2.0 / OpenID Connect protocol settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Authorization code lifetime.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// ID token lifetime.
    #[serde(with = "humantime_serde")]
    pub id_token_lifetime: Duration,

    /// How long an in-flight authorization request may wait for login/consent.
    #[serde(with = "humantime_serde")]
    pub auth_session_lifetime: Duration,

    /// Lifetime of an authenticated browser session.
    #[serde(with = "humantime_serde")]
    pub user_session_lifetime: Duration,

    /// Scopes advertised in discovery and accepted at the authorization endpoint.
    pub scopes_supported: Vec<String>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authorization_code_lifetime: Duration::from_secs(600), // 10 minutes
            access_token_lifetime: Duration::from_secs(3600),      // 60 minutes
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600),
            id_token_lifetime: Duration::from_secs(3600),
            auth_session_lifetime: Duration::from_secs(600),
            user_session_lifetime: Duration::from_secs(24 * 3600),
            scopes_supported: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
                "offline_access".to_string(),
            ],
        }
    }
}

/// Token signing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// RSA modulus size for generated keys.
    pub key_size_bits: usize,

    /// How long a rotated-out key stays valid for verification.
    #[serde(with = "humantime_serde")]
    pub rotation_grace_period: Duration,

    /// Rotate the signing key on this cadence. `None` disables scheduled rotation.
    #[serde(default, with = "humantime_serde")]
    pub rotation_interval: Option<Duration>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            key_size_bits: 2048,
            rotation_grace_period: Duration::from_secs(30 * 24 * 3600), // 30 days
            rotation_interval: None,
        }
    }
}

/// Dynamic client registration settings (RFC 7591).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Expose `POST /register`.
    pub enabled: bool,

    /// Require a single-use initial access token on every registration call.
    pub require_initial_access_token: bool,

    /// Issuers whose software statements are accepted.
    pub allowed_software_statement_issuers: Vec<String>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            require_initial_access_token: false,
            allowed_software_statement_issuers: Vec::new(),
        }
    }
}

/// Browser session cookie settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Set the `Secure` attribute. Disable only for plain-HTTP development.
    pub secure: bool,

    /// Name of the cookie carrying the user session id.
    pub session_cookie_name: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: true,
            session_cookie_name: "idp_session".to_string(),
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl IdpConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The issuer is empty, not an absolute URL, or carries a query/fragment
    /// - Any lifetime is zero
    /// - The key size is below 1024 bits
    /// - `openid` is missing from the supported scopes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::Missing("issuer".to_string()));
        }

        let issuer = url::Url::parse(&self.issuer)
            .map_err(|e| ConfigError::InvalidValue(format!("issuer is not a URL: {e}")))?;
        if issuer.query().is_some() || issuer.fragment().is_some() {
            return Err(ConfigError::InvalidValue(
                "issuer must not contain a query or fragment".to_string(),
            ));
        }

        let lifetimes = [
            ("authorization_code_lifetime", self.oauth.authorization_code_lifetime),
            ("access_token_lifetime", self.oauth.access_token_lifetime),
            ("refresh_token_lifetime", self.oauth.refresh_token_lifetime),
            ("id_token_lifetime", self.oauth.id_token_lifetime),
            ("auth_session_lifetime", self.oauth.auth_session_lifetime),
            ("user_session_lifetime", self.oauth.user_session_lifetime),
        ];
        for (name, value) in lifetimes {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue(format!("{name} must be > 0")));
            }
        }

        if !self.oauth.scopes_supported.iter().any(|s| s == "openid") {
            return Err(ConfigError::InvalidValue(
                "scopes_supported must include 'openid'".to_string(),
            ));
        }

        if self.signing.key_size_bits < 1024 {
            return Err(ConfigError::InvalidValue(format!(
                "key_size_bits must be >= 1024, got {}",
                self.signing.key_size_bits
            )));
        }

        if matches!(self.signing.rotation_interval, Some(d) if d.is_zero()) {
            return Err(ConfigError::InvalidValue(
                "rotation_interval must be > 0 when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Issuer without a trailing slash, used as the base for endpoint URLs.
    #[must_use]
    pub fn issuer_base(&self) -> &str {
        self.issuer.trim_end_matches('/')
    }

    /// Builds an absolute endpoint URL below the issuer.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.issuer_base(), path)
    }
}

/// Converts a configured duration to a `time::Duration`, saturating on overflow.
#[must_use]
pub fn to_time_duration(value: Duration) -> time::Duration {
    time::Duration::try_from(value).unwrap_or(time::Duration::MAX)
}
