//! # octofhir-idp
//!
//! OpenID Connect provider engine.
//!
//! This crate provides:
//! - Authorization code, implicit, and PKCE-protected flows
//! - Browser login and consent tracking
//! - Token issuance with one-time codes and rotating refresh tokens
//! - RS256 signing with live key rotation and a grace period for retired keys
//! - Dynamic client registration (RFC 7591, RFC 7592)
//! - Token revocation (RFC 7009) and introspection (RFC 7662)
//!
//! ## Modules
//!
//! - [`config`] - Provider configuration
//! - [`crypto`] - Hashing, PKCE, password verification, random values
//! - [`types`] - Clients, codes, sessions, consents, keys, tokens, users
//! - [`storage`] - Storage traits and the in-memory backend
//! - [`token`] - JWT signing, key rotation, and the token issuance engine
//! - [`session`] - Authorization sessions, browser sessions, and consent
//! - [`oauth`] - The authorization flow controller and client authentication
//! - [`registration`] - Dynamic client registration
//! - [`http`] - Axum HTTP handlers

pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod oauth;
pub mod registration;
pub mod session;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{ConfigError, IdpConfig};
pub use error::{AuthError, ErrorCategory};
pub use http::{IdpState, router};
pub use storage::{IdpStores, InMemoryStorage};

/// Type alias for identity provider results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use octofhir_idp::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{
        ConfigError, CookieConfig, IdpConfig, OAuthConfig, RegistrationConfig, SigningConfig,
    };
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::http::{IdpState, router};
    pub use crate::oauth::{AuthorizationRequest, AuthorizationService, AuthorizeOutcome};
    pub use crate::registration::RegistrationService;
    pub use crate::storage::{
        AuthSessionStorage, AuthorizationCodeStorage, ClientStorage, ConsentStorage, IdpStores,
        InMemoryStorage, InitialAccessTokenStorage, SigningKeyStorage, TokenStorage,
        UserSessionStorage, UserStorage,
    };
    pub use crate::token::{KeyManager, TokenService};
    pub use crate::types::{
        ApplicationType, Client, GrantType, InitialAccessToken, ResponseType,
        TokenEndpointAuthMethod, User,
    };
}
