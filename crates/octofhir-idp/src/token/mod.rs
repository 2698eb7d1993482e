//! Token signing, key rotation, and token issuance.
//!
//! - [`jwt`] - claims, JWK export, RSA key parsing
//! - [`keys`] - stored signing keys, rotation with a verification grace period
//! - [`service`] - the token endpoint grants and implicit-flow minting
//! - [`lifecycle`] - revocation and introspection types

pub mod jwt;
pub mod keys;
pub mod lifecycle;
pub mod service;

pub use jwt::{AccessTokenClaims, IdTokenClaims, Jwk, Jwks, JwtError};
pub use keys::KeyManager;
pub use lifecycle::{IntrospectionResponse, TokenLifecycleRequest, TokenTypeHint};
pub use service::{ImplicitTokens, IssueContext, TokenService};
