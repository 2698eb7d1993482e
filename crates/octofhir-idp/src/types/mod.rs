//! Domain types shared by the storage traits and services.

pub mod client;
pub mod code;
pub mod consent;
pub mod initial_access_token;
pub mod session;
pub mod signing_key;
pub mod token;
pub mod user;

pub use client::{
    ApplicationType, Client, ClientValidationError, GrantType, ResponseType,
    TokenEndpointAuthMethod,
};
pub use code::AuthorizationCode;
pub use consent::Consent;
pub use initial_access_token::InitialAccessToken;
pub use session::{AuthSession, ConsentDecision, Prompt, UserSession};
pub use signing_key::SigningKey;
pub use token::TokenRecord;
pub use user::{User, UserInfo};
