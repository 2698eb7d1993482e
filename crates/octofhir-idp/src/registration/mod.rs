//! Dynamic client registration.
//!
//! `POST /register` creates a client and returns its credentials once.
//! `GET`, `PUT`, and `DELETE /register/{client_id}` manage the registration
//! and require the registration access token as a bearer credential.

pub mod service;
pub mod statement;
pub mod types;

pub use service::RegistrationService;
pub use statement::SoftwareStatement;
pub use types::{ClientRegistrationRequest, ClientRegistrationResponse};
