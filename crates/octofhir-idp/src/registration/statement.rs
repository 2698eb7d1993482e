//! Software statements (RFC 7591 section 2.3).
//!
//! The statement is a JWT whose claims assert client metadata. Only the
//! issuer is checked against the configured allow list; the signature is not
//! verified, so trust rests entirely on that list.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::AuthResult;
use crate::error::AuthError;

/// Metadata claims a software statement may carry.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SoftwareStatement {
    pub iss: String,

    #[serde(default)]
    pub software_id: Option<String>,

    #[serde(default)]
    pub software_version: Option<String>,

    #[serde(default)]
    pub client_name: Option<String>,
}

impl SoftwareStatement {
    /// Decodes the statement payload without verifying its signature.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSoftwareStatement` if the value is not a three-part JWT
    /// with a JSON payload carrying a non-empty `iss`.
    pub fn decode_unverified(statement: &str) -> AuthResult<Self> {
        let parts: Vec<&str> = statement.split('.').collect();
        if parts.len() != 3 {
            return Err(AuthError::invalid_software_statement(
                "software_statement is not a JWT",
            ));
        }

        let payload = URL_SAFE_NO_PAD.decode(parts[1]).map_err(|_| {
            AuthError::invalid_software_statement("Invalid software_statement payload encoding")
        })?;

        let claims: Self = serde_json::from_slice(&payload).map_err(|_| {
            AuthError::invalid_software_statement("Invalid software_statement payload")
        })?;

        if claims.iss.is_empty() {
            return Err(AuthError::invalid_software_statement(
                "software_statement has no issuer",
            ));
        }

        Ok(claims)
    }

    /// Decodes a statement and checks its issuer against `allowed_issuers`.
    ///
    /// # Errors
    ///
    /// - `InvalidSoftwareStatement` if the statement is malformed
    /// - `UnapprovedSoftwareStatement` if the issuer is not trusted
    pub fn approve(statement: &str, allowed_issuers: &[String]) -> AuthResult<Self> {
        let claims = Self::decode_unverified(statement)?;

        if !allowed_issuers.iter().any(|issuer| *issuer == claims.iss) {
            tracing::warn!(issuer = %claims.iss, "Software statement from untrusted issuer");
            return Err(AuthError::unapproved_software_statement(format!(
                "Issuer '{}' is not approved",
                claims.iss
            )));
        }

        Ok(claims)
    }
}
