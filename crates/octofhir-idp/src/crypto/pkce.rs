//! PKCE (Proof Key for Code Exchange, RFC 7636).
//!
//! Both `plain` and `S256` are accepted. A challenge sent without a method is
//! treated as `plain`, as RFC 7636 section 4.3 requires.
//!
//! ```
//! use octofhir_idp::crypto::pkce::{PkceMethod, s256_challenge, verify_pkce};
//!
//! let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
//! let challenge = s256_challenge(verifier);
//! assert!(verify_pkce(&challenge, PkceMethod::S256, verifier).is_ok());
//! ```

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::constant_time_eq;

/// Errors that can occur during PKCE operations.
#[derive(Debug, thiserror::Error)]
pub enum PkceError {
    /// Verifier length is outside the valid range (43-128 characters).
    #[error("Invalid code_verifier length: must be 43-128 characters, got {0}")]
    InvalidVerifierLength(usize),

    /// Verifier contains characters outside `[A-Za-z0-9-._~]`.
    #[error("Invalid code_verifier characters")]
    InvalidVerifierCharacters,

    /// Challenge method is neither `plain` nor `S256`.
    #[error("Unsupported code_challenge_method: {0}")]
    UnsupportedMethod(String),

    /// Verifier does not match the stored challenge.
    #[error("PKCE verification failed")]
    VerificationFailed,
}

impl PkceError {
    /// Get the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidVerifierLength(_)
            | Self::InvalidVerifierCharacters
            | Self::UnsupportedMethod(_) => "invalid_request",
            Self::VerificationFailed => "invalid_grant",
        }
    }
}

/// PKCE code challenge method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PkceMethod {
    /// The challenge is the verifier itself.
    #[default]
    #[serde(rename = "plain")]
    Plain,
    /// `BASE64URL(SHA256(ASCII(code_verifier)))`.
    S256,
}

impl PkceMethod {
    /// Get the method as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }
}

impl FromStr for PkceMethod {
    type Err = PkceError;

    fn from_str(method: &str) -> Result<Self, Self::Err> {
        match method {
            "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(PkceError::UnsupportedMethod(other.to_string())),
        }
    }
}

impl fmt::Display for PkceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks the RFC 7636 verifier syntax.
///
/// # Errors
///
/// Returns an error if the verifier is not 43-128 unreserved characters.
pub fn validate_verifier(verifier: &str) -> Result<(), PkceError> {
    let len = verifier.len();
    if !(43..=128).contains(&len) {
        return Err(PkceError::InvalidVerifierLength(len));
    }

    if !verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
    {
        return Err(PkceError::InvalidVerifierCharacters);
    }

    Ok(())
}

/// Computes the S256 challenge for a verifier.
#[must_use]
pub fn s256_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Verifies a `code_verifier` against a stored challenge.
///
/// The comparison is constant time for both methods.
///
/// # Errors
///
/// Returns `InvalidVerifier*` for malformed verifiers and
/// `VerificationFailed` when the verifier does not match.
pub fn verify_pkce(challenge: &str, method: PkceMethod, verifier: &str) -> Result<(), PkceError> {
    validate_verifier(verifier)?;

    let matches = match method {
        PkceMethod::Plain => constant_time_eq(verifier.as_bytes(), challenge.as_bytes()),
        PkceMethod::S256 => {
            constant_time_eq(s256_challenge(verifier).as_bytes(), challenge.as_bytes())
        }
    };

    if matches {
        Ok(())
    } else {
        Err(PkceError::VerificationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::random::generate_token;

    const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    #[test]
    fn test_rfc7636_appendix_b_vector() {
        assert_eq!(s256_challenge(RFC_VERIFIER), RFC_CHALLENGE);
        assert!(verify_pkce(RFC_CHALLENGE, PkceMethod::S256, RFC_VERIFIER).is_ok());
    }

    #[test]
    fn test_s256_accepts_only_matching_verifier() {
        for _ in 0..50 {
            let verifier = generate_token();
            let other = generate_token();
            let challenge = s256_challenge(&verifier);

            assert!(verify_pkce(&challenge, PkceMethod::S256, &verifier).is_ok());
            assert!(matches!(
                verify_pkce(&challenge, PkceMethod::S256, &other),
                Err(PkceError::VerificationFailed)
            ));
        }
    }

    #[test]
    fn test_plain_is_direct_equality() {
        let verifier = "a".repeat(43);
        assert!(verify_pkce(&verifier, PkceMethod::Plain, &verifier).is_ok());
        assert!(verify_pkce(&"b".repeat(43), PkceMethod::Plain, &verifier).is_err());
    }

    #[test]
    fn test_s256_challenge_does_not_verify_as_plain() {
        let challenge = s256_challenge(RFC_VERIFIER);
        assert!(verify_pkce(&challenge, PkceMethod::Plain, RFC_VERIFIER).is_err());
    }

    #[test]
    fn test_verifier_length_bounds() {
        assert!(matches!(
            validate_verifier(&"a".repeat(42)),
            Err(PkceError::InvalidVerifierLength(42))
        ));
        assert!(validate_verifier(&"a".repeat(43)).is_ok());
        assert!(validate_verifier(&"a".repeat(128)).is_ok());
        assert!(validate_verifier(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_verifier_characters() {
        let valid = format!("{}-._~", "a".repeat(40));
        assert!(validate_verifier(&valid).is_ok());

        let invalid = format!("{}+/=", "a".repeat(40));
        assert!(matches!(
            validate_verifier(&invalid),
            Err(PkceError::InvalidVerifierCharacters)
        ));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("S256".parse::<PkceMethod>().unwrap(), PkceMethod::S256);
        assert_eq!("plain".parse::<PkceMethod>().unwrap(), PkceMethod::Plain);
        assert!("s256".parse::<PkceMethod>().is_err());
        assert_eq!(PkceMethod::default(), PkceMethod::Plain);
    }

    #[test]
    fn test_method_serde() {
        assert_eq!(
            serde_json::to_string(&PkceMethod::S256).unwrap(),
            "\"S256\""
        );
        assert_eq!(
            serde_json::to_string(&PkceMethod::Plain).unwrap(),
            "\"plain\""
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            PkceError::VerificationFailed.oauth_error_code(),
            "invalid_grant"
        );
        assert_eq!(
            PkceError::InvalidVerifierLength(3).oauth_error_code(),
            "invalid_request"
        );
    }
}
