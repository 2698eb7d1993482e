//! Identity provider error types.
//!
//! Every variant maps onto an OAuth 2.0 / OpenID Connect error code. The
//! infrastructure variants (`Storage`, `Configuration`, `Internal`) all surface
//! as `server_error` and never expose their message to callers.

use std::fmt;

use axum::http::StatusCode;

use crate::config::ConfigError;
use crate::crypto::PkceError;
use crate::types::ClientValidationError;

/// Errors that can occur while serving identity provider requests.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request is missing a parameter or is otherwise malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The client is unknown or failed to authenticate.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    /// The authorization code or refresh token is invalid, expired, or already used.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The authorization server does not support the requested grant type.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type.
        grant_type: String,
    },

    /// The authorization server does not support the requested response type.
    #[error("Unsupported response type: {response_type}")]
    UnsupportedResponseType {
        /// The unsupported response type.
        response_type: String,
    },

    /// The requested scope is invalid, unknown, or malformed.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of why the scope is invalid.
        message: String,
    },

    /// The resource owner denied the request.
    #[error("Access denied: {message}")]
    AccessDenied {
        /// Description of why access was denied.
        message: String,
    },

    /// A bearer token is missing, malformed, expired, or revoked.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// `prompt=none` was requested but the end user must authenticate.
    #[error("Login required")]
    LoginRequired,

    /// `prompt=none` was requested but the end user must consent.
    #[error("Consent required")]
    ConsentRequired,

    /// A redirect URI in a registration request is not acceptable.
    #[error("Invalid redirect URI: {message}")]
    InvalidRedirectUri {
        /// Description of why the redirect URI was rejected.
        message: String,
    },

    /// A client metadata field in a registration request is not acceptable.
    #[error("Invalid client metadata: {message}")]
    InvalidClientMetadata {
        /// Description of why the metadata was rejected.
        message: String,
    },

    /// The software statement is malformed or cannot be read.
    #[error("Invalid software statement: {message}")]
    InvalidSoftwareStatement {
        /// Description of why the statement is invalid.
        message: String,
    },

    /// The software statement was issued by an issuer this server does not trust.
    #[error("Unapproved software statement: {message}")]
    UnapprovedSoftwareStatement {
        /// Description of why the statement was not approved.
        message: String,
    },

    /// An error occurred while storing or retrieving data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `UnsupportedResponseType` error.
    #[must_use]
    pub fn unsupported_response_type(response_type: impl Into<String>) -> Self {
        Self::UnsupportedResponseType {
            response_type: response_type.into(),
        }
    }

    /// Creates a new `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// Creates a new `AccessDenied` error.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRedirectUri` error.
    #[must_use]
    pub fn invalid_redirect_uri(message: impl Into<String>) -> Self {
        Self::InvalidRedirectUri {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClientMetadata` error.
    #[must_use]
    pub fn invalid_client_metadata(message: impl Into<String>) -> Self {
        Self::InvalidClientMetadata {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidSoftwareStatement` error.
    #[must_use]
    pub fn invalid_software_statement(message: impl Into<String>) -> Self {
        Self::InvalidSoftwareStatement {
            message: message.into(),
        }
    }

    /// Creates a new `UnapprovedSoftwareStatement` error.
    #[must_use]
    pub fn unapproved_software_statement(message: impl Into<String>) -> Self {
        Self::UnapprovedSoftwareStatement {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if this error comes from the registration endpoint.
    #[must_use]
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRedirectUri { .. }
                | Self::InvalidClientMetadata { .. }
                | Self::InvalidSoftwareStatement { .. }
                | Self::UnapprovedSoftwareStatement { .. }
        )
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidClient { .. } | Self::InvalidGrant { .. } | Self::LoginRequired => {
                ErrorCategory::Authentication
            }
            Self::InvalidScope { .. } | Self::AccessDenied { .. } | Self::ConsentRequired => {
                ErrorCategory::Authorization
            }
            Self::InvalidToken { .. } => ErrorCategory::Token,
            Self::InvalidRequest { .. }
            | Self::UnsupportedGrantType { .. }
            | Self::UnsupportedResponseType { .. } => ErrorCategory::Validation,
            Self::InvalidRedirectUri { .. }
            | Self::InvalidClientMetadata { .. }
            | Self::InvalidSoftwareStatement { .. }
            | Self::UnapprovedSoftwareStatement { .. } => ErrorCategory::Registration,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::UnsupportedResponseType { .. } => "unsupported_response_type",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::AccessDenied { .. } => "access_denied",
            Self::InvalidToken { .. } => "invalid_token",
            Self::LoginRequired => "login_required",
            Self::ConsentRequired => "consent_required",
            Self::InvalidRedirectUri { .. } => "invalid_redirect_uri",
            Self::InvalidClientMetadata { .. } => "invalid_client_metadata",
            Self::InvalidSoftwareStatement { .. } => "invalid_software_statement",
            Self::UnapprovedSoftwareStatement { .. } => "unapproved_software_statement",
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "server_error"
            }
        }
    }

    /// Returns the HTTP status code for direct (non-redirect) error responses.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidClient { .. } | Self::InvalidToken { .. } => StatusCode::UNAUTHORIZED,
            Self::AccessDenied { .. } => StatusCode::FORBIDDEN,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Returns the human readable description sent to callers.
    ///
    /// Server errors collapse to a fixed string so internal details stay in the logs.
    #[must_use]
    pub fn public_description(&self) -> String {
        match self {
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                "The server encountered an unexpected condition".to_string()
            }
            Self::InvalidRequest { message }
            | Self::InvalidClient { message }
            | Self::InvalidGrant { message }
            | Self::InvalidScope { message }
            | Self::AccessDenied { message }
            | Self::InvalidToken { message }
            | Self::InvalidRedirectUri { message }
            | Self::InvalidClientMetadata { message }
            | Self::InvalidSoftwareStatement { message }
            | Self::UnapprovedSoftwareStatement { message } => message.clone(),
            Self::UnsupportedGrantType { grant_type } => {
                format!("Grant type '{grant_type}' is not supported")
            }
            Self::UnsupportedResponseType { response_type } => {
                format!("Response type '{response_type}' is not supported")
            }
            Self::LoginRequired => "End-user authentication is required".to_string(),
            Self::ConsentRequired => "End-user consent is required".to_string(),
        }
    }
}

impl From<PkceError> for AuthError {
    fn from(err: PkceError) -> Self {
        match err {
            PkceError::VerificationFailed => Self::invalid_grant(err.to_string()),
            _ => Self::invalid_request(err.to_string()),
        }
    }
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

impl From<ClientValidationError> for AuthError {
    fn from(err: ClientValidationError) -> Self {
        Self::invalid_client_metadata(err.to_string())
    }
}

/// Categories of identity provider errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Authentication-related errors (identity verification).
    Authentication,
    /// Authorization-related errors (scope and consent checks).
    Authorization,
    /// Bearer token errors.
    Token,
    /// Request validation errors.
    Validation,
    /// Dynamic client registration errors.
    Registration,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Token => write!(f, "token"),
            Self::Validation => write!(f, "validation"),
            Self::Registration => write!(f, "registration"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
