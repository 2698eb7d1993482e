//! End users.

use serde::{Deserialize, Serialize};

/// An end user who can log in at the provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable subject identifier (`sub`).
    pub id: String,

    /// Login name.
    pub username: String,

    /// Argon2 PHC hash.
    pub password_hash: String,

    /// Full name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Given name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    /// Family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    /// Profile picture URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    /// E-mail address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the e-mail address has been verified.
    #[serde(default)]
    pub email_verified: bool,
}

impl User {
    /// Claims about this user released for the granted scope.
    ///
    /// `profile` releases the name and picture claims, `email` the e-mail claims.
    #[must_use]
    pub fn claims_for_scope(&self, scope: &str) -> UserInfo {
        let mut info = UserInfo {
            sub: self.id.clone(),
            ..Default::default()
        };

        for granted in scope.split_whitespace() {
            match granted {
                "profile" => {
                    info.name.clone_from(&self.name);
                    info.given_name.clone_from(&self.given_name);
                    info.family_name.clone_from(&self.family_name);
                    info.picture.clone_from(&self.picture);
                }
                "email" => {
                    info.email.clone_from(&self.email);
                    info.email_verified = self.email.as_ref().map(|_| self.email_verified);
                }
                _ => {}
            }
        }

        info
    }
}

/// Standard claims returned by the userinfo endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            id: "u-1".to_string(),
            username: "alice".to_string(),
            password_hash: "$argon2id$...".to_string(),
            name: Some("Alice Liddell".to_string()),
            given_name: Some("Alice".to_string()),
            family_name: Some("Liddell".to_string()),
            picture: None,
            email: Some("alice@example.com".to_string()),
            email_verified: true,
        }
    }

    #[test]
    fn test_openid_only_releases_sub() {
        let info = alice().claims_for_scope("openid");
        assert_eq!(info.sub, "u-1");
        assert!(info.name.is_none());
        assert!(info.email.is_none());
    }

    #[test]
    fn test_profile_and_email_scopes() {
        let info = alice().claims_for_scope("openid profile");
        assert_eq!(info.name.as_deref(), Some("Alice Liddell"));
        assert!(info.email.is_none());

        let info = alice().claims_for_scope("openid email");
        assert!(info.name.is_none());
        assert_eq!(info.email.as_deref(), Some("alice@example.com"));
        assert_eq!(info.email_verified, Some(true));
    }

    #[test]
    fn test_debug_redacts_password_hash() {
        let rendered = format!("{:?}", alice());
        assert!(!rendered.contains("argon2"));
    }
}
