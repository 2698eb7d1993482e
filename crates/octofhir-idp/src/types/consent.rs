//! Stored consent grants.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Scopes an end user has approved for a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consent {
    /// End user who granted consent.
    pub user_id: String,

    /// Client the consent applies to.
    pub client_id: String,

    /// Approved scopes.
    pub scopes: Vec<String>,

    /// When consent was first granted.
    #[serde(with = "time::serde::rfc3339")]
    pub granted_at: OffsetDateTime,

    /// When the scope set last changed.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Consent {
    /// Creates a consent record for the given scopes.
    #[must_use]
    pub fn new(user_id: impl Into<String>, client_id: impl Into<String>, scopes: &[&str]) -> Self {
        let now = OffsetDateTime::now_utc();
        let mut consent = Self {
            user_id: user_id.into(),
            client_id: client_id.into(),
            scopes: Vec::new(),
            granted_at: now,
            updated_at: now,
        };
        consent.extend(scopes);
        consent
    }

    /// Returns `true` if every requested scope is already approved.
    #[must_use]
    pub fn covers(&self, requested: &[&str]) -> bool {
        requested
            .iter()
            .all(|scope| self.scopes.iter().any(|granted| granted == scope))
    }

    /// Adds scopes to the approved set, keeping it sorted and unique.
    pub fn extend(&mut self, scopes: &[&str]) {
        self.scopes.extend(scopes.iter().map(|s| (*s).to_string()));
        self.scopes.sort();
        self.scopes.dedup();
        self.updated_at = OffsetDateTime::now_utc();
    }
}
