//! Credential type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A website credential with its secret already decrypted
///
/// This is also the element type of an export bundle, so the serialized field
/// names are part of the bundle format.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Store-assigned id, never reused after deletion
    pub id: i64,

    /// Site name or URL (plaintext, searchable)
    pub website: String,

    /// Account name (plaintext, searchable)
    pub username: String,

    /// The password; encrypted at rest, plaintext here
    #[serde(rename = "password")]
    pub secret: String,

    /// Category name; not checked against the category vocabulary
    pub category: Option<String>,

    /// Free text, comma-delimited by convention
    pub tags: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field("website", &self.website)
            .field("username", &self.username)
            .field("secret", &"[REDACTED]")
            .field("category", &self.category)
            .field("tags", &self.tags)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Fields for a new credential
#[derive(Clone, Default)]
pub struct NewCredential {
    pub website: String,
    pub username: String,
    pub secret: String,
    pub category: Option<String>,
    pub tags: Option<String>,
}

impl NewCredential {
    pub fn new(website: &str, username: &str, secret: &str) -> Self {
        Self {
            website: website.to_string(),
            username: username.to_string(),
            secret: secret.to_string(),
            category: None,
            tags: None,
        }
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn tags(mut self, tags: &str) -> Self {
        self.tags = Some(tags.to_string());
        self
    }
}

impl From<CredentialRecord> for NewCredential {
    fn from(record: CredentialRecord) -> Self {
        Self {
            website: record.website,
            username: record.username,
            secret: record.secret,
            category: record.category,
            tags: record.tags,
        }
    }
}

/// Partial update: `None` leaves a field unchanged.
///
/// `category` and `tags` are nullable, so `Some(None)` clears them.
#[derive(Clone, Default)]
pub struct CredentialUpdate {
    pub website: Option<String>,
    pub username: Option<String>,
    pub secret: Option<String>,
    pub category: Option<Option<String>>,
    pub tags: Option<Option<String>>,
}

impl CredentialUpdate {
    pub fn website(mut self, website: &str) -> Self {
        self.website = Some(website.to_string());
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn secret(mut self, secret: &str) -> Self {
        self.secret = Some(secret.to_string());
        self
    }

    pub fn category(mut self, category: Option<&str>) -> Self {
        self.category = Some(category.map(str::to_string));
        self
    }

    pub fn tags(mut self, tags: Option<&str>) -> Self {
        self.tags = Some(tags.map(str::to_string));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.website.is_none()
            && self.username.is_none()
            && self.secret.is_none()
            && self.category.is_none()
            && self.tags.is_none()
    }
}
