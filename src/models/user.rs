use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// OAuth2 credentials for a connected mailbox, refreshed transparently by
/// the mail gateway on expiry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct MailboxAuth {
    pub provider: String,
    pub address: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A saved username/password for a job-board portal, keyed by the portal's
/// domain so the browser automation client can look one up by target URL.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PortalCredential {
    pub domain: String,
    pub username: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct NotificationPreferences {
    #[serde(default = "default_true")]
    pub email: bool,
}

fn default_true() -> bool {
    true
}

/// A candidate account. Authentication/session issuance is an external
/// collaborator's responsibility; this crate only reads the fields it needs
/// to drive mail access, portal login, and notification delivery.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    pub disabled: bool,
    #[schemars(skip)]
    pub mailbox_auth: Option<Json<MailboxAuth>>,
    #[schemars(skip)]
    pub notification_preferences: Json<NotificationPreferences>,
    #[schemars(skip)]
    pub portal_credentials: Json<Vec<PortalCredential>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    pub fn gmail_connected(&self) -> bool {
        self.mailbox_auth
            .as_ref()
            .map(|auth| !auth.access_token.is_empty())
            .unwrap_or(false)
    }

    /// Entries are append-only (never mutated in place), so a domain can
    /// have more than one if the worker re-registered; the most recently
    /// appended one wins.
    pub fn portal_credential_for(&self, domain: &str) -> Option<&PortalCredential> {
        self.portal_credentials
            .iter()
            .rev()
            .find(|c| c.domain.eq_ignore_ascii_case(domain))
    }
}
