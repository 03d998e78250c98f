use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// A job posting, the target of an application. Distinct from the
/// background-runtime work item (`models::work_item::WorkItem`), which is a
/// different concept that happens to share the English word "job".
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct JobPosting {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub company: String,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub arrangement: Option<String>,
    pub level: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub salary_currency: Option<String>,
    pub salary_period: Option<String>,
    pub salary_negotiable: bool,
    #[schemars(skip)]
    pub skills_required: Json<Vec<String>>,
    #[schemars(skip)]
    pub skills_preferred: Json<Vec<String>>,
    #[schemars(skip)]
    pub requirements: Json<Vec<String>>,
    pub application_email: Option<String>,
    pub application_url: Option<String>,
    pub source: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobPosting {
    /// A posting's site is a "known login-wall source" when its listing
    /// domain is RemoteOK, which gates account creation behind a login.
    pub fn is_login_wall_source(&self) -> bool {
        self.source.eq_ignore_ascii_case("remoteok")
    }

    pub fn domain(&self) -> Option<String> {
        let url = self.application_url.as_ref()?;
        crate::router::extract_domain(url)
    }
}
