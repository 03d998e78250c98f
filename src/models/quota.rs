use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// Kinds of metered activity the quota subsystem tracks. Each maps to one
/// counter on `Plan`/`Subscription.current_usage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UsageEventType {
    ManualApplication,
    AutoApplication,
    CvGeneration,
    CoverLetter,
}

impl UsageEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            UsageEventType::ManualApplication => "manual_application",
            UsageEventType::AutoApplication => "auto_application",
            UsageEventType::CvGeneration => "cv_generation",
            UsageEventType::CoverLetter => "cover_letter",
        }
    }
}

/// The counters and feature flags attached to a plan tier. Numbers are
/// carried over verbatim from the original subscription service's plan
/// table; 9999 stands in for "effectively unlimited".
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub monthly_manual_applications: i64,
    pub monthly_auto_applications: i64,
    pub monthly_cv_generations: i64,
    pub monthly_cover_letters: i64,
    pub concurrent_applications: i64,
    pub advanced_analytics: bool,
    pub priority_support: bool,
    pub export_formats: Vec<String>,
    pub ai_model_version: String,
}

/// A user's active subscription: which plan, and how much of this period's
/// allowance has been consumed.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: String,
    pub status: String,
    pub billing_interval: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    #[schemars(skip)]
    pub current_usage: Json<UsageCounters>,
    pub usage_reset_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
pub struct UsageCounters {
    #[serde(default)]
    pub manual_application: i64,
    #[serde(default)]
    pub auto_application: i64,
    #[serde(default)]
    pub cv_generation: i64,
    #[serde(default)]
    pub cover_letter: i64,
}

impl UsageCounters {
    pub fn get(&self, event: UsageEventType) -> i64 {
        match event {
            UsageEventType::ManualApplication => self.manual_application,
            UsageEventType::AutoApplication => self.auto_application,
            UsageEventType::CvGeneration => self.cv_generation,
            UsageEventType::CoverLetter => self.cover_letter,
        }
    }
}
