use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The closed set of background job kinds the runtime dispatches. Named
/// `WorkItemKind` rather than `JobKind` to avoid colliding with the domain
/// `JobPosting` entity, which this runtime has nothing to do with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "work_item_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkItemKind {
    Probe,
    VerificationSweep,
    UsageReset,
    JobExpiry,
    Notify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "work_item_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    DeadLetter,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct WorkItem {
    pub id: i64,
    pub kind: WorkItemKind,
    pub status: WorkItemStatus,
    pub priority: i32,
    pub payload: serde_json::Value,
    pub application_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_after: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}
