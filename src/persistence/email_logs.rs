use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "email_log_direction", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmailLogDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "email_log_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmailLogStatus {
    Sent,
    Received,
    Failed,
    Draft,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct EmailLog {
    pub id: Uuid,
    pub direction: EmailLogDirection,
    pub status: EmailLogStatus,
    pub user_id: Uuid,
    pub application_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub provider_message_id: Option<String>,
    pub thread_id: Option<String>,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub subject: Option<String>,
    pub snippet: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub struct EmailLogsRepo {
    pool: PgPool,
}

impl EmailLogsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        direction: EmailLogDirection,
        status: EmailLogStatus,
        user_id: Uuid,
        application_id: Option<Uuid>,
        job_id: Option<Uuid>,
        provider_message_id: Option<&str>,
        thread_id: Option<&str>,
        sender: Option<&str>,
        recipient: Option<&str>,
        subject: Option<&str>,
        snippet: Option<&str>,
    ) -> Result<EmailLog, sqlx::Error> {
        sqlx::query_as::<_, EmailLog>(
            "INSERT INTO email_logs \
             (direction, status, user_id, application_id, job_id, provider_message_id, \
              thread_id, sender, recipient, subject, snippet) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING *",
        )
        .bind(direction)
        .bind(status)
        .bind(user_id)
        .bind(application_id)
        .bind(job_id)
        .bind(provider_message_id)
        .bind(thread_id)
        .bind(sender)
        .bind(recipient)
        .bind(subject)
        .bind(snippet)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn list_for_application(&self, application_id: Uuid) -> Result<Vec<EmailLog>, sqlx::Error> {
        sqlx::query_as::<_, EmailLog>(
            "SELECT * FROM email_logs WHERE application_id = $1 ORDER BY sent_at DESC",
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await
    }
}
