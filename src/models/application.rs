use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// The closed set of states an application can be in. Matches the original
/// system's `ApplicationStatus` enum exactly, including the automation-only
/// states (`processing`, `needs_authentication`, `pending_verification`,
/// `manual_action_required`) that a human never sets directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Pending,
    Submitted,
    Applied,
    UnderReview,
    InterviewScheduled,
    InterviewCompleted,
    SecondRound,
    FinalRound,
    OfferReceived,
    OfferAccepted,
    OfferDeclined,
    Rejected,
    Withdrawn,
    OnHold,
    Archived,
    NeedsAuthentication,
    ManualActionRequired,
    PendingVerification,
    Processing,
}

/// The glossary's "core response set": statuses that themselves imply a
/// reply was received, independent of whether a `Communication` row exists
/// for it (a portal-sourced status change never produces one).
pub const CORE_RESPONSE_SET: &[ApplicationStatus] = &[
    ApplicationStatus::InterviewScheduled,
    ApplicationStatus::InterviewCompleted,
    ApplicationStatus::SecondRound,
    ApplicationStatus::FinalRound,
    ApplicationStatus::OfferReceived,
    ApplicationStatus::OfferAccepted,
    ApplicationStatus::OfferDeclined,
    ApplicationStatus::Rejected,
];

impl ApplicationStatus {
    /// Terminal states never transition out once reached.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::OfferAccepted
                | ApplicationStatus::OfferDeclined
                | ApplicationStatus::Rejected
                | ApplicationStatus::Withdrawn
                | ApplicationStatus::Archived
        )
    }

    /// Whether this status is in the glossary's core response set.
    pub fn is_core_response(self) -> bool {
        CORE_RESPONSE_SET.contains(&self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "application_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationSource {
    Manual,
    Platform,
    AutoApply,
    BrowserAutomation,
    Referral,
    Direct,
    Recruiter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "application_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// A generated or uploaded artifact attached to an application (tailored CV,
/// cover letter, or a user-supplied document).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Document {
    pub id: Uuid,
    pub kind: DocumentKind,
    pub filename: String,
    /// Base64-encoded file contents, or plain text for generated cover letters.
    pub content: String,
    pub content_type: String,
    pub fit_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Resume,
    CoverLetter,
    Other,
}

/// One inbound or outbound message associated with an application's thread.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Communication {
    pub id: Uuid,
    pub direction: CommunicationDirection,
    pub channel: String,
    pub subject: Option<String>,
    pub snippet: Option<String>,
    pub provider_message_id: Option<String>,
    pub category: Option<String>,
    pub confidence: Option<f64>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Interview {
    pub id: Uuid,
    pub interview_type: String,
    pub round: i32,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApplicationTask {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// An append-only record of a status change or other notable event,
/// written atomically with whatever column mutation triggered it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TimelineEvent {
    pub id: Uuid,
    pub event_type: String,
    pub description: String,
    pub previous_status: Option<ApplicationStatus>,
    pub new_status: Option<ApplicationStatus>,
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl TimelineEvent {
    pub fn status_change(
        previous: ApplicationStatus,
        new: ApplicationStatus,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: "status_change".to_string(),
            description: description.into(),
            previous_status: Some(previous),
            new_status: Some(new),
            metadata: serde_json::json!({}),
            occurred_at: Utc::now(),
        }
    }

    pub fn note(event_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            description: description.into(),
            previous_status: None,
            new_status: None,
            metadata: serde_json::json!({}),
            occurred_at: Utc::now(),
        }
    }
}

/// A single job application, the central aggregate of the engine.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub status: ApplicationStatus,
    pub source: ApplicationSource,
    pub job_title: String,
    pub company_name: String,
    pub location: Option<String>,
    pub priority: ApplicationPriority,
    pub applied_date: Option<DateTime<Utc>>,
    pub application_url: Option<String>,
    pub application_domain: Option<String>,
    pub recipient_email: Option<String>,
    pub email_thread_id: Option<String>,
    pub last_email_sent_at: Option<DateTime<Utc>>,
    #[schemars(skip)]
    pub documents: Json<Vec<Document>>,
    #[schemars(skip)]
    pub communications: Json<Vec<Communication>>,
    #[schemars(skip)]
    pub interviews: Json<Vec<Interview>>,
    #[schemars(skip)]
    pub tasks: Json<Vec<ApplicationTask>>,
    #[schemars(skip)]
    pub timeline: Json<Vec<TimelineEvent>>,
    pub email_monitoring_enabled: bool,
    pub last_response_check: Option<DateTime<Utc>>,
    pub response_check_count: i32,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub next_follow_up: Option<DateTime<Utc>>,
    pub follow_up_count: i32,
    pub verification_portal_domain: Option<String>,
    pub notes: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn latest_timeline_event(&self) -> Option<&TimelineEvent> {
        self.timeline.last()
    }

    /// Status in the core response set, or any inbound communication.
    pub fn has_response(&self) -> bool {
        self.status.is_core_response()
            || self
                .communications
                .iter()
                .any(|c| c.direction == CommunicationDirection::Inbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_and_core_response_sets_are_disjoint_except_offer_and_rejected() {
        for status in CORE_RESPONSE_SET {
            if status.is_terminal() {
                assert!(
                    matches!(
                        status,
                        ApplicationStatus::OfferAccepted
                            | ApplicationStatus::OfferDeclined
                            | ApplicationStatus::Rejected
                    ),
                    "unexpected terminal status in core response set: {status:?}"
                );
            }
        }
    }

    #[test]
    fn applied_is_not_a_response_on_its_own() {
        assert!(!ApplicationStatus::Applied.is_core_response());
        assert!(!ApplicationStatus::Submitted.is_core_response());
    }

    #[test]
    fn interview_and_offer_statuses_count_as_a_response() {
        assert!(ApplicationStatus::InterviewScheduled.is_core_response());
        assert!(ApplicationStatus::OfferReceived.is_core_response());
        assert!(ApplicationStatus::Rejected.is_core_response());
    }
}
