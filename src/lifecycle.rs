//! Application Lifecycle Controller (C8): the FSM wrapper around
//! `ApplicationsRepo` that enforces terminal-state non-regression and fires
//! a timeline event (and a user notification) on every transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    Application, ApplicationPriority, ApplicationStatus, ApplicationTask, Communication,
    CommunicationDirection, Document, Interview, NotificationChannel, TimelineEvent,
};
use crate::notify::NotificationDispatcher;
use crate::persistence::ApplicationsRepo;

/// Serializes mutations to the same application so two concurrent callers
/// (say, a user edit and a background probe) can't race a read-modify-write
/// against the JSONB columns.
pub struct LifecycleController {
    applications: ApplicationsRepo,
    notifications: Arc<NotificationDispatcher>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl LifecycleController {
    pub fn new(applications: ApplicationsRepo, notifications: Arc<NotificationDispatcher>) -> Self {
        Self {
            applications,
            notifications,
            locks: DashMap::new(),
        }
    }

    /// Exposed so other components (the submission router, the response
    /// monitor) can hold the same per-application lock across a sequence of
    /// calls into `applications()` without re-entering `transition`.
    pub fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    pub async fn get(&self, id: Uuid) -> Result<Application, ApiError> {
        self.applications.get(id).await
    }

    /// `Transition(application, new_status, reason)`. A no-op (returns the
    /// row unchanged) if the application is already terminal or already at
    /// `new_status`; otherwise performs the compare-and-swap transition and
    /// fires an in-app notification to the owning user.
    pub async fn transition(
        &self,
        id: Uuid,
        new_status: ApplicationStatus,
        reason: &str,
    ) -> Result<Application, ApiError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let current = self.applications.get(id).await?;
        if current.status.is_terminal() || current.status == new_status {
            return Ok(current);
        }

        let event = TimelineEvent::status_change(current.status, new_status, reason);
        let updated = self
            .applications
            .transition_status(id, current.status, new_status, event)
            .await?;

        self.notify_status_change(&updated).await;
        Ok(updated)
    }

    async fn notify_status_change(&self, app: &Application) {
        let title = format!("{} — {}", app.company_name, app.job_title);
        let message = format!("Status changed to {:?}", app.status);
        let _ = self
            .notifications
            .notify(
                &placeholder_user(app.user_id),
                "status_update",
                &title,
                &message,
                serde_json::json!({ "application_id": app.id, "status": app.status }),
                vec![NotificationChannel::InApp],
                None,
            )
            .await;
    }

    pub async fn add_communication(
        &self,
        id: Uuid,
        direction: CommunicationDirection,
        channel: &str,
        subject: Option<String>,
        snippet: Option<String>,
        provider_message_id: Option<String>,
        category: Option<String>,
        confidence: Option<f64>,
    ) -> Result<Application, ApiError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let communication = Communication {
            id: Uuid::new_v4(),
            direction,
            channel: channel.to_string(),
            subject,
            snippet,
            provider_message_id,
            category,
            confidence,
            occurred_at: Utc::now(),
        };
        let event = TimelineEvent::note(
            "communication",
            format!("{:?} communication on {channel}", communication.direction),
        );
        self.applications.push_communication(id, communication, event).await
    }

    pub async fn add_document(&self, id: Uuid, document: Document) -> Result<Application, ApiError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.applications.push_document(id, document).await
    }

    pub async fn schedule_interview(&self, id: Uuid, interview: Interview) -> Result<Application, ApiError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let updated = self.applications.push_interview(id, interview).await?;
        self.transition(
            id,
            ApplicationStatus::InterviewScheduled,
            "interview scheduled",
        )
        .await?;
        self.applications.get(updated.id).await
    }

    pub async fn add_task(&self, id: Uuid, title: &str, description: Option<&str>, due_at: Option<DateTime<Utc>>) -> Result<Application, ApiError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let task = ApplicationTask {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.map(str::to_string),
            due_at,
            completed_at: None,
        };
        self.applications.push_task(id, task).await
    }

    pub async fn complete_task(&self, id: Uuid, task_id: Uuid) -> Result<Application, ApiError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.applications.complete_task(id, task_id).await
    }

    pub async fn update_notes(&self, id: Uuid, notes: Option<&str>) -> Result<Application, ApiError> {
        self.applications.update_notes(id, notes).await
    }

    pub async fn update_priority(&self, id: Uuid, priority: ApplicationPriority) -> Result<Application, ApiError> {
        self.applications.update_priority(id, priority).await
    }

    pub async fn set_follow_up(&self, id: Uuid, follow_up_date: Option<DateTime<Utc>>) -> Result<Application, ApiError> {
        self.applications.set_follow_up(id, follow_up_date).await
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<(), ApiError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        self.applications.soft_delete(id).await
    }

    pub async fn follow_ups_needed(&self, user_id: Uuid) -> Result<Vec<Application>, ApiError> {
        self.applications.follow_ups_needed(user_id).await
    }

    pub async fn upcoming_interviews(&self, user_id: Uuid) -> Result<Vec<Application>, ApiError> {
        self.applications.upcoming_interviews(user_id).await
    }

    /// Status breakdown plus the two headline rates from the dashboard: the
    /// share of applications that ever reached an interview stage, and the
    /// share that received at least one inbound communication.
    pub async fn stats(&self, user_id: Uuid) -> Result<LifecycleStats, ApiError> {
        let counts = self.applications.status_counts(user_id).await?;
        let total: i64 = counts.iter().map(|(_, n)| n).sum();
        let interviewed: i64 = counts
            .iter()
            .filter(|(status, _)| {
                matches!(
                    status,
                    ApplicationStatus::InterviewScheduled
                        | ApplicationStatus::InterviewCompleted
                        | ApplicationStatus::SecondRound
                        | ApplicationStatus::FinalRound
                        | ApplicationStatus::OfferReceived
                        | ApplicationStatus::OfferAccepted
                        | ApplicationStatus::OfferDeclined
                )
            })
            .map(|(_, n)| n)
            .sum();

        let follow_ups_pending = self
            .applications
            .follow_ups_needed(user_id)
            .await
            .map(|rows| rows.len() as i64)
            .unwrap_or(0);

        let (responded, applied_total) = self.applications.response_rate_counts(user_id).await?;

        Ok(LifecycleStats {
            by_status: counts,
            total,
            interview_rate: rate(interviewed, total),
            response_rate: rate(responded, applied_total),
            follow_ups_pending,
        })
    }

    pub fn applications(&self) -> &ApplicationsRepo {
        &self.applications
    }
}

fn rate(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleStats {
    pub by_status: Vec<(ApplicationStatus, i64)>,
    pub total: i64,
    pub interview_rate: f64,
    pub response_rate: f64,
    pub follow_ups_pending: i64,
}

/// Background-job callers that only need the user id for a notification
/// target build a minimal stand-in rather than round-tripping a full user
/// fetch; the dispatcher only reads `id`/`email`/preferences, all of which
/// are irrelevant for an in-app-only notification.
fn placeholder_user(user_id: Uuid) -> crate::models::User {
    crate::models::User {
        id: user_id,
        email: String::new(),
        display_name: None,
        role: "user".to_string(),
        disabled: false,
        mailbox_auth: None,
        notification_preferences: sqlx::types::Json(Default::default()),
        portal_credentials: sqlx::types::Json(Vec::new()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
