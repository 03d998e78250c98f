use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    Application, ApplicationPriority, ApplicationSource, ApplicationStatus, ApplicationTask,
    Communication, Document, Interview, PaginatedResponse, TimelineEvent, CORE_RESPONSE_SET,
};

/// Filters accepted by `ApplicationsRepo::list`. All fields are optional;
/// `None` means "no filter on this column", matching the params style of
/// `routes/params.rs` in spirit.
#[derive(Debug, Default, Clone)]
pub struct ApplicationListFilter {
    pub status: Option<ApplicationStatus>,
    pub source: Option<ApplicationSource>,
    pub priority: Option<ApplicationPriority>,
    /// Case-insensitive substring match against `company_name`.
    pub company: Option<String>,
    pub applied_after: Option<DateTime<Utc>>,
    pub applied_before: Option<DateTime<Utc>>,
    /// `Some(true)` restricts to applications with at least one inbound
    /// communication; `Some(false)` to those with none.
    pub has_response: Option<bool>,
}

pub struct ApplicationsRepo {
    pool: PgPool,
}

impl ApplicationsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Application, ApiError> {
        sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        filter: &ApplicationListFilter,
        page: i64,
        page_size: i64,
    ) -> Result<PaginatedResponse<Application>, ApiError> {
        let mut count_qb: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "SELECT count(*) FROM applications WHERE deleted_at IS NULL AND user_id = ",
        );
        count_qb.push_bind(user_id);
        apply_filters(&mut count_qb, filter);
        let total_items: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new("SELECT * FROM applications WHERE deleted_at IS NULL AND user_id = ");
        qb.push_bind(user_id);
        apply_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ");
        qb.push_bind(page_size);
        qb.push(" OFFSET ");
        qb.push_bind((page - 1).max(0) * page_size);

        let rows = qb.build_query_as::<Application>().fetch_all(&self.pool).await?;
        Ok(PaginatedResponse::new(rows, page, page_size, total_items))
    }

    /// Every non-deleted application currently at `status`, across all
    /// users. Used by the periodic sweeps, which operate system-wide rather
    /// than per-user.
    pub async fn list_by_status(&self, status: ApplicationStatus, limit: i64) -> Result<Vec<Application>, ApiError> {
        let rows = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE deleted_at IS NULL AND status = $1 LIMIT $2",
        )
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Count of this user's applications not yet in a terminal state, used
    /// by the quota subsystem's concurrent-applications cap.
    pub async fn count_active_for_user(&self, user_id: Uuid) -> Result<i64, ApiError> {
        let terminal: &[ApplicationStatus] = &[
            ApplicationStatus::OfferAccepted,
            ApplicationStatus::OfferDeclined,
            ApplicationStatus::Rejected,
            ApplicationStatus::Withdrawn,
            ApplicationStatus::Archived,
        ];
        let count: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM applications \
             WHERE user_id = $1 AND deleted_at IS NULL AND status != ALL($2)",
        )
        .bind(user_id)
        .bind(terminal)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        user_id: Uuid,
        job_id: Uuid,
        job_title: &str,
        company_name: &str,
        location: Option<&str>,
        source: ApplicationSource,
        priority: ApplicationPriority,
    ) -> Result<Application, ApiError> {
        let event = TimelineEvent::note("created", "application created");
        sqlx::query_as::<_, Application>(
            "INSERT INTO applications \
             (user_id, job_id, status, source, job_title, company_name, location, priority, timeline) \
             VALUES ($1, $2, 'draft', $3, $4, $5, $6, $7, $8) \
             RETURNING *",
        )
        .bind(user_id)
        .bind(job_id)
        .bind(source)
        .bind(job_title)
        .bind(company_name)
        .bind(location)
        .bind(priority)
        .bind(Json(vec![event]))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict(format!("an application for job {job_id} already exists"))
            }
            other => other.into(),
        })
    }

    /// Atomic compare-and-swap transition: only succeeds if the row is still
    /// at `expected`. A mismatch means a concurrent writer already moved the
    /// application, and is surfaced as `ApiError::Conflict` rather than
    /// silently overwritten.
    pub async fn transition_status(
        &self,
        id: Uuid,
        expected: ApplicationStatus,
        new_status: ApplicationStatus,
        event: TimelineEvent,
    ) -> Result<Application, ApiError> {
        let row = sqlx::query_as::<_, Application>(
            "UPDATE applications \
             SET status = $3, updated_at = now(), timeline = timeline || $4::jsonb \
             WHERE id = $1 AND status = $2 AND deleted_at IS NULL \
             RETURNING *",
        )
        .bind(id)
        .bind(expected)
        .bind(new_status)
        .bind(Json(vec![event]))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(app) => Ok(app),
            None => {
                let current = self.get(id).await?;
                if current.status == new_status {
                    Ok(current)
                } else {
                    Err(ApiError::Conflict(format!(
                        "application {id} was not at status {expected:?}"
                    )))
                }
            }
        }
    }

    /// Idempotent by `(provider_message_id, application_id)` per §8: a
    /// message already present in `communications` is not appended again
    /// (or timestamped into `timeline` again), so a re-probed inbound email
    /// doesn't inflate the array or the response-rate statistic. A
    /// communication with no provider message id (e.g. a manually logged
    /// call) always appends.
    pub async fn push_communication(
        &self,
        id: Uuid,
        communication: Communication,
        event: TimelineEvent,
    ) -> Result<Application, ApiError> {
        let provider_message_id = communication.provider_message_id.clone();
        sqlx::query_as::<_, Application>(
            "UPDATE applications \
             SET communications = CASE \
                     WHEN $4::text IS NOT NULL AND EXISTS ( \
                         SELECT 1 FROM jsonb_array_elements(communications) AS c \
                         WHERE c->>'provider_message_id' = $4 \
                     ) THEN communications \
                     ELSE communications || $2::jsonb \
                 END, \
                 timeline = CASE \
                     WHEN $4::text IS NOT NULL AND EXISTS ( \
                         SELECT 1 FROM jsonb_array_elements(communications) AS c \
                         WHERE c->>'provider_message_id' = $4 \
                     ) THEN timeline \
                     ELSE timeline || $3::jsonb \
                 END, \
                 updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING *",
        )
        .bind(id)
        .bind(Json(vec![communication]))
        .bind(Json(vec![event]))
        .bind(provider_message_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))
    }

    pub async fn push_document(&self, id: Uuid, document: Document) -> Result<Application, ApiError> {
        sqlx::query_as::<_, Application>(
            "UPDATE applications SET documents = documents || $2::jsonb, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(Json(vec![document]))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))
    }

    pub async fn push_interview(&self, id: Uuid, interview: Interview) -> Result<Application, ApiError> {
        let event = TimelineEvent::note("interview_scheduled", "interview added");
        sqlx::query_as::<_, Application>(
            "UPDATE applications \
             SET interviews = interviews || $2::jsonb, timeline = timeline || $3::jsonb, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(Json(vec![interview]))
        .bind(Json(vec![event]))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))
    }

    pub async fn set_email_monitoring(
        &self,
        id: Uuid,
        domain: Option<&str>,
        enabled: bool,
        applied_date: Option<DateTime<Utc>>,
    ) -> Result<Application, ApiError> {
        sqlx::query_as::<_, Application>(
            "UPDATE applications \
             SET application_domain = COALESCE($2, application_domain), \
                 email_monitoring_enabled = $3, \
                 applied_date = COALESCE($4, applied_date), \
                 updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(domain)
        .bind(enabled)
        .bind(applied_date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))
    }

    pub async fn record_response_check(&self, id: Uuid) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE applications \
             SET last_response_check = now(), response_check_count = response_check_count + 1 \
             WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Applications eligible for a mailbox/portal probe: monitoring on, not
    /// in a terminal state, and not checked within the last `min_gap`.
    pub async fn list_due_for_probe(
        &self,
        min_gap: chrono::Duration,
        limit: i64,
    ) -> Result<Vec<Application>, ApiError> {
        let terminal: &[ApplicationStatus] = &[
            ApplicationStatus::OfferAccepted,
            ApplicationStatus::OfferDeclined,
            ApplicationStatus::Rejected,
            ApplicationStatus::Withdrawn,
            ApplicationStatus::Archived,
        ];
        let cutoff = Utc::now() - min_gap;
        let rows = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications \
             WHERE deleted_at IS NULL AND email_monitoring_enabled = TRUE \
               AND status != ALL($1) \
               AND (last_response_check IS NULL OR last_response_check < $2) \
             ORDER BY last_response_check NULLS FIRST \
             LIMIT $3",
        )
        .bind(terminal)
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Records the outcome of an email-path submission: recipient,
    /// provider thread id, send timestamp, and `applied_date`.
    pub async fn record_email_submission(
        &self,
        id: Uuid,
        recipient_email: &str,
        thread_id: &str,
    ) -> Result<Application, ApiError> {
        sqlx::query_as::<_, Application>(
            "UPDATE applications \
             SET recipient_email = $2, email_thread_id = $3, last_email_sent_at = now(), \
                 applied_date = COALESCE(applied_date, now()), updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(recipient_email)
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))
    }

    pub async fn set_verification_portal_domain(
        &self,
        id: Uuid,
        domain: Option<&str>,
    ) -> Result<Application, ApiError> {
        sqlx::query_as::<_, Application>(
            "UPDATE applications SET verification_portal_domain = $2, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))
    }

    pub async fn set_application_url(&self, id: Uuid, url: Option<&str>) -> Result<Application, ApiError> {
        sqlx::query_as::<_, Application>(
            "UPDATE applications SET application_url = COALESCE($2, application_url), updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))
    }

    pub async fn push_task(&self, id: Uuid, task: ApplicationTask) -> Result<Application, ApiError> {
        sqlx::query_as::<_, Application>(
            "UPDATE applications SET tasks = tasks || $2::jsonb, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(Json(vec![task]))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))
    }

    /// Marks the task with `task_id` completed in place. `jsonb_set` rewrites
    /// the matching array element without touching the rest of the array.
    pub async fn complete_task(&self, id: Uuid, task_id: Uuid) -> Result<Application, ApiError> {
        let app = self.get(id).await?;
        let position = app
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| ApiError::NotFound(format!("task {task_id} not found")))?;

        sqlx::query_as::<_, Application>(&format!(
            "UPDATE applications \
             SET tasks = jsonb_set(tasks, '{{{position},completed_at}}', to_jsonb(now())), \
                 updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))
    }

    pub async fn update_notes(&self, id: Uuid, notes: Option<&str>) -> Result<Application, ApiError> {
        sqlx::query_as::<_, Application>(
            "UPDATE applications SET notes = $2, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))
    }

    pub async fn update_priority(
        &self,
        id: Uuid,
        priority: ApplicationPriority,
    ) -> Result<Application, ApiError> {
        sqlx::query_as::<_, Application>(
            "UPDATE applications SET priority = $2, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(priority)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))
    }

    pub async fn set_follow_up(
        &self,
        id: Uuid,
        follow_up_date: Option<DateTime<Utc>>,
    ) -> Result<Application, ApiError> {
        sqlx::query_as::<_, Application>(
            "UPDATE applications \
             SET next_follow_up = $2, follow_up_count = follow_up_count + 1, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(follow_up_date)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("application {id} not found")))
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query(
            "UPDATE applications SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("application {id} not found")));
        }
        Ok(())
    }

    /// `(applied_with_response, applied_total)` over every application that
    /// has left `draft`. A response is either an inbound communication or a
    /// status in the glossary's core response set (offer, rejection, any
    /// interview stage): the classifier only logs a `Communication` row when
    /// it could fetch the triggering message, so a portal-sourced status
    /// change would otherwise undercount.
    pub async fn response_rate_counts(&self, user_id: Uuid) -> Result<(i64, i64), ApiError> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT \
                count(*) FILTER ( \
                    WHERE status = ANY($2) \
                    OR EXISTS ( \
                        SELECT 1 FROM jsonb_array_elements(communications) AS c \
                        WHERE c->>'direction' = 'inbound' \
                    ) \
                ), \
                count(*) \
             FROM applications \
             WHERE user_id = $1 AND deleted_at IS NULL AND status != 'draft'",
        )
        .bind(user_id)
        .bind(CORE_RESPONSE_SET as &[ApplicationStatus])
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Count of this user's applications grouped by status, for the
    /// dashboard summary.
    pub async fn status_counts(&self, user_id: Uuid) -> Result<Vec<(ApplicationStatus, i64)>, ApiError> {
        let rows: Vec<(ApplicationStatus, i64)> = sqlx::query_as(
            "SELECT status, count(*) FROM applications \
             WHERE user_id = $1 AND deleted_at IS NULL GROUP BY status",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Applications whose `next_follow_up` has passed and which have not yet
    /// reached a terminal state.
    pub async fn follow_ups_needed(&self, user_id: Uuid) -> Result<Vec<Application>, ApiError> {
        let terminal: &[ApplicationStatus] = &[
            ApplicationStatus::OfferAccepted,
            ApplicationStatus::OfferDeclined,
            ApplicationStatus::Rejected,
            ApplicationStatus::Withdrawn,
            ApplicationStatus::Archived,
        ];
        let rows = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications \
             WHERE user_id = $1 AND deleted_at IS NULL AND status != ALL($2) \
               AND next_follow_up IS NOT NULL AND next_follow_up <= now() \
             ORDER BY next_follow_up ASC",
        )
        .bind(user_id)
        .bind(terminal)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Applications with at least one interview scheduled in the future,
    /// read out of the JSONB `interviews` array.
    pub async fn upcoming_interviews(&self, user_id: Uuid) -> Result<Vec<Application>, ApiError> {
        let rows = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications \
             WHERE user_id = $1 AND deleted_at IS NULL \
               AND EXISTS ( \
                 SELECT 1 FROM jsonb_array_elements(interviews) AS interview \
                 WHERE (interview->>'scheduled_at')::timestamptz > now() \
               ) \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Hard-deletes the application row. Used only by the RemoteOK
    /// login-wall short-circuit, which deletes the application and its job
    /// posting together and writes no timeline event.
    pub async fn hard_delete(&self, id: Uuid) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn apply_filters(qb: &mut QueryBuilder<sqlx::Postgres>, filter: &ApplicationListFilter) {
    if let Some(status) = filter.status {
        qb.push(" AND status = ");
        qb.push_bind(status);
    }
    if let Some(source) = filter.source {
        qb.push(" AND source = ");
        qb.push_bind(source);
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND priority = ");
        qb.push_bind(priority);
    }
    if let Some(company) = &filter.company {
        qb.push(" AND company_name ILIKE ");
        qb.push_bind(format!("%{company}%"));
    }
    if let Some(after) = filter.applied_after {
        qb.push(" AND applied_date >= ");
        qb.push_bind(after);
    }
    if let Some(before) = filter.applied_before {
        qb.push(" AND applied_date <= ");
        qb.push_bind(before);
    }
    if let Some(has_response) = filter.has_response {
        // "has-response" is defined once (status in the core response set,
        // or any inbound communication) and the `false` branch negates that
        // same predicate, resolving the source's ambiguous `$nin` clause
        // (§9) as a consistent complement rather than a second definition.
        if has_response {
            qb.push(" AND (status = ANY(");
            qb.push_bind(CORE_RESPONSE_SET);
            qb.push(
                ") OR EXISTS (SELECT 1 FROM jsonb_array_elements(communications) AS c \
                   WHERE c->>'direction' = 'inbound'))",
            );
        } else {
            qb.push(" AND NOT (status = ANY(");
            qb.push_bind(CORE_RESPONSE_SET);
            qb.push(
                ") OR EXISTS (SELECT 1 FROM jsonb_array_elements(communications) AS c \
                   WHERE c->>'direction' = 'inbound'))",
            );
        }
    }
}
