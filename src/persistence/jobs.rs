use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::JobPosting;

#[derive(Clone)]
pub struct JobsRepo {
    pool: PgPool,
}

#[allow(clippy::too_many_arguments)]
pub struct NewJobPosting<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub company: &'a str,
    pub location: Option<&'a str>,
    pub employment_type: Option<&'a str>,
    pub arrangement: Option<&'a str>,
    pub level: Option<&'a str>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub salary_currency: Option<&'a str>,
    pub salary_period: Option<&'a str>,
    pub salary_negotiable: bool,
    pub skills_required: &'a [String],
    pub skills_preferred: &'a [String],
    pub requirements: &'a [String],
    pub application_email: Option<&'a str>,
    pub application_url: Option<&'a str>,
    pub source: &'a str,
    pub posted_at: Option<DateTime<Utc>>,
}

impl JobsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewJobPosting<'_>) -> Result<JobPosting, ApiError> {
        let row = sqlx::query_as::<_, JobPosting>(
            "INSERT INTO jobs \
             (title, description, company, location, employment_type, arrangement, level, \
              salary_min, salary_max, salary_currency, salary_period, salary_negotiable, \
              skills_required, skills_preferred, requirements, application_email, \
              application_url, source, posted_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19) \
             RETURNING *",
        )
        .bind(new.title)
        .bind(new.description)
        .bind(new.company)
        .bind(new.location)
        .bind(new.employment_type)
        .bind(new.arrangement)
        .bind(new.level)
        .bind(new.salary_min)
        .bind(new.salary_max)
        .bind(new.salary_currency)
        .bind(new.salary_period)
        .bind(new.salary_negotiable)
        .bind(Json(new.skills_required))
        .bind(Json(new.skills_preferred))
        .bind(Json(new.requirements))
        .bind(new.application_email)
        .bind(new.application_url)
        .bind(new.source)
        .bind(new.posted_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get(&self, id: Uuid) -> Result<JobPosting, ApiError> {
        sqlx::query_as::<_, JobPosting>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("job {id} not found")))
    }

    /// Hard-deletes the posting row. Called alongside
    /// `ApplicationsRepo::hard_delete` in the same transaction by the
    /// RemoteOK login-wall path.
    pub async fn hard_delete(&self, id: Uuid) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Stamps `expired_at` on postings older than `max_age`, the daily
    /// `job_expiry_tick` sweep. A posting with `expired_at` already set is
    /// left alone.
    pub async fn expire_stale(&self, max_age: chrono::Duration) -> Result<u64, ApiError> {
        let cutoff = Utc::now() - max_age;
        let result = sqlx::query(
            "UPDATE jobs SET expired_at = now(), updated_at = now() \
             WHERE expired_at IS NULL AND COALESCE(posted_at, created_at) < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Deletes an application and its job posting in one transaction. Used only
/// by the RemoteOK login-wall short-circuit: both rows disappear and no
/// timeline event is written, mirroring the original automation service's
/// hard-delete-and-report-`deleted`-status behavior.
pub async fn hard_delete_application_and_job(
    pool: &PgPool,
    application_id: Uuid,
    job_id: Uuid,
) -> Result<(), ApiError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM applications WHERE id = $1")
        .bind(application_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(job_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
