use rocket::State;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::JobPosting;
use crate::persistence::jobs::NewJobPosting;
use crate::persistence::JobsRepo;

#[derive(serde::Deserialize, schemars::JsonSchema)]
pub struct CreateJobRequest {
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
    #[serde(default)]
    pub salary_negotiable: bool,
    #[serde(default)]
    pub skills_required: Vec<String>,
    #[serde(default)]
    pub skills_preferred: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    pub application_email: Option<String>,
    pub application_url: Option<String>,
    pub source: String,
    pub posted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Registers a job posting discovered upstream (by a scraper, a board
/// integration, or a user pasting a listing by hand). This engine never
/// discovers postings itself.
#[openapi(tag = "Jobs")]
#[post("/jobs", data = "<body>")]
pub async fn create_job(
    jobs: &State<JobsRepo>,
    body: Json<CreateJobRequest>,
) -> Result<Json<JobPosting>, ApiError> {
    let row = jobs
        .create(NewJobPosting {
            title: &body.title,
            description: &body.description,
            company: &body.company,
            location: body.location.as_deref(),
            employment_type: body.employment_type.as_deref(),
            arrangement: body.arrangement.as_deref(),
            level: body.level.as_deref(),
            salary_min: body.salary_min,
            salary_max: body.salary_max,
            salary_currency: body.salary_currency.as_deref(),
            salary_period: body.salary_period.as_deref(),
            salary_negotiable: body.salary_negotiable,
            skills_required: &body.skills_required,
            skills_preferred: &body.skills_preferred,
            requirements: &body.requirements,
            application_email: body.application_email.as_deref(),
            application_url: body.application_url.as_deref(),
            source: &body.source,
            posted_at: body.posted_at,
        })
        .await?;
    Ok(Json(row))
}

#[openapi(tag = "Jobs")]
#[get("/jobs/<id>")]
pub async fn get_job(jobs: &State<JobsRepo>, id: Uuid) -> Result<Json<JobPosting>, ApiError> {
    Ok(Json(jobs.get(id).await?))
}
