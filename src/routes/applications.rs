use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocket::State;
use rocket::serde::json::Json;
use rocket_okapi::openapi;
use uuid::Uuid;

use crate::browser::BrowserAutomationClient;
use crate::config::MailConfig;
use crate::error::ApiError;
use crate::lifecycle::LifecycleController;
use crate::llm::LlmGateway;
use crate::mail::gateway::HttpMailGateway;
use crate::mail::MailGateway;
use crate::models::{
    Application, ApplicationPriority, ApplicationSource, ApplicationStatus, PaginatedResponse,
    UsageEventType, User,
};
use crate::monitor::ResponseMonitor;
use crate::persistence::applications::ApplicationListFilter;
use crate::persistence::{JobsRepo, UsersRepo};
use crate::router::SubmissionRouter;

fn mail_gateway_for(client: &reqwest::Client, config: &MailConfig, user: &User) -> Option<HttpMailGateway> {
    let auth = user.mailbox_auth.as_ref()?.0.clone();
    Some(HttpMailGateway::new(client.clone(), config.clone(), auth))
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
pub struct CreateApplicationRequest {
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub source: ApplicationSource,
    #[serde(default = "default_priority")]
    pub priority: ApplicationPriority,
}

fn default_priority() -> ApplicationPriority {
    ApplicationPriority::Medium
}

/// `CreateApplication(user, job, source)`. The job posting must already
/// exist; its title/company/location are copied onto the application row so
/// listing it never needs a join.
#[openapi(tag = "Applications")]
#[post("/applications", data = "<body>")]
pub async fn create_application(
    lifecycle: &State<Arc<LifecycleController>>,
    jobs: &State<JobsRepo>,
    body: Json<CreateApplicationRequest>,
) -> Result<Json<Application>, ApiError> {
    let body = body.into_inner();
    let job = jobs.get(body.job_id).await?;
    let application = lifecycle
        .applications()
        .create(
            body.user_id,
            body.job_id,
            &job.title,
            &job.company,
            job.location.as_deref(),
            body.source,
            body.priority,
        )
        .await?;
    Ok(Json(application))
}

#[openapi(tag = "Applications")]
#[get("/applications/<id>")]
pub async fn get_application(
    lifecycle: &State<Arc<LifecycleController>>,
    id: Uuid,
) -> Result<Json<Application>, ApiError> {
    Ok(Json(lifecycle.get(id).await?))
}

/// Filters live in the JSON body rather than the query string: several of
/// these fields are enums, and round-tripping enums through Rocket's query
/// form parser would require a second naming scheme alongside the `serde`
/// one already in place on the models.
#[derive(serde::Deserialize, schemars::JsonSchema, Default)]
pub struct ListApplicationsRequest {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
    pub status: Option<ApplicationStatus>,
    pub source: Option<ApplicationSource>,
    pub priority: Option<ApplicationPriority>,
    pub company: Option<String>,
    pub applied_after: Option<DateTime<Utc>>,
    pub applied_before: Option<DateTime<Utc>>,
    pub has_response: Option<bool>,
}

#[openapi(tag = "Applications")]
#[post("/users/<user_id>/applications/search", data = "<body>")]
pub async fn list_applications(
    lifecycle: &State<Arc<LifecycleController>>,
    user_id: Uuid,
    body: Json<ListApplicationsRequest>,
) -> Result<Json<PaginatedResponse<Application>>, ApiError> {
    let body = body.into_inner();
    let filter = ApplicationListFilter {
        status: body.status,
        source: body.source,
        priority: body.priority,
        company: body.company,
        applied_after: body.applied_after,
        applied_before: body.applied_before,
        has_response: body.has_response,
    };
    let page = if body.page > 0 { body.page } else { 1 };
    let page_size = if body.page_size > 0 { body.page_size } else { 20 }.clamp(1, 100);
    let result = lifecycle.applications().list(user_id, &filter, page, page_size).await?;
    Ok(Json(result))
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
pub struct TransitionRequest {
    pub new_status: ApplicationStatus,
    pub reason: String,
}

#[openapi(tag = "Applications")]
#[post("/applications/<id>/transition", data = "<body>")]
pub async fn transition_application(
    lifecycle: &State<Arc<LifecycleController>>,
    id: Uuid,
    body: Json<TransitionRequest>,
) -> Result<Json<Application>, ApiError> {
    let body = body.into_inner();
    Ok(Json(lifecycle.transition(id, body.new_status, &body.reason).await?))
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
pub struct SubmitRequest {
    pub cv_id: Uuid,
    pub cover_letter_id: Option<Uuid>,
    pub usage_type: UsageEventType,
}

/// `Submit(application, cv, cover_letter)`. Builds the user's mail gateway
/// from their stored OAuth credentials and hands off to the submission
/// router, which picks email vs. browser automation.
#[openapi(tag = "Applications")]
#[post("/applications/<id>/submit", data = "<body>")]
pub async fn submit_application(
    lifecycle: &State<Arc<LifecycleController>>,
    users: &State<UsersRepo>,
    submission_router: &State<Arc<SubmissionRouter>>,
    llm: &State<Arc<dyn LlmGateway>>,
    browser: &State<Arc<dyn BrowserAutomationClient>>,
    http_client: &State<reqwest::Client>,
    mail_config: &State<MailConfig>,
    id: Uuid,
    body: Json<SubmitRequest>,
) -> Result<Json<Application>, ApiError> {
    let body = body.into_inner();
    let application = lifecycle.get(id).await?;
    let user = users.get(application.user_id).await?;
    let mail = mail_gateway_for(http_client, mail_config, &user).ok_or_else(|| {
        ApiError::BadRequest("user has no connected mailbox".to_string())
    })?;

    let updated = submission_router
        .submit(
            id,
            &user,
            &mail,
            browser.inner().as_ref(),
            Some(llm.inner().as_ref()),
            body.cv_id,
            body.cover_letter_id,
            body.usage_type,
        )
        .await?;
    Ok(Json(updated))
}

/// `Probe(application)`: an on-demand version of the background sweep, for
/// a user who wants a fresher read than the next scheduled check.
#[openapi(tag = "Applications")]
#[post("/applications/<id>/probe")]
pub async fn probe_application(
    users: &State<UsersRepo>,
    monitor: &State<Arc<ResponseMonitor>>,
    llm: &State<Arc<dyn LlmGateway>>,
    browser: &State<Arc<dyn BrowserAutomationClient>>,
    http_client: &State<reqwest::Client>,
    mail_config: &State<MailConfig>,
    lifecycle: &State<Arc<LifecycleController>>,
    id: Uuid,
) -> Result<Json<Application>, ApiError> {
    let application = lifecycle.get(id).await?;
    let user = users.get(application.user_id).await?;
    let mail = mail_gateway_for(http_client, mail_config, &user);

    let updated = monitor
        .probe(
            id,
            Some(browser.inner().as_ref()),
            mail.as_ref().map(|m| m as &dyn MailGateway),
            Some(llm.inner().as_ref()),
            true,
        )
        .await?;
    Ok(Json(updated))
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
pub struct NotesRequest {
    pub notes: Option<String>,
}

#[openapi(tag = "Applications")]
#[patch("/applications/<id>/notes", data = "<body>")]
pub async fn update_notes(
    lifecycle: &State<Arc<LifecycleController>>,
    id: Uuid,
    body: Json<NotesRequest>,
) -> Result<Json<Application>, ApiError> {
    Ok(Json(lifecycle.update_notes(id, body.notes.as_deref()).await?))
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
pub struct PriorityRequest {
    pub priority: ApplicationPriority,
}

#[openapi(tag = "Applications")]
#[patch("/applications/<id>/priority", data = "<body>")]
pub async fn update_priority(
    lifecycle: &State<Arc<LifecycleController>>,
    id: Uuid,
    body: Json<PriorityRequest>,
) -> Result<Json<Application>, ApiError> {
    Ok(Json(lifecycle.update_priority(id, body.priority).await?))
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
pub struct FollowUpRequest {
    pub follow_up_date: Option<DateTime<Utc>>,
}

#[openapi(tag = "Applications")]
#[patch("/applications/<id>/follow-up", data = "<body>")]
pub async fn set_follow_up(
    lifecycle: &State<Arc<LifecycleController>>,
    id: Uuid,
    body: Json<FollowUpRequest>,
) -> Result<Json<Application>, ApiError> {
    Ok(Json(lifecycle.set_follow_up(id, body.follow_up_date).await?))
}

#[derive(serde::Deserialize, schemars::JsonSchema)]
pub struct AddTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
}

#[openapi(tag = "Applications")]
#[post("/applications/<id>/tasks", data = "<body>")]
pub async fn add_task(
    lifecycle: &State<Arc<LifecycleController>>,
    id: Uuid,
    body: Json<AddTaskRequest>,
) -> Result<Json<Application>, ApiError> {
    let body = body.into_inner();
    Ok(Json(
        lifecycle
            .add_task(id, &body.title, body.description.as_deref(), body.due_at)
            .await?,
    ))
}

#[openapi(tag = "Applications")]
#[patch("/applications/<id>/tasks/<task_id>/complete")]
pub async fn complete_task(
    lifecycle: &State<Arc<LifecycleController>>,
    id: Uuid,
    task_id: Uuid,
) -> Result<Json<Application>, ApiError> {
    Ok(Json(lifecycle.complete_task(id, task_id).await?))
}

#[openapi(tag = "Applications")]
#[delete("/applications/<id>")]
pub async fn delete_application(
    lifecycle: &State<Arc<LifecycleController>>,
    id: Uuid,
) -> Result<Json<serde_json::Value>, ApiError> {
    lifecycle.soft_delete(id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[openapi(tag = "Applications")]
#[get("/users/<user_id>/follow-ups-needed")]
pub async fn follow_ups_needed(
    lifecycle: &State<Arc<LifecycleController>>,
    user_id: Uuid,
) -> Result<Json<Vec<Application>>, ApiError> {
    Ok(Json(lifecycle.follow_ups_needed(user_id).await?))
}

#[openapi(tag = "Applications")]
#[get("/users/<user_id>/upcoming-interviews")]
pub async fn upcoming_interviews(
    lifecycle: &State<Arc<LifecycleController>>,
    user_id: Uuid,
) -> Result<Json<Vec<Application>>, ApiError> {
    Ok(Json(lifecycle.upcoming_interviews(user_id).await?))
}

#[derive(serde::Serialize, schemars::JsonSchema)]
pub struct StatsResponse {
    pub by_status: Vec<(ApplicationStatus, i64)>,
    pub total: i64,
    pub interview_rate: f64,
    pub response_rate: f64,
    pub follow_ups_pending: i64,
}

#[openapi(tag = "Applications")]
#[get("/users/<user_id>/application-stats")]
pub async fn application_stats(
    lifecycle: &State<Arc<LifecycleController>>,
    user_id: Uuid,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = lifecycle.stats(user_id).await?;
    Ok(Json(StatsResponse {
        by_status: stats.by_status,
        total: stats.total,
        interview_rate: stats.interview_rate,
        response_rate: stats.response_rate,
        follow_ups_pending: stats.follow_ups_pending,
    }))
}
