//! Submission Router (C7): decides email vs. browser submission, prepares
//! the payload for whichever channel wins, and reacts to the automation
//! worker's auth-wall / verification / manual-action outcomes.

use std::sync::Arc;

use uuid::Uuid;

use crate::browser::{AutofillData, AutomationStatus, BrowserAutomationClient, NewCredentials, StartAutomationRequest};
use crate::error::ApiError;
use crate::lifecycle::LifecycleController;
use crate::llm::LlmGateway;
use crate::mail::mime::Attachment;
use crate::mail::{MailGateway, OutboundMessage};
use crate::models::{
    Application, ApplicationStatus, Document, DocumentKind, JobPosting, User, UsageEventType,
};
use crate::persistence::{EmailLogsRepo, UsersRepo, WorkItemsRepo};
use crate::persistence::email_logs::{EmailLogDirection, EmailLogStatus};
use crate::persistence::jobs::hard_delete_application_and_job;
use crate::quota::QuotaService;
use crate::tailoring::cv::{Education, Experience, ParsedCv, PersonalInfo, Skills};

/// Splits a raw email address's local part on `.`/`_` into a display name,
/// the fallback used when neither the CV nor the user's profile carries a
/// parseable name.
pub fn name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    local
        .split(['.', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts the registrable host from a URL string. Returns `None` for a
/// string that doesn't parse as a URL at all.
pub fn extract_domain(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}

pub struct SubmissionRouter {
    jobs: crate::persistence::JobsRepo,
    users: UsersRepo,
    email_logs: EmailLogsRepo,
    work_items: WorkItemsRepo,
    lifecycle: Arc<LifecycleController>,
    quota: Arc<QuotaService>,
}

impl SubmissionRouter {
    pub fn new(
        jobs: crate::persistence::JobsRepo,
        users: UsersRepo,
        email_logs: EmailLogsRepo,
        work_items: WorkItemsRepo,
        lifecycle: Arc<LifecycleController>,
        quota: Arc<QuotaService>,
    ) -> Self {
        Self {
            jobs,
            users,
            email_logs,
            work_items,
            lifecycle,
            quota,
        }
    }

    /// `Submit(user, application, job, cv_id, cover_letter_id, usage_type)`.
    #[allow(clippy::too_many_arguments)]
    pub async fn submit(
        &self,
        application_id: Uuid,
        user: &User,
        mail: &dyn MailGateway,
        browser: &dyn BrowserAutomationClient,
        llm: Option<&dyn LlmGateway>,
        cv_id: Uuid,
        cover_letter_id: Option<Uuid>,
        usage_type: UsageEventType,
    ) -> Result<Application, ApiError> {
        let check = self.quota.check(user.id, usage_type, 1).await?;
        if !check.allowed {
            return Err(ApiError::QuotaDenied(format!(
                "{} at {}/{}",
                usage_type.as_str(),
                check.current,
                check.limit
            )));
        }

        let application = self.lifecycle.get(application_id).await?;
        let job = self.jobs.get(application.job_id).await?;

        let cv = application
            .documents
            .iter()
            .find(|d| d.id == cv_id && d.kind == DocumentKind::Resume)
            .cloned()
            .ok_or_else(|| ApiError::BadRequest(format!("cv document {cv_id} not found")))?;
        let cover_letter = cover_letter_id.and_then(|id| {
            application
                .documents
                .iter()
                .find(|d| d.id == id && d.kind == DocumentKind::CoverLetter)
                .cloned()
        });

        let use_email_path = job.application_email.is_some() && cover_letter.is_some();

        let result = if use_email_path {
            self.submit_via_email(&application, &job, user, mail, llm, &cv, cover_letter.as_ref())
                .await
        } else {
            self.submit_via_browser(&application, &job, user, browser, &cv).await
        };

        match &result {
            Ok(updated) if updated.status == ApplicationStatus::Applied => {
                self.quota.track(user.id, usage_type, 1, Some(&application_id.to_string())).await?;
            }
            _ => {}
        }

        result
    }

    async fn submit_via_email(
        &self,
        application: &Application,
        job: &JobPosting,
        user: &User,
        mail: &dyn MailGateway,
        llm: Option<&dyn LlmGateway>,
        cv: &Document,
        cover_letter: Option<&Document>,
    ) -> Result<Application, ApiError> {
        let recipient = job
            .application_email
            .as_deref()
            .ok_or_else(|| ApiError::BadRequest("job has no application email".to_string()))?;

        let subject = format!("Application for {} at {}", job.title, job.company);
        let body = self.compose_email_body(job, user, llm, cover_letter).await;

        let attachment = Attachment {
            filename: cv.filename.clone(),
            content_type: cv.content_type.clone(),
            bytes: decode_document_bytes(cv),
        };

        let sent = mail
            .send(OutboundMessage {
                to: recipient,
                subject: &subject,
                body_text: &body,
                attachments: std::slice::from_ref(&attachment),
            })
            .await?;

        let _ = self
            .email_logs
            .record(
                EmailLogDirection::Outbound,
                EmailLogStatus::Sent,
                user.id,
                Some(application.id),
                Some(job.id),
                Some(&sent.provider_message_id),
                Some(&sent.thread_id),
                Some(&user.email),
                Some(recipient),
                Some(&subject),
                None,
            )
            .await;

        self.lifecycle
            .applications()
            .record_email_submission(application.id, recipient, &sent.thread_id)
            .await?;
        self.lifecycle
            .transition(application.id, ApplicationStatus::Applied, "submitted via email")
            .await
    }

    /// Builds the outbound body: a caller-supplied cover letter when
    /// substantial (>=50 words), otherwise an LLM mini-cover-letter, with a
    /// plain template as the last resort.
    async fn compose_email_body(
        &self,
        job: &JobPosting,
        user: &User,
        llm: Option<&dyn LlmGateway>,
        cover_letter: Option<&Document>,
    ) -> String {
        if let Some(letter) = cover_letter {
            if letter.content.split_whitespace().count() >= 50 {
                return letter.content.clone();
            }
        }

        if let Some(llm) = llm {
            if let Ok(mini) = self.generate_mini_cover_letter(llm, job, user).await {
                return mini;
            }
        }

        template_fallback_body(job, user)
    }

    async fn generate_mini_cover_letter(
        &self,
        llm: &dyn LlmGateway,
        job: &JobPosting,
        user: &User,
    ) -> Result<String, crate::llm::LlmError> {
        use crate::llm::{ChatMessage, ChatRequest};
        let name = user.display_name.clone().unwrap_or_else(|| name_from_email(&user.email));
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(
                    "Write a concise 3-4 sentence email body expressing interest in a role, \
                     to be sent as the body of a job application email with a resume attached.",
                ),
                ChatMessage::user(format!(
                    "Candidate: {name}\nRole: {} at {}\nJob description: {}",
                    job.title,
                    job.company,
                    job.description.chars().take(500).collect::<String>()
                )),
            ],
            temperature: 0.6,
            max_tokens: 250,
            json_schema: None,
        };
        Ok(llm.chat(request).await?.content)
    }

    async fn submit_via_browser(
        &self,
        application: &Application,
        job: &JobPosting,
        user: &User,
        browser: &dyn BrowserAutomationClient,
        cv: &Document,
    ) -> Result<Application, ApiError> {
        let domain = job.domain();
        let credential = domain.as_deref().and_then(|d| user.portal_credential_for(d));
        let url = job.application_url.as_deref().unwrap_or_default();
        let parsed_cv = parsed_cv_from(cv, user);

        let response = browser
            .start(StartAutomationRequest {
                session_id: Uuid::new_v4().to_string(),
                url,
                autofill_data: AutofillData {
                    personal_info: &parsed_cv.personal_info,
                    experience: &parsed_cv.experience,
                    education: &parsed_cv.education,
                    skills: &parsed_cv.skills,
                },
                job_source: &job.source,
                credentials: credential,
                auto_create_account: true,
            })
            .await?;

        if let Some(new_credentials) = &response.new_credentials {
            self.save_new_credentials(user.id, new_credentials).await?;
        }

        if job.is_login_wall_source() && response.status.is_login_wall() {
            hard_delete_application_and_job(self.jobs.pool(), application.id, job.id).await?;
            return Ok(Application {
                status: ApplicationStatus::Withdrawn,
                ..application.clone()
            });
        }

        self.lifecycle
            .applications()
            .set_application_url(application.id, Some(url))
            .await?;

        match response.status {
            AutomationStatus::Started => {
                self.lifecycle
                    .transition(application.id, ApplicationStatus::Processing, "automation started")
                    .await
            }
            AutomationStatus::Completed => {
                let updated = self
                    .lifecycle
                    .transition(application.id, ApplicationStatus::Applied, "automation completed")
                    .await?;

                let domain = extract_domain(url).or(domain);
                let has_paid_tier = self
                    .quota
                    .check(user.id, UsageEventType::AutoApplication, 0)
                    .await
                    .map(|c| c.limit > 5)
                    .unwrap_or(false);
                let enable_monitoring = user.gmail_connected() || has_paid_tier;

                self.lifecycle
                    .applications()
                    .set_email_monitoring(
                        updated.id,
                        domain.as_deref(),
                        enable_monitoring,
                        Some(chrono::Utc::now()),
                    )
                    .await?;

                if enable_monitoring {
                    self.work_items
                        .enqueue(
                            crate::models::WorkItemKind::Probe,
                            serde_json::json!({ "application_id": updated.id }),
                            Some(updated.id),
                            0,
                            Some(&format!("probe:{}", updated.id)),
                        )
                        .await?;
                }

                self.lifecycle.applications().get(updated.id).await
            }
            AutomationStatus::NeedsAuthentication | AutomationStatus::LoginRequired => {
                self.lifecycle
                    .transition(application.id, ApplicationStatus::NeedsAuthentication, "login wall")
                    .await
            }
            AutomationStatus::ManualActionRequired => {
                self.lifecycle
                    .transition(
                        application.id,
                        ApplicationStatus::ManualActionRequired,
                        "manual action required",
                    )
                    .await
            }
            AutomationStatus::PendingVerification => {
                let updated = self
                    .lifecycle
                    .transition(
                        application.id,
                        ApplicationStatus::PendingVerification,
                        "email verification required",
                    )
                    .await?;
                self.lifecycle
                    .applications()
                    .set_verification_portal_domain(
                        updated.id,
                        response.verification_domain.as_deref(),
                    )
                    .await
            }
        }
    }

    async fn save_new_credentials(&self, user_id: Uuid, new: &NewCredentials) -> Result<(), ApiError> {
        self.users
            .append_portal_credential(
                user_id,
                crate::models::PortalCredential {
                    domain: new.domain.clone(),
                    username: new.username.clone(),
                    password: new.password.clone(),
                    created_at: chrono::Utc::now(),
                },
            )
            .await
    }
}

fn template_fallback_body(job: &JobPosting, user: &User) -> String {
    let name = user.display_name.clone().unwrap_or_else(|| name_from_email(&user.email));
    format!(
        "Dear Hiring Team,\n\n\
         I am writing to apply for the {title} position at {company}. My resume is attached \
         for your review and I would welcome the opportunity to discuss how my background \
         fits this role.\n\n\
         Best regards,\n{name}",
        title = job.title,
        company = job.company,
        name = name,
    )
}

/// The CV document the pipeline attaches is the rendered file (base64), not
/// structured fields the browser worker can autofill from. When the tailored
/// CV was produced in this request (its bytes are base64-encoded JSON of a
/// `CustomizedCv`), recover the structure from it; otherwise fall back to
/// whatever the user's profile carries, never fabricating experience.
fn parsed_cv_from(cv: &Document, user: &User) -> ParsedCv {
    if let Ok(parsed) = serde_json::from_slice::<ParsedCv>(&decode_document_bytes(cv)) {
        return parsed;
    }
    ParsedCv {
        personal_info: PersonalInfo {
            name: user.display_name.clone(),
            email: Some(user.email.clone()),
            phone: None,
            location: None,
        },
        experience: Vec::<Experience>::new(),
        education: Vec::<Education>::new(),
        skills: Skills::Flat(Vec::new()),
    }
}

fn decode_document_bytes(document: &Document) -> Vec<u8> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(&document.content)
        .unwrap_or_else(|_| document.content.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_host_from_url() {
        assert_eq!(
            extract_domain("https://boards.greenhouse.io/acme/jobs/123"),
            Some("boards.greenhouse.io".to_string())
        );
        assert_eq!(extract_domain("not a url"), None);
    }

    #[test]
    fn splits_email_local_part_into_a_name() {
        assert_eq!(name_from_email("jane.doe@example.com"), "Jane Doe");
        assert_eq!(name_from_email("john_smith@example.com"), "John Smith");
    }
}
