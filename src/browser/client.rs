use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::browser::error::BrowserError;
use crate::config::BrowserConfig;
use crate::models::PortalCredential;
use crate::tailoring::cv::{Education, Experience, PersonalInfo, Skills};

/// The exact status vocabulary `Start`/`PollStatus` report, grounded in the
/// original system's `browser_automation_service.py`. A non-2xx response is
/// how the worker reports outright failure; there is no `failed` status
/// string in this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationStatus {
    Started,
    Completed,
    NeedsAuthentication,
    LoginRequired,
    ManualActionRequired,
    PendingVerification,
}

impl AutomationStatus {
    pub fn is_login_wall(&self) -> bool {
        matches!(
            self,
            AutomationStatus::NeedsAuthentication
                | AutomationStatus::LoginRequired
                | AutomationStatus::ManualActionRequired
        )
    }
}

/// The high-level outcome vocabulary `CheckStatus` reports when re-probing a
/// portal's own "application status" page. Disjoint from `AutomationStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalStatus {
    Applied,
    InReview,
    Interview,
    Offer,
    Rejected,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutofillData<'a> {
    pub personal_info: &'a PersonalInfo,
    pub experience: &'a [Experience],
    pub education: &'a [Education],
    pub skills: &'a Skills,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartAutomationRequest<'a> {
    pub session_id: String,
    pub url: &'a str,
    pub autofill_data: AutofillData<'a>,
    pub job_source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<&'a PortalCredential>,
    pub auto_create_account: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutomationStatusResponse {
    pub status: AutomationStatus,
    pub browser_session_id: String,
    #[serde(default)]
    pub new_credentials: Option<NewCredentials>,
    #[serde(default)]
    pub verification_domain: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCredentials {
    pub domain: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckStatusResponse {
    pub success: bool,
    pub status: PortalStatus,
    #[serde(default)]
    pub matched_keyword: Option<String>,
    #[serde(default)]
    pub screenshot_base64: Option<String>,
}

/// The seam between the orchestration engine and the (out-of-scope) browser
/// automation worker: `Start`/`PollStatus`/`CheckStatus`/`Cancel`/`Health`.
#[async_trait]
pub trait BrowserAutomationClient: Send + Sync {
    async fn start(
        &self,
        request: StartAutomationRequest<'_>,
    ) -> Result<AutomationStatusResponse, BrowserError>;
    async fn poll_status(&self, session_id: &str) -> Result<AutomationStatusResponse, BrowserError>;
    async fn check_status(&self, url: &str) -> Result<CheckStatusResponse, BrowserError>;
    async fn cancel(&self, session_id: &str) -> Result<(), BrowserError>;
    async fn health(&self) -> Result<bool, BrowserError>;
}

pub struct HttpBrowserClient {
    client: reqwest::Client,
    config: BrowserConfig,
}

impl HttpBrowserClient {
    pub fn new(client: reqwest::Client, config: BrowserConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl BrowserAutomationClient for HttpBrowserClient {
    async fn start(
        &self,
        request: StartAutomationRequest<'_>,
    ) -> Result<AutomationStatusResponse, BrowserError> {
        let response = self
            .client
            .post(format!("{}/api/automation/start", self.config.base_url))
            .bearer_auth(&self.config.bearer_token)
            .timeout(std::time::Duration::from_secs(120))
            .json(&request)
            .send()
            .await?;
        parse_json(response).await
    }

    async fn poll_status(&self, session_id: &str) -> Result<AutomationStatusResponse, BrowserError> {
        let response = self
            .client
            .get(format!(
                "{}/api/automation/status/{session_id}",
                self.config.base_url
            ))
            .bearer_auth(&self.config.bearer_token)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await?;
        parse_json(response).await
    }

    async fn check_status(&self, url: &str) -> Result<CheckStatusResponse, BrowserError> {
        let response = self
            .client
            .post(format!("{}/api/automation/check-status", self.config.base_url))
            .bearer_auth(&self.config.bearer_token)
            .timeout(std::time::Duration::from_secs(10))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?;
        parse_json(response).await
    }

    async fn cancel(&self, session_id: &str) -> Result<(), BrowserError> {
        let response = self
            .client
            .post(format!(
                "{}/api/automation/{session_id}/cancel",
                self.config.base_url
            ))
            .bearer_auth(&self.config.bearer_token)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BrowserError::status(status, body));
        }
        Ok(())
    }

    async fn health(&self) -> Result<bool, BrowserError> {
        let response = self
            .client
            .get(format!("{}/health", self.config.base_url))
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await;
        match response {
            Ok(r) => Ok(r.status().is_success()),
            Err(e) if e.is_connect() || e.is_timeout() => Ok(false),
            Err(e) => Err(BrowserError::from(e)),
        }
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BrowserError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(BrowserError::status(status, body));
    }
    Ok(response.json().await?)
}
