use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;

use crate::config::MailConfig;
use crate::mail::MailError;
use crate::mail::mime::{Attachment, build_raw_message};
use crate::models::MailboxAuth;

#[derive(Debug, Clone)]
pub struct OutboundMessage<'a> {
    pub to: &'a str,
    pub subject: &'a str,
    pub body_text: &'a str,
    pub attachments: &'a [Attachment],
}

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub provider_message_id: String,
    pub thread_id: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MessageSummary {
    pub provider_message_id: String,
    pub thread_id: String,
}

#[derive(Debug, Clone)]
pub struct MessageDetail {
    pub provider_message_id: String,
    pub thread_id: String,
    pub from: String,
    pub subject: String,
    pub snippet: String,
    pub body_text: String,
    pub internal_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MailboxProfile {
    pub email_address: String,
}

/// The seam between the orchestration engine and a real mailbox provider.
/// Implemented against the provider's HTTP API in production; a fake
/// implementation drives the tailoring/router/monitor tests.
#[async_trait]
pub trait MailGateway: Send + Sync {
    async fn send(&self, message: OutboundMessage<'_>) -> Result<SentMessage, MailError>;
    async fn list(&self, query: &str) -> Result<Vec<MessageSummary>, MailError>;
    async fn fetch(&self, provider_message_id: &str) -> Result<MessageDetail, MailError>;
    async fn profile(&self) -> Result<MailboxProfile, MailError>;
}

/// `reqwest`-backed gateway speaking to an OAuth2 mail provider (shaped
/// after the Gmail API, the provider the original system integrates with).
/// Tokens are held in an in-memory `Mutex` and refreshed on demand; the
/// refreshed token is the caller's responsibility to persist back to the
/// user record.
pub struct HttpMailGateway {
    client: reqwest::Client,
    config: MailConfig,
    auth: Mutex<MailboxAuth>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
}

impl HttpMailGateway {
    pub fn new(client: reqwest::Client, config: MailConfig, auth: MailboxAuth) -> Self {
        Self {
            client,
            config,
            auth: Mutex::new(auth),
        }
    }

    pub fn current_auth(&self) -> MailboxAuth {
        self.auth.lock().clone()
    }

    async fn refresh(&self) -> Result<(), MailError> {
        let refresh_token = self.auth.lock().refresh_token.clone();
        let response = self
            .client
            .post("https://oauth2.googleapis.com/token")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST
            || response.status() == reqwest::StatusCode::UNAUTHORIZED
        {
            return Err(MailError::AuthExpired(
                "refresh token rejected by provider".to_string(),
            ));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::status(status, body));
        }

        let parsed: RefreshResponse = response.json().await?;
        let mut auth = self.auth.lock();
        auth.access_token = parsed.access_token;
        auth.expires_at = Some(Utc::now() + chrono::Duration::seconds(parsed.expires_in));
        Ok(())
    }

    fn access_token(&self) -> String {
        self.auth.lock().access_token.clone()
    }

    /// Executes `request_fn`, retrying exactly once after a token refresh on
    /// a 401 response, per the C2 retry contract.
    async fn with_auth_retry<F, Fut, T>(&self, request_fn: F) -> Result<T, MailError>
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
        T: for<'de> Deserialize<'de>,
    {
        let response = request_fn(self.access_token()).await?;
        let response = if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.refresh().await?;
            request_fn(self.access_token()).await?
        } else {
            response
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::status(status, body));
        }

        response.json::<T>().await.map_err(MailError::from)
    }
}

#[derive(Deserialize)]
struct SendRawResponse {
    id: String,
    #[serde(rename = "threadId")]
    thread_id: String,
}

#[derive(Deserialize)]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<ListedMessage>,
}

#[derive(Deserialize)]
struct ListedMessage {
    id: String,
    #[serde(rename = "threadId")]
    thread_id: String,
}

#[derive(Deserialize)]
struct GetMessageResponse {
    id: String,
    #[serde(rename = "threadId")]
    thread_id: String,
    snippet: String,
    #[serde(rename = "internalDate")]
    internal_date: String,
    payload: MessagePayload,
}

#[derive(Deserialize)]
struct MessagePayload {
    headers: Vec<MessageHeader>,
    #[serde(default)]
    body: Option<MessageBody>,
}

#[derive(Deserialize)]
struct MessageHeader {
    name: String,
    value: String,
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Deserialize)]
struct ProfileResponse {
    #[serde(rename = "emailAddress")]
    email_address: String,
}

#[async_trait]
impl MailGateway for HttpMailGateway {
    async fn send(&self, message: OutboundMessage<'_>) -> Result<SentMessage, MailError> {
        let from = self.auth.lock().address.clone();
        let raw = build_raw_message(&from, message.to, message.subject, message.body_text, message.attachments);
        let base_url = self.config.base_url.clone();

        let result: SendRawResponse = self
            .with_auth_retry(|token| {
                let base_url = base_url.clone();
                let raw = raw.clone();
                let client = self.client.clone();
                async move {
                    client
                        .post(format!("{base_url}/users/me/messages/send"))
                        .bearer_auth(token)
                        .json(&serde_json::json!({ "raw": raw }))
                        .send()
                        .await
                }
            })
            .await?;

        Ok(SentMessage {
            provider_message_id: result.id,
            thread_id: result.thread_id,
            sent_at: Utc::now(),
        })
    }

    async fn list(&self, query: &str) -> Result<Vec<MessageSummary>, MailError> {
        let base_url = self.config.base_url.clone();
        let query = query.to_string();

        let result: ListMessagesResponse = self
            .with_auth_retry(|token| {
                let base_url = base_url.clone();
                let query = query.clone();
                let client = self.client.clone();
                async move {
                    client
                        .get(format!("{base_url}/users/me/messages"))
                        .bearer_auth(token)
                        .query(&[("q", query.as_str())])
                        .send()
                        .await
                }
            })
            .await?;

        Ok(result
            .messages
            .into_iter()
            .map(|m| MessageSummary {
                provider_message_id: m.id,
                thread_id: m.thread_id,
            })
            .collect())
    }

    async fn fetch(&self, provider_message_id: &str) -> Result<MessageDetail, MailError> {
        let base_url = self.config.base_url.clone();
        let id = provider_message_id.to_string();

        let result: GetMessageResponse = self
            .with_auth_retry(|token| {
                let base_url = base_url.clone();
                let id = id.clone();
                let client = self.client.clone();
                async move {
                    client
                        .get(format!("{base_url}/users/me/messages/{id}"))
                        .bearer_auth(token)
                        .send()
                        .await
                }
            })
            .await?;

        let header = |name: &str| -> String {
            result
                .payload
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.clone())
                .unwrap_or_default()
        };

        let body_text = result
            .payload
            .body
            .as_ref()
            .and_then(|b| b.data.as_ref())
            .map(|data| {
                use base64::Engine;
                base64::engine::general_purpose::URL_SAFE
                    .decode(data)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        let internal_date_ms: i64 = result
            .internal_date
            .parse()
            .map_err(|_| MailError::InvalidMessage("non-numeric internalDate".to_string()))?;

        Ok(MessageDetail {
            provider_message_id: result.id,
            thread_id: result.thread_id,
            from: header("From"),
            subject: header("Subject"),
            snippet: result.snippet,
            body_text,
            internal_date: DateTime::from_timestamp_millis(internal_date_ms)
                .unwrap_or_else(Utc::now),
        })
    }

    async fn profile(&self) -> Result<MailboxProfile, MailError> {
        let base_url = self.config.base_url.clone();
        let result: ProfileResponse = self
            .with_auth_retry(|token| {
                let base_url = base_url.clone();
                let client = self.client.clone();
                async move {
                    client
                        .get(format!("{base_url}/users/me/profile"))
                        .bearer_auth(token)
                        .send()
                        .await
                }
            })
            .await?;
        Ok(MailboxProfile {
            email_address: result.email_address,
        })
    }
}
