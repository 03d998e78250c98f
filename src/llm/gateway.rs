use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::llm::error::LlmError;
use crate::llm::ratelimit::RateLimiter;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// When set, the provider is asked to constrain its output to this JSON
    /// schema (via a `response_format` parameter).
    pub json_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
}

#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}

pub struct HttpLlmGateway {
    client: reqwest::Client,
    config: LlmConfig,
    limiter: RateLimiter,
}

impl HttpLlmGateway {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        let limiter = RateLimiter::new(config.max_concurrent_requests, config.max_requests_per_minute);
        Self { client, config, limiter }
    }
}

#[derive(Serialize)]
struct CompletionRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a serde_json::Value>,
}

#[derive(Deserialize)]
struct CompletionResponseBody {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

const MAX_ATTEMPTS: u32 = 5;
const BASE_BACKOFF: Duration = Duration::from_millis(500);

#[async_trait]
impl LlmGateway for HttpLlmGateway {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let _permit = self.limiter.acquire().await;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let body = CompletionRequestBody {
                model: &self.config.model,
                messages: &request.messages,
                temperature: request.temperature,
                max_tokens: request.max_tokens,
                response_format: request.json_schema.as_ref(),
            };

            let result = self
                .client
                .post(format!("{}/chat/completions", self.config.base_url))
                .bearer_auth(&self.config.api_key)
                .json(&body)
                .send()
                .await;

            let response = match result {
                Ok(r) => r,
                Err(e) if attempt < MAX_ATTEMPTS && (e.is_timeout() || e.is_connect()) => {
                    backoff_sleep(attempt).await;
                    continue;
                }
                Err(e) => return Err(LlmError::Http(e)),
            };

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let err = LlmError::status(status, body);
                if err.is_retryable() && attempt < MAX_ATTEMPTS {
                    backoff_sleep(attempt).await;
                    continue;
                }
                return Err(err);
            }

            let parsed: CompletionResponseBody = response.json().await?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;
            return Ok(ChatResponse { content });
        }
    }
}

/// Exponential backoff: base 500ms, factor 2, jitter +/-20%.
async fn backoff_sleep(attempt: u32) {
    let base_ms = BASE_BACKOFF.as_millis() as f64 * 2f64.powi(attempt as i32 - 1);
    let jitter = rand::thread_rng().gen_range(-0.2..=0.2);
    let delay_ms = (base_ms * (1.0 + jitter)).max(0.0);
    tokio::time::sleep(Duration::from_millis(delay_ms as u64)).await;
}
