//! LLM pass of the email response classifier: a single strict-JSON chat
//! call used only when the deterministic pass is unsure, per
//! `LLM_PASS_THRESHOLD`.

use serde::Deserialize;

use crate::classifier::{Category, ExtractedInfo};
use crate::llm::{ChatMessage, ChatRequest, LlmGateway};

#[derive(Debug, Deserialize)]
struct LlmClassification {
    category: Category,
    confidence: f64,
    #[serde(default)]
    extracted_info: ExtractedInfo,
}

pub struct LlmPassResult {
    pub category: Category,
    pub confidence: f64,
    pub extracted_info: ExtractedInfo,
}

const SCHEMA_HINT: &str = r#"{"category":"interview_invitation|rejection|offer|information_request|follow_up_required|acknowledgment|scheduling_request|unknown","confidence":0.0,"extracted_info":{"dates":[],"times":[],"location":null}}"#;

/// Runs one chat completion constrained to the classifier's closed category
/// set. Returns `None` on any transport error or malformed JSON so the
/// caller keeps the deterministic result rather than failing the analysis.
pub async fn classify(llm: &dyn LlmGateway, subject: &str, body: &str) -> Option<LlmPassResult> {
    let request = ChatRequest {
        messages: vec![
            ChatMessage::system(format!(
                "You classify inbound job-application emails into exactly one category. \
                 Respond with JSON only, matching this shape: {SCHEMA_HINT}"
            )),
            ChatMessage::user(format!("Subject: {subject}\n\nBody:\n{body}")),
        ],
        temperature: 0.0,
        max_tokens: 300,
        json_schema: Some(serde_json::json!({"type": "json_object"})),
    };

    let response = llm.chat(request).await.ok()?;
    let parsed: LlmClassification = serde_json::from_str(&response.content).ok()?;

    Some(LlmPassResult {
        category: parsed.category,
        confidence: parsed.confidence.clamp(0.0, 1.0),
        extracted_info: parsed.extracted_info,
    })
}
