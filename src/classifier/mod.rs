//! Email response classifier: deterministic keyword pass plus an optional
//! LLM pass.

pub mod keywords;
pub mod llm_pass;

use regex::Regex;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::llm::LlmGateway;
use crate::models::ApplicationStatus;

/// The minimum deterministic-pass confidence below which an LLM pass is
/// attempted (when the caller allows LLM use).
pub const LLM_PASS_THRESHOLD: f64 = 0.75;
/// The minimum confidence, after either pass, at which C8 is allowed to
/// apply a suggested transition.
pub const TRANSITION_CONFIDENCE_GATE: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    InterviewInvitation,
    Rejection,
    Offer,
    InformationRequest,
    FollowUpRequired,
    Acknowledgment,
    SchedulingRequest,
    Unknown,
}

impl Category {
    /// Category → suggested status mapping from the lifecycle table. C8
    /// still applies the confidence gate and the terminal-state rule; this
    /// only states what transition the category implies.
    pub fn suggested_status(self) -> Option<ApplicationStatus> {
        match self {
            Category::InterviewInvitation => Some(ApplicationStatus::InterviewScheduled),
            Category::Rejection => Some(ApplicationStatus::Rejected),
            Category::Offer => Some(ApplicationStatus::OfferReceived),
            Category::Acknowledgment => Some(ApplicationStatus::UnderReview),
            Category::InformationRequest
            | Category::FollowUpRequired
            | Category::SchedulingRequest
            | Category::Unknown => None,
        }
    }

    fn requires_action(self) -> bool {
        matches!(
            self,
            Category::InterviewInvitation
                | Category::InformationRequest
                | Category::SchedulingRequest
                | Category::Offer
        )
    }

    fn action_type(self) -> Option<&'static str> {
        match self {
            Category::InterviewInvitation => Some("schedule_interview"),
            Category::InformationRequest => Some("provide_information"),
            Category::SchedulingRequest => Some("schedule_meeting"),
            Category::Offer => Some("review_offer"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedInfo {
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub times: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    pub category: Category,
    pub confidence: f64,
    pub suggested_status: Option<ApplicationStatus>,
    pub requires_action: bool,
    pub action_type: Option<String>,
    pub action_details: Option<String>,
    pub keywords_matched: Vec<String>,
    pub extracted_info: ExtractedInfo,
    pub llm_used: bool,
}

static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday|\d{1,2}/\d{1,2}(?:/\d{2,4})?|\d{4}-\d{2}-\d{2})\b")
        .expect("valid date pattern")
});
static TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d{1,2}(:\d{2})?\s?(am|pm)\b").expect("valid time pattern")
});

/// `Analyze(subject, body, sender, app_id, use_llm) → AnalysisResult`.
/// Runs the deterministic keyword pass first; if its confidence is below
/// `LLM_PASS_THRESHOLD` and `use_llm` is set, an LLM pass overwrites the
/// category/confidence/extracted info on success.
pub async fn analyze(
    llm: Option<&dyn LlmGateway>,
    subject: &str,
    body: &str,
    use_llm: bool,
) -> AnalysisResult {
    let combined = format!("{subject} {body}");
    let (category, confidence, keywords_matched) = deterministic_pass(&combined);
    let extracted_info = extract_info(&combined);

    let mut result = build_result(category, confidence, keywords_matched, extracted_info, false);

    if use_llm && result.confidence < LLM_PASS_THRESHOLD {
        if let Some(llm) = llm {
            if let Some(llm_result) = llm_pass::classify(llm, subject, body).await {
                result = build_result(
                    llm_result.category,
                    llm_result.confidence,
                    result.keywords_matched,
                    llm_result.extracted_info,
                    true,
                );
            }
        }
    }

    result
}

fn build_result(
    category: Category,
    confidence: f64,
    keywords_matched: Vec<String>,
    extracted_info: ExtractedInfo,
    llm_used: bool,
) -> AnalysisResult {
    AnalysisResult {
        category,
        confidence,
        suggested_status: category.suggested_status(),
        requires_action: category.requires_action(),
        action_type: category.action_type().map(str::to_string),
        action_details: None,
        keywords_matched,
        extracted_info,
        llm_used,
    }
}

/// The headroom, in keyword-weight units, a category's strongest single
/// keyword still leaves below full confidence: hitting only the anchor
/// phrase (e.g. "interview" alone) clears the transition gate comfortably
/// without pinning confidence to 1.0, so a second corroborating match still
/// has somewhere to go.
const ANCHOR_HEADROOM: f64 = 0.5;

/// Scores every category's keyword density against the normalized text and
/// returns the winner. Density is the sum of matched keyword weights
/// divided by the category's *matched-keyword potential* — its strongest
/// single keyword's weight plus a fixed headroom — rather than the raw
/// token count, so a single high-signal phrase (e.g. "interview") clears
/// the transition-confidence gate on its own instead of being diluted by
/// the surrounding message length.
fn deterministic_pass(text: &str) -> (Category, f64, Vec<String>) {
    let normalized = text.to_lowercase();

    let mut best_category = Category::Unknown;
    let mut best_density = 0.0;
    let mut best_keywords = Vec::new();

    for &category in keywords::ALL_CATEGORIES {
        let dictionary = keywords::dictionary(category);
        let anchor_weight = dictionary
            .iter()
            .map(|(_, weight)| *weight)
            .fold(0.0_f64, f64::max);
        if anchor_weight <= 0.0 {
            continue;
        }

        let mut weight_sum = 0.0;
        let mut matched = Vec::new();
        for (keyword, weight) in dictionary {
            if normalized.contains(keyword) {
                weight_sum += weight;
                matched.push(keyword.to_string());
            }
        }
        let density = (weight_sum / (anchor_weight + ANCHOR_HEADROOM)).clamp(0.0, 1.0);
        if density > best_density {
            best_density = density;
            best_category = category;
            best_keywords = matched;
        }
    }

    (best_category, best_density, best_keywords)
}

fn extract_info(text: &str) -> ExtractedInfo {
    let dates = DATE_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    let times = TIME_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();
    ExtractedInfo { dates, times, location: None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interview_invitation_matches_s4() {
        let result = analyze(
            None,
            "Interview invitation - Acme",
            "Please confirm your availability on Tuesday at 10am",
            false,
        )
        .await;
        assert_eq!(result.category, Category::InterviewInvitation);
        assert!(result.confidence >= TRANSITION_CONFIDENCE_GATE);
        assert_eq!(result.suggested_status, Some(ApplicationStatus::InterviewScheduled));
        assert!(result.extracted_info.dates.iter().any(|d| d.eq_ignore_ascii_case("tuesday")));
        assert!(result.extracted_info.times.iter().any(|t| t.eq_ignore_ascii_case("10am")));
    }

    #[tokio::test]
    async fn unmatched_text_is_unknown() {
        let result = analyze(None, "Newsletter", "Check out our latest blog post.", false).await;
        assert_eq!(result.category, Category::Unknown);
        assert_eq!(result.confidence, 0.0);
        assert!(result.suggested_status.is_none());
    }
}
