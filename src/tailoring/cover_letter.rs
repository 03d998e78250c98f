use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, ChatRequest, LlmGateway};
use crate::llm::LlmError;
use crate::models::JobPosting;
use crate::tailoring::cv::ParsedCv;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Professional,
    Enthusiastic,
    Conversational,
    Formal,
}

impl Tone {
    fn description(self) -> &'static str {
        match self {
            Tone::Professional => "polished, measured, and confident",
            Tone::Enthusiastic => "energetic and genuinely excited about the role",
            Tone::Conversational => "warm and natural, like a direct introduction",
            Tone::Formal => "traditional and precise",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverLetter {
    pub header: String,
    pub paragraphs: Vec<String>,
    pub full_text: String,
    pub word_count: usize,
    pub paragraph_count: usize,
}

/// Generates a 250-350 word cover letter with a tone-parameterized prompt.
/// The model's raw text is split on blank lines into paragraphs the same
/// way the structured response is built downstream.
pub async fn generate_cover_letter(
    llm: &dyn LlmGateway,
    cv: &ParsedCv,
    job: &JobPosting,
    tone: Tone,
) -> Result<CoverLetter, LlmError> {
    let prompt = build_cover_letter_prompt(cv, job, tone);
    let request = ChatRequest {
        messages: vec![
            ChatMessage::system(
                "You write cover letters that sound authentic and human, never like an \
                 AI template. Open with a hook specific to this role, not a generic \
                 opener, and close with a confident call to action.",
            ),
            ChatMessage::user(prompt),
        ],
        temperature: 0.7,
        max_tokens: 700,
        json_schema: None,
    };

    let response = llm.chat(request).await?;
    Ok(structure_cover_letter(&response.content))
}

fn build_cover_letter_prompt(cv: &ParsedCv, job: &JobPosting, tone: Tone) -> String {
    let name = cv
        .personal_info
        .name
        .clone()
        .unwrap_or_else(|| "the candidate".to_string());

    format!(
        "Write a cover letter for {name} applying to {title} at {company}.\n\
         Job description: {description}\n\n\
         Length: 250-350 words. Focus on quality of connection over quantity.\n\
         Tone: {tone_description}. Make it sound authentic and human, not like an AI \
         template.\n\
         Structure the letter as plain text paragraphs separated by blank lines.",
        name = name,
        title = job.title,
        company = job.company,
        description = job.description.chars().take(800).collect::<String>(),
        tone_description = tone.description(),
    )
}

fn structure_cover_letter(full_text: &str) -> CoverLetter {
    let paragraphs: Vec<String> = full_text
        .split("\n\n")
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let header = paragraphs.first().cloned().unwrap_or_default();
    let word_count = full_text.split_whitespace().count();
    let paragraph_count = paragraphs.len();

    CoverLetter {
        header,
        paragraphs,
        full_text: full_text.trim().to_string(),
        word_count,
        paragraph_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_blank_lines() {
        let text = "Dear hiring team,\n\nI am excited to apply.\n\nBest,\nCandidate";
        let letter = structure_cover_letter(text);
        assert_eq!(letter.paragraph_count, 3);
        assert_eq!(letter.header, "Dear hiring team,");
    }
}
