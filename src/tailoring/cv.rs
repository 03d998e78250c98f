use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, ChatRequest, LlmGateway};
use crate::models::JobPosting;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersonalInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub description: String,
    #[serde(default)]
    pub relevance_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    pub degree: Option<String>,
    pub field: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// The source's dynamic `cv_data` dict collapses to this closed record: a
/// candidate's skills are either a flat list or split into technical/soft
/// buckets, and the pipeline normalizes on entry via `Skills::all`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Skills {
    Flat(Vec<String>),
    Categorized {
        technical: Vec<String>,
        #[serde(default)]
        soft: Vec<String>,
    },
}

impl Skills {
    pub fn all(&self) -> Vec<String> {
        match self {
            Skills::Flat(skills) => skills.clone(),
            Skills::Categorized { technical, soft } => {
                technical.iter().chain(soft.iter()).cloned().collect()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedCv {
    pub personal_info: PersonalInfo,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub skills: Skills,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomizedCv {
    pub personal_info: PersonalInfo,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub skills: Skills,
    #[serde(default)]
    pub ats_keywords: Vec<String>,
}

impl From<ParsedCv> for CustomizedCv {
    fn from(cv: ParsedCv) -> Self {
        Self {
            personal_info: cv.personal_info,
            experience: cv.experience,
            education: cv.education,
            skills: cv.skills,
            ats_keywords: Vec::new(),
        }
    }
}

/// Asks the LLM to reorder experiences, emphasize matching skills, inject
/// ATS keywords, and never fabricate. Falls back to the original CV
/// unchanged if the model's JSON doesn't parse — a customization failure
/// should never block a submission.
pub async fn customize_cv(
    llm: &dyn LlmGateway,
    cv: &ParsedCv,
    job: &JobPosting,
) -> CustomizedCv {
    let prompt = build_customization_prompt(cv, job);
    let request = ChatRequest {
        messages: vec![
            ChatMessage::system(
                "You are an expert CV writer. Reorder experiences and emphasize skills \
                 that match the target job. Inject ATS keywords drawn from the job \
                 description. Never fabricate experience or skills the candidate does not \
                 have; only reframe what is already there. Respond with JSON only.",
            ),
            ChatMessage::user(prompt),
        ],
        temperature: 0.4,
        max_tokens: 1800,
        json_schema: None,
    };

    match llm.chat(request).await {
        Ok(response) => match serde_json::from_str::<CustomizedCv>(&response.content) {
            Ok(customized) => customized,
            Err(e) => {
                log::warn!("CV customization returned malformed JSON, falling back: {e}");
                cv.clone().into()
            }
        },
        Err(e) => {
            log::warn!("CV customization LLM call failed, falling back: {e}");
            cv.clone().into()
        }
    }
}

fn build_customization_prompt(cv: &ParsedCv, job: &JobPosting) -> String {
    let description: String = job.description.chars().take(1000).collect();
    let requirements = job
        .requirements
        .iter()
        .take(10)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Job title: {title}\nCompany: {company}\nDescription: {description}\nKey requirements: {requirements}\n\n\
         Candidate CV (JSON): {cv_json}\n\n\
         Produce a customized CV as JSON with the same shape as the input, plus an \
         `ats_keywords` array of keywords from the job description the candidate's \
         experience legitimately supports. Reorder experience entries by relevance to \
         this job and set each entry's `relevance_score` from 0 to 10.",
        title = job.title,
        company = job.company,
        description = description,
        requirements = requirements,
        cv_json = serde_json::to_string(cv).unwrap_or_default(),
    )
}
