use crate::llm::LlmGateway;
use crate::models::JobPosting;
use crate::tailoring::cover_letter::{CoverLetter, Tone, generate_cover_letter};
use crate::tailoring::cv::{CustomizedCv, ParsedCv, customize_cv};
use crate::tailoring::fit_score::fit_score;

pub struct TailoringResult {
    pub customized_cv: CustomizedCv,
    pub cover_letter: Option<CoverLetter>,
    pub fit_score: f64,
}

/// Runs CV customization and cover letter generation concurrently, then
/// computes the fit score from the customized CV's skills. Cover letter
/// generation failing does not fail the whole pipeline: a submission can
/// still proceed on the CV alone.
pub async fn run(
    llm: &dyn LlmGateway,
    cv: &ParsedCv,
    job: &JobPosting,
    tone: Tone,
) -> TailoringResult {
    let (customized_cv, cover_letter_result) =
        tokio::join!(customize_cv(llm, cv, job), generate_cover_letter(llm, cv, job, tone));

    let cover_letter = match cover_letter_result {
        Ok(letter) => Some(letter),
        Err(e) => {
            log::warn!("cover letter generation failed: {e}");
            None
        }
    };

    let required_skills: Vec<String> = job.skills_required.0.clone();
    let score = fit_score(&customized_cv.skills.all(), &required_skills);

    TailoringResult {
        customized_cv,
        cover_letter,
        fit_score: score,
    }
}
