//! Tailoring pipeline: CV customization, cover letter generation, and fit
//! score.

pub mod cover_letter;
pub mod cv;
pub mod fit_score;
pub mod pipeline;

pub use cover_letter::{CoverLetter, Tone, generate_cover_letter};
pub use cv::{CustomizedCv, Education, Experience, ParsedCv, PersonalInfo, Skills, customize_cv};
pub use fit_score::fit_score;
pub use pipeline::{TailoringResult, run};
