//! Response validation and answer matching.

use study_core::model::{AnswerMatch, Challenge};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("response is empty or contains only whitespace or control characters")]
    InvalidResponseFormat,
}

/// Result of comparing one response with a challenge's accepted answers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreOutcome {
    pub is_correct: bool,
    /// False when the response was malformed and therefore scored as incorrect.
    pub well_formed: bool,
    /// Best similarity in `[0, 1]` against any accepted answer.
    pub similarity: f64,
}

impl ScoreOutcome {
    fn malformed() -> Self {
        Self {
            is_correct: false,
            well_formed: false,
            similarity: 0.0,
        }
    }
}

/// Reject responses with no visible content.
///
/// # Errors
///
/// Returns `ScoreError::InvalidResponseFormat` for empty input or input made
/// only of whitespace and control characters.
pub fn validate_response(response: &str) -> Result<&str, ScoreError> {
    if response
        .chars()
        .all(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ScoreError::InvalidResponseFormat);
    }
    Ok(response.trim())
}

/// Lowercase, drop control characters and collapse whitespace runs to one space.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| !c.is_control())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Score `response` against `challenge`. Never fails: malformed input is an
/// incorrect answer.
#[must_use]
pub fn score_response(challenge: &Challenge, response: &str) -> ScoreOutcome {
    let Ok(response) = validate_response(response) else {
        tracing::debug!(template = %challenge.template_id, "malformed response scored as incorrect");
        return ScoreOutcome::malformed();
    };

    let threshold = challenge.difficulty.params().fuzzy_threshold;
    let matching = challenge.expected.matching();
    let normalized_response = normalize(response);

    let mut best = 0.0_f64;
    for accepted in challenge.expected.accepted() {
        let similarity = match matching {
            AnswerMatch::Exact => {
                if response == accepted.trim() {
                    1.0
                } else {
                    0.0
                }
            }
            AnswerMatch::Normalized => {
                if normalized_response == normalize(accepted) {
                    1.0
                } else {
                    0.0
                }
            }
            AnswerMatch::Fuzzy => {
                strsim::normalized_levenshtein(&normalized_response, &normalize(accepted))
            }
        };
        best = best.max(similarity);
    }

    let is_correct = match matching {
        AnswerMatch::Exact | AnswerMatch::Normalized => best >= 1.0,
        AnswerMatch::Fuzzy => best >= threshold,
    };

    ScoreOutcome {
        is_correct,
        well_formed: true,
        similarity: best,
    }
}
