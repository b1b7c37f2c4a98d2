use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ConceptId, Level};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChallengeError {
    #[error("concept {concept_id} has no challenge content for level {level}")]
    UnsupportedLevel { concept_id: ConceptId, level: Level },

    #[error("challenge template id cannot be empty")]
    EmptyTemplateId,

    #[error("challenge {template_id} has an empty prompt")]
    EmptyPrompt { template_id: String },

    #[error("challenge {template_id} has no accepted answers")]
    NoAcceptedAnswers { template_id: String },
}

//
// ─── CHALLENGE TYPES ───────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    MultipleChoice,
    CodeCompletion,
    DebugCode,
    WriteFunction,
    ExplainCode,
}

impl ChallengeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeType::MultipleChoice => "multiple_choice",
            ChallengeType::CodeCompletion => "code_completion",
            ChallengeType::DebugCode => "debug_code",
            ChallengeType::WriteFunction => "write_function",
            ChallengeType::ExplainCode => "explain_code",
        }
    }
}

/// How a response is compared against the accepted answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMatch {
    /// Byte-for-byte after trimming surrounding whitespace.
    Exact,
    /// Case-insensitive, with runs of whitespace collapsed.
    #[default]
    Normalized,
    /// Normalized, then accepted above the level's similarity threshold.
    Fuzzy,
}

/// Descriptor of what counts as a correct response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedAnswer {
    accepted: Vec<String>,
    #[serde(default)]
    matching: AnswerMatch,
}

impl ExpectedAnswer {
    #[must_use]
    pub fn new(accepted: Vec<String>, matching: AnswerMatch) -> Self {
        Self { accepted, matching }
    }

    #[must_use]
    pub fn exact(answer: impl Into<String>) -> Self {
        Self::new(vec![answer.into()], AnswerMatch::Exact)
    }

    #[must_use]
    pub fn normalized(answer: impl Into<String>) -> Self {
        Self::new(vec![answer.into()], AnswerMatch::Normalized)
    }

    #[must_use]
    pub fn fuzzy(answer: impl Into<String>) -> Self {
        Self::new(vec![answer.into()], AnswerMatch::Fuzzy)
    }

    #[must_use]
    pub fn accepted(&self) -> &[String] {
        &self.accepted
    }

    #[must_use]
    pub fn matching(&self) -> AnswerMatch {
        self.matching
    }
}

//
// ─── TEMPLATES ─────────────────────────────────────────────────────────────────
//

/// Challenge content registered on a concept for one difficulty level.
///
/// A concept may register several templates per level; each one is a prompt
/// variant the generator can pick from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeTemplate {
    pub id: String,
    pub title: String,
    pub prompt: String,
    pub challenge_type: ChallengeType,
    pub difficulty: Level,
    pub expected: ExpectedAnswer,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub code_template: Option<String>,
    #[serde(default)]
    pub points: Option<u32>,
}

impl ChallengeTemplate {
    /// Checks that the template can produce a scorable challenge.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeError` when the id or prompt is blank or there is no
    /// non-blank accepted answer.
    pub fn validate(&self) -> Result<(), ChallengeError> {
        if self.id.trim().is_empty() {
            return Err(ChallengeError::EmptyTemplateId);
        }
        if self.prompt.trim().is_empty() {
            return Err(ChallengeError::EmptyPrompt {
                template_id: self.id.clone(),
            });
        }
        if !self.expected.accepted.iter().any(|a| !a.trim().is_empty()) {
            return Err(ChallengeError::NoAcceptedAnswers {
                template_id: self.id.clone(),
            });
        }
        Ok(())
    }

    /// Points awarded for a correct answer.
    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
            .unwrap_or_else(|| self.difficulty.params().default_points)
    }
}

//
// ─── CHALLENGE ─────────────────────────────────────────────────────────────────
//

/// A single presented challenge.
///
/// Refers to its concept by id only; it is discarded after scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub concept_id: ConceptId,
    pub template_id: String,
    pub title: String,
    pub prompt: String,
    pub challenge_type: ChallengeType,
    pub difficulty: Level,
    pub expected: ExpectedAnswer,
    pub hints: Vec<String>,
    pub code_template: Option<String>,
    pub points: u32,
}

impl Challenge {
    #[must_use]
    pub fn from_template(concept_id: ConceptId, template: &ChallengeTemplate) -> Self {
        Self {
            concept_id,
            template_id: template.id.clone(),
            title: template.title.clone(),
            prompt: template.prompt.clone(),
            challenge_type: template.challenge_type,
            difficulty: template.difficulty,
            expected: template.expected.clone(),
            hints: template.hints.clone(),
            code_template: template.code_template.clone(),
            points: template.points(),
        }
    }
}
