use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ChallengeError, ChallengeTemplate, ConceptId, Level};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConceptError {
    #[error("concept name cannot be empty")]
    EmptyName,

    #[error("concept description cannot be empty")]
    EmptyDescription,

    #[error("estimated duration must be positive")]
    InvalidDuration,

    #[error("difficulty weight must be in (0, 1], got {0}")]
    InvalidDifficultyWeight(String),

    #[error("concept cannot list itself as a prerequisite")]
    SelfPrerequisite,

    #[error(transparent)]
    Challenge(#[from] ChallengeError),
}

//
// ─── CATEGORY ──────────────────────────────────────────────────────────────────
//

/// Topic tag of a concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConceptCategory {
    Basics,
    DataStructures,
    ControlFlow,
    Functions,
    #[serde(rename = "object_oriented_programming")]
    Oop,
    Modules,
    FileIo,
    ErrorHandling,
    #[serde(rename = "advanced_topics")]
    Advanced,
    Testing,
    #[serde(rename = "asynchronous_programming")]
    Async,
}

impl ConceptCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConceptCategory::Basics => "basics",
            ConceptCategory::DataStructures => "data_structures",
            ConceptCategory::ControlFlow => "control_flow",
            ConceptCategory::Functions => "functions",
            ConceptCategory::Oop => "object_oriented_programming",
            ConceptCategory::Modules => "modules",
            ConceptCategory::FileIo => "file_io",
            ConceptCategory::ErrorHandling => "error_handling",
            ConceptCategory::Advanced => "advanced_topics",
            ConceptCategory::Testing => "testing",
            ConceptCategory::Async => "asynchronous_programming",
        }
    }
}

/// Illustrative snippet shown alongside a concept's explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExample {
    pub code: String,
    pub explanation: String,
    #[serde(default)]
    pub output: Option<String>,
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

fn default_weight() -> f64 {
    0.5
}

fn default_duration() -> u32 {
    30
}

/// Unvalidated concept as read from a catalog source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptDraft {
    pub id: ConceptId,
    pub name: String,
    pub level: Level,
    pub category: ConceptCategory,
    #[serde(default = "default_weight")]
    pub difficulty_weight: f64,
    pub description: String,
    #[serde(default)]
    pub learning_objectives: Vec<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub code_examples: Vec<CodeExample>,
    #[serde(default)]
    pub challenges: Vec<ChallengeTemplate>,
    #[serde(default)]
    pub prerequisites: Vec<ConceptId>,
    #[serde(default = "default_duration")]
    pub estimated_duration_minutes: u32,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl ConceptDraft {
    /// Minimal draft with defaults for the optional metadata.
    #[must_use]
    pub fn new(
        id: ConceptId,
        name: impl Into<String>,
        level: Level,
        category: ConceptCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            level,
            category,
            difficulty_weight: default_weight(),
            description: description.into(),
            learning_objectives: Vec::new(),
            explanation: String::new(),
            code_examples: Vec::new(),
            challenges: Vec::new(),
            prerequisites: Vec::new(),
            estimated_duration_minutes: default_duration(),
            keywords: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_weight(mut self, difficulty_weight: f64) -> Self {
        self.difficulty_weight = difficulty_weight;
        self
    }

    #[must_use]
    pub fn with_challenge(mut self, template: ChallengeTemplate) -> Self {
        self.challenges.push(template);
        self
    }

    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    /// Validate the draft into an immutable `LearningConcept`.
    ///
    /// # Errors
    ///
    /// Returns `ConceptError` for blank name/description, a non-positive
    /// duration, a weight outside `(0, 1]`, a self-prerequisite, or an invalid
    /// challenge template.
    pub fn validate(self) -> Result<LearningConcept, ConceptError> {
        if self.name.trim().is_empty() {
            return Err(ConceptError::EmptyName);
        }
        if self.description.trim().is_empty() {
            return Err(ConceptError::EmptyDescription);
        }
        if self.estimated_duration_minutes == 0 {
            return Err(ConceptError::InvalidDuration);
        }
        if !self.difficulty_weight.is_finite()
            || self.difficulty_weight <= 0.0
            || self.difficulty_weight > 1.0
        {
            return Err(ConceptError::InvalidDifficultyWeight(
                self.difficulty_weight.to_string(),
            ));
        }
        if self.prerequisites.contains(&self.id) {
            return Err(ConceptError::SelfPrerequisite);
        }
        for template in &self.challenges {
            template.validate()?;
        }

        Ok(LearningConcept {
            id: self.id,
            name: self.name.trim().to_owned(),
            level: self.level,
            category: self.category,
            difficulty_weight: self.difficulty_weight,
            description: self.description,
            learning_objectives: self.learning_objectives,
            explanation: self.explanation,
            code_examples: self.code_examples,
            challenges: self.challenges,
            prerequisites: self.prerequisites,
            estimated_duration_minutes: self.estimated_duration_minutes,
            keywords: self.keywords,
        })
    }
}

//
// ─── CONCEPT ───────────────────────────────────────────────────────────────────
//

/// An atomic unit of learnable material. Immutable once validated.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningConcept {
    id: ConceptId,
    name: String,
    level: Level,
    category: ConceptCategory,
    difficulty_weight: f64,
    description: String,
    learning_objectives: Vec<String>,
    explanation: String,
    code_examples: Vec<CodeExample>,
    challenges: Vec<ChallengeTemplate>,
    prerequisites: Vec<ConceptId>,
    estimated_duration_minutes: u32,
    keywords: Vec<String>,
}

impl LearningConcept {
    #[must_use]
    pub fn id(&self) -> &ConceptId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub fn category(&self) -> ConceptCategory {
        self.category
    }

    #[must_use]
    pub fn difficulty_weight(&self) -> f64 {
        self.difficulty_weight
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn learning_objectives(&self) -> &[String] {
        &self.learning_objectives
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn code_examples(&self) -> &[CodeExample] {
        &self.code_examples
    }

    #[must_use]
    pub fn challenges(&self) -> &[ChallengeTemplate] {
        &self.challenges
    }

    /// Templates registered for one difficulty level, in declaration order.
    pub fn challenges_at(&self, level: Level) -> impl Iterator<Item = &ChallengeTemplate> {
        self.challenges.iter().filter(move |t| t.difficulty == level)
    }

    #[must_use]
    pub fn supports(&self, level: Level) -> bool {
        self.challenges_at(level).next().is_some()
    }

    #[must_use]
    pub fn prerequisites(&self) -> &[ConceptId] {
        &self.prerequisites
    }

    #[must_use]
    pub fn estimated_duration_minutes(&self) -> u32 {
        self.estimated_duration_minutes
    }

    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Case-insensitive match against name, description and keywords.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query)
            || self.description.to_lowercase().contains(&query)
            || self
                .keywords
                .iter()
                .any(|k| k.to_lowercase().contains(&query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChallengeType, ExpectedAnswer};

    fn draft() -> ConceptDraft {
        ConceptDraft::new(
            ConceptId::new("variables").unwrap(),
            "Variables and Data Types",
            Level::Beginner,
            ConceptCategory::Basics,
            "Learn about variables",
        )
    }

    fn template(level: Level) -> ChallengeTemplate {
        ChallengeTemplate {
            id: format!("variables_{level}"),
            title: "Assign".into(),
            prompt: "Assign 5 to x".into(),
            challenge_type: ChallengeType::CodeCompletion,
            difficulty: level,
            expected: ExpectedAnswer::normalized("x = 5"),
            hints: Vec::new(),
            code_template: None,
            points: None,
        }
    }

    #[test]
    fn concept_fails_if_name_empty() {
        let err = ConceptDraft {
            name: "  ".into(),
            ..draft()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, ConceptError::EmptyName);
    }

    #[test]
    fn concept_fails_if_description_empty() {
        let err = ConceptDraft {
            description: String::new(),
            ..draft()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, ConceptError::EmptyDescription);
    }

    #[test]
    fn concept_rejects_zero_duration_and_bad_weight() {
        let err = ConceptDraft {
            estimated_duration_minutes: 0,
            ..draft()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, ConceptError::InvalidDuration);

        for weight in [0.0, -0.1, 1.5, f64::NAN] {
            let err = draft().with_weight(weight).validate().unwrap_err();
            assert!(matches!(err, ConceptError::InvalidDifficultyWeight(_)));
        }
        assert!(draft().with_weight(1.0).validate().is_ok());
    }

    #[test]
    fn concept_rejects_self_prerequisite() {
        let mut d = draft();
        d.prerequisites.push(d.id.clone());
        assert_eq!(d.validate().unwrap_err(), ConceptError::SelfPrerequisite);
    }

    #[test]
    fn supports_reports_registered_levels() {
        let concept = draft()
            .with_challenge(template(Level::Beginner))
            .validate()
            .unwrap();
        assert!(concept.supports(Level::Beginner));
        assert!(!concept.supports(Level::Expert));
        assert_eq!(concept.challenges_at(Level::Beginner).count(), 1);
    }

    #[test]
    fn query_matches_keywords_case_insensitively() {
        let concept = draft().with_keywords(["int", "Float"]).validate().unwrap();
        assert!(concept.matches_query("float"));
        assert!(concept.matches_query("VARIABLES"));
        assert!(!concept.matches_query("decorator"));
    }

    #[test]
    fn draft_deserializes_with_defaults() {
        let json = r#"{
            "id": "loops",
            "name": "Loops",
            "level": "beginner",
            "category": "control_flow",
            "description": "Repeat things"
        }"#;
        let draft: ConceptDraft = serde_json::from_str(json).unwrap();
        assert_eq!(draft.estimated_duration_minutes, 30);
        let concept = draft.validate().unwrap();
        assert_eq!(concept.category(), ConceptCategory::ControlFlow);
        assert!((concept.difficulty_weight() - 0.5).abs() < f64::EPSILON);
    }
}
