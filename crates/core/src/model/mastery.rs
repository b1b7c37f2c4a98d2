use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ConceptId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum MasteryError {
    #[error("learning rate must be in (0, 1], got {provided}")]
    InvalidLearningRate { provided: f64 },

    #[error("mastery threshold must be in (0, 1], got {provided}")]
    InvalidThreshold { provided: f64 },

    #[error("mastery score must be in [0, 1], got {provided}")]
    ScoreOutOfRange { provided: f64 },

    #[error("correct count ({correct}) exceeds attempt count ({attempts})")]
    CountMismatch { correct: u32, attempts: u32 },

    #[error("consecutive correct ({streak}) exceeds correct count ({correct})")]
    StreakMismatch { streak: u32, correct: u32 },
}

/// The full concept → record mapping for one learner.
pub type MasteryState = HashMap<ConceptId, MasteryRecord>;

//
// ─── POLICY ────────────────────────────────────────────────────────────────────
//

/// Parameters of the mastery update rule.
///
/// `new = old + learning_rate × (outcome − old)`, where outcome is 1.0 for a
/// correct answer and 0.0 otherwise. A concept is mastered once its score
/// reaches `threshold` after at least `min_attempts` attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteryPolicy {
    learning_rate: f64,
    threshold: f64,
    min_attempts: u32,
}

impl MasteryPolicy {
    pub const DEFAULT_LEARNING_RATE: f64 = 0.3;
    pub const DEFAULT_THRESHOLD: f64 = 0.85;
    pub const DEFAULT_MIN_ATTEMPTS: u32 = 3;

    /// Create a policy with custom parameters.
    ///
    /// # Errors
    ///
    /// Returns `MasteryError` if the learning rate or threshold is outside `(0, 1]`.
    pub fn new(learning_rate: f64, threshold: f64, min_attempts: u32) -> Result<Self, MasteryError> {
        if !learning_rate.is_finite() || learning_rate <= 0.0 || learning_rate > 1.0 {
            return Err(MasteryError::InvalidLearningRate {
                provided: learning_rate,
            });
        }
        if !threshold.is_finite() || threshold <= 0.0 || threshold > 1.0 {
            return Err(MasteryError::InvalidThreshold {
                provided: threshold,
            });
        }
        Ok(Self {
            learning_rate,
            threshold,
            min_attempts,
        })
    }

    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    #[must_use]
    pub fn min_attempts(&self) -> u32 {
        self.min_attempts
    }

    /// Exponential moving average step, clamped to `[0, 1]`.
    #[must_use]
    pub fn next_score(&self, old: f64, is_correct: bool) -> f64 {
        let outcome = if is_correct { 1.0 } else { 0.0 };
        (old + self.learning_rate * (outcome - old)).clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn is_mastered(&self, record: &MasteryRecord) -> bool {
        record.attempt_count >= self.min_attempts && record.mastery_score >= self.threshold
    }
}

impl Default for MasteryPolicy {
    fn default() -> Self {
        Self {
            learning_rate: Self::DEFAULT_LEARNING_RATE,
            threshold: Self::DEFAULT_THRESHOLD,
            min_attempts: Self::DEFAULT_MIN_ATTEMPTS,
        }
    }
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// Per-(learner, concept) mastery estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct MasteryRecord {
    concept_id: ConceptId,
    mastery_score: f64,
    attempt_count: u32,
    correct_count: u32,
    consecutive_correct: u32,
    last_seen: Option<DateTime<Utc>>,
}

impl MasteryRecord {
    /// A record for a concept that has never been attempted.
    #[must_use]
    pub fn new(concept_id: ConceptId) -> Self {
        Self {
            concept_id,
            mastery_score: 0.0,
            attempt_count: 0,
            correct_count: 0,
            consecutive_correct: 0,
            last_seen: None,
        }
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `MasteryError` if the score is outside `[0, 1]` or the counters
    /// are inconsistent with each other.
    pub fn from_persisted(
        concept_id: ConceptId,
        mastery_score: f64,
        attempt_count: u32,
        correct_count: u32,
        consecutive_correct: u32,
        last_seen: Option<DateTime<Utc>>,
    ) -> Result<Self, MasteryError> {
        if !(0.0..=1.0).contains(&mastery_score) {
            return Err(MasteryError::ScoreOutOfRange {
                provided: mastery_score,
            });
        }
        if correct_count > attempt_count {
            return Err(MasteryError::CountMismatch {
                correct: correct_count,
                attempts: attempt_count,
            });
        }
        if consecutive_correct > correct_count {
            return Err(MasteryError::StreakMismatch {
                streak: consecutive_correct,
                correct: correct_count,
            });
        }
        Ok(Self {
            concept_id,
            mastery_score,
            attempt_count,
            correct_count,
            consecutive_correct,
            last_seen,
        })
    }

    /// Apply one completed challenge to the record.
    pub fn apply_outcome(&mut self, policy: &MasteryPolicy, is_correct: bool, at: DateTime<Utc>) {
        self.mastery_score = policy.next_score(self.mastery_score, is_correct);
        self.attempt_count = self.attempt_count.saturating_add(1);
        if is_correct {
            self.correct_count = self.correct_count.saturating_add(1);
            self.consecutive_correct = self.consecutive_correct.saturating_add(1);
        } else {
            self.consecutive_correct = 0;
        }
        self.last_seen = Some(at);
    }

    #[must_use]
    pub fn concept_id(&self) -> &ConceptId {
        &self.concept_id
    }

    #[must_use]
    pub fn mastery_score(&self) -> f64 {
        self.mastery_score
    }

    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn consecutive_correct(&self) -> u32 {
        self.consecutive_correct
    }

    #[must_use]
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    #[must_use]
    pub fn is_attempted(&self) -> bool {
        self.attempt_count > 0
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use proptest::prelude::*;

    fn variables() -> ConceptId {
        ConceptId::new("variables").unwrap()
    }

    #[test]
    fn two_correct_answers_follow_moving_average() {
        let policy = MasteryPolicy::default();
        let mut record = MasteryRecord::new(variables());

        record.apply_outcome(&policy, true, fixed_now());
        assert!((record.mastery_score() - 0.3).abs() < 1e-9);

        record.apply_outcome(&policy, true, fixed_now());
        assert!((record.mastery_score() - 0.51).abs() < 1e-9);
        assert_eq!(record.attempt_count(), 2);
        assert_eq!(record.consecutive_correct(), 2);
    }

    #[test]
    fn incorrect_resets_streak_and_decays_score() {
        let policy = MasteryPolicy::default();
        let mut record = MasteryRecord::new(variables());
        record.apply_outcome(&policy, true, fixed_now());
        record.apply_outcome(&policy, false, fixed_now());

        assert_eq!(record.consecutive_correct(), 0);
        assert!((record.mastery_score() - 0.21).abs() < 1e-9);
        assert_eq!(record.correct_count(), 1);
        assert_eq!(record.last_seen(), Some(fixed_now()));
    }

    #[test]
    fn mastery_requires_minimum_attempts() {
        let policy = MasteryPolicy::new(1.0, 0.85, 3).unwrap();
        let mut record = MasteryRecord::new(variables());

        record.apply_outcome(&policy, true, fixed_now());
        assert!((record.mastery_score() - 1.0).abs() < f64::EPSILON);
        assert!(!policy.is_mastered(&record));

        record.apply_outcome(&policy, true, fixed_now());
        assert!(!policy.is_mastered(&record));

        record.apply_outcome(&policy, true, fixed_now());
        assert!(policy.is_mastered(&record));
    }

    #[test]
    fn policy_rejects_invalid_parameters() {
        assert!(matches!(
            MasteryPolicy::new(0.0, 0.85, 3),
            Err(MasteryError::InvalidLearningRate { .. })
        ));
        assert!(matches!(
            MasteryPolicy::new(0.3, 1.2, 3),
            Err(MasteryError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn from_persisted_validates_counts_and_range() {
        assert!(matches!(
            MasteryRecord::from_persisted(variables(), 1.2, 1, 1, 1, None),
            Err(MasteryError::ScoreOutOfRange { .. })
        ));
        assert!(matches!(
            MasteryRecord::from_persisted(variables(), 0.5, 1, 2, 0, None),
            Err(MasteryError::CountMismatch { .. })
        ));
        assert!(matches!(
            MasteryRecord::from_persisted(variables(), 0.5, 3, 1, 2, None),
            Err(MasteryError::StreakMismatch { .. })
        ));
        assert!(MasteryRecord::from_persisted(variables(), 0.5, 3, 2, 1, None).is_ok());
    }

    proptest! {
        #[test]
        fn score_stays_bounded(
            outcomes in proptest::collection::vec(any::<bool>(), 0..200),
            rate in 0.01_f64..=1.0,
        ) {
            let policy = MasteryPolicy::new(rate, 0.85, 3).unwrap();
            let mut record = MasteryRecord::new(variables());
            for (i, correct) in outcomes.iter().enumerate() {
                record.apply_outcome(&policy, *correct, fixed_now());
                prop_assert!((0.0..=1.0).contains(&record.mastery_score()));
                prop_assert_eq!(record.attempt_count() as usize, i + 1);
            }
        }

        #[test]
        fn never_mastered_below_minimum_attempts(
            outcomes in proptest::collection::vec(any::<bool>(), 0..3),
            rate in 0.01_f64..=1.0,
        ) {
            let policy = MasteryPolicy::new(rate, 0.85, 3).unwrap();
            let mut record = MasteryRecord::new(variables());
            for correct in outcomes {
                record.apply_outcome(&policy, correct, fixed_now());
                prop_assert!(!policy.is_mastered(&record));
            }
        }
    }
}
