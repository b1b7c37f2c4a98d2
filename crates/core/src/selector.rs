//! Next-concept selection.
//!
//! Candidates at a level are the concepts that are not yet mastered, plus
//! mastered concepts whose review interval has elapsed. Among candidates the
//! order is:
//!
//! 1. never attempted
//! 2. due for review
//! 3. lower mastery score (larger mastery gap)
//! 4. higher difficulty weight
//! 5. catalog order
//!
//! When the requested level has no candidates the selector degrades to lower
//! levels first and only then moves up to higher ones.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::catalog::ConceptCatalog;
use crate::model::{ConceptId, LearningConcept, Level, MasteryPolicy, MasteryState};
use crate::scheduler::{ReviewPolicy, ReviewStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("no concepts available (requested level: {requested})")]
    NoConceptsAvailable { requested: Level },
}

/// Why a concept was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    New,
    DueForReview,
    Reinforce,
}

/// The chosen concept and some context for logging and display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection<'a> {
    pub concept: &'a LearningConcept,
    pub reason: SelectionReason,
    /// Level the concept was taken from; differs from the request on fallback.
    pub level: Level,
    pub fell_back: bool,
}

#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    concept: &'a LearningConcept,
    position: usize,
    reason: SelectionReason,
    score: f64,
}

impl Candidate<'_> {
    fn tier(&self) -> u8 {
        match self.reason {
            SelectionReason::New => 0,
            SelectionReason::DueForReview => 1,
            SelectionReason::Reinforce => 2,
        }
    }

    fn priority_cmp(&self, other: &Self) -> Ordering {
        self.tier()
            .cmp(&other.tier())
            .then_with(|| self.score.total_cmp(&other.score))
            .then_with(|| {
                other
                    .concept
                    .difficulty_weight()
                    .total_cmp(&self.concept.difficulty_weight())
            })
            .then_with(|| self.position.cmp(&other.position))
    }
}

/// Chooses the next concept to study from a read-only catalog.
#[derive(Debug, Clone, Copy)]
pub struct ConceptSelector<'a> {
    catalog: &'a ConceptCatalog,
    mastery: MasteryPolicy,
    review: ReviewPolicy,
}

impl<'a> ConceptSelector<'a> {
    #[must_use]
    pub fn new(catalog: &'a ConceptCatalog) -> Self {
        Self {
            catalog,
            mastery: MasteryPolicy::default(),
            review: ReviewPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_mastery_policy(mut self, policy: MasteryPolicy) -> Self {
        self.mastery = policy;
        self
    }

    #[must_use]
    pub fn with_review_policy(mut self, policy: ReviewPolicy) -> Self {
        self.review = policy;
        self
    }

    /// Pick the highest-priority concept for `level`.
    ///
    /// # Errors
    ///
    /// Returns `SelectorError::NoConceptsAvailable` when no level of the catalog
    /// has a candidate.
    pub fn select_next(
        &self,
        level: Level,
        mastery: &MasteryState,
        now: DateTime<Utc>,
    ) -> Result<Selection<'a>, SelectorError> {
        self.select_next_avoiding(level, mastery, now, None)
    }

    /// Like [`select_next`](Self::select_next), but skips `avoid` whenever
    /// another candidate exists at the same level.
    ///
    /// # Errors
    ///
    /// Returns `SelectorError::NoConceptsAvailable` when no level of the catalog
    /// has a candidate.
    pub fn select_next_avoiding(
        &self,
        level: Level,
        mastery: &MasteryState,
        now: DateTime<Utc>,
        avoid: Option<&ConceptId>,
    ) -> Result<Selection<'a>, SelectorError> {
        for candidate_level in level.fallback_order() {
            let mut candidates = self.candidates(candidate_level, mastery, now);
            if candidates.is_empty() {
                continue;
            }
            candidates.sort_by(|a, b| a.priority_cmp(b));

            let chosen = candidates
                .iter()
                .find(|c| avoid != Some(c.concept.id()))
                .unwrap_or(&candidates[0]);

            return Ok(Selection {
                concept: chosen.concept,
                reason: chosen.reason,
                level: candidate_level,
                fell_back: candidate_level != level,
            });
        }

        Err(SelectorError::NoConceptsAvailable { requested: level })
    }

    /// Candidates at exactly `level`, unordered.
    fn candidates(
        &self,
        level: Level,
        mastery: &MasteryState,
        now: DateTime<Utc>,
    ) -> Vec<Candidate<'a>> {
        self.catalog
            .by_level(level)
            .filter_map(|concept| {
                let record = mastery.get(concept.id());
                let status = self.review.status(record, now);
                let mastered = record.is_some_and(|r| self.mastery.is_mastered(r));

                let reason = match status {
                    ReviewStatus::New => SelectionReason::New,
                    ReviewStatus::Due { .. } => SelectionReason::DueForReview,
                    ReviewStatus::Scheduled { .. } if mastered => return None,
                    ReviewStatus::Scheduled { .. } => SelectionReason::Reinforce,
                };

                Some(Candidate {
                    concept,
                    position: self.catalog.position(concept.id()).unwrap_or(usize::MAX),
                    reason,
                    score: record.map_or(0.0, |r| r.mastery_score()),
                })
            })
            .collect()
    }

    /// True when every concept at `level` is mastered (and the level is non-empty).
    #[must_use]
    pub fn level_mastered(&self, level: Level, mastery: &MasteryState) -> bool {
        let mut concepts = self.catalog.by_level(level).peekable();
        concepts.peek().is_some()
            && concepts.all(|c| {
                mastery
                    .get(c.id())
                    .is_some_and(|r| self.mastery.is_mastered(r))
            })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConceptCategory, ConceptDraft, MasteryRecord};
    use crate::time::fixed_now;
    use chrono::Duration;
    use proptest::prelude::*;

    fn id(s: &str) -> ConceptId {
        ConceptId::new(s).unwrap()
    }

    fn concept(name: &str, level: Level, weight: f64) -> LearningConcept {
        ConceptDraft::new(
            id(name),
            name,
            level,
            ConceptCategory::Basics,
            format!("About {name}"),
        )
        .with_weight(weight)
        .validate()
        .unwrap()
    }

    fn record(name: &str, outcomes: &[bool], at: DateTime<Utc>) -> MasteryRecord {
        let policy = MasteryPolicy::default();
        let mut r = MasteryRecord::new(id(name));
        for &o in outcomes {
            r.apply_outcome(&policy, o, at);
        }
        r
    }

    fn mastered(name: &str, at: DateTime<Utc>) -> MasteryRecord {
        MasteryRecord::from_persisted(id(name), 0.95, 5, 5, 5, Some(at)).unwrap()
    }

    fn state(records: Vec<MasteryRecord>) -> MasteryState {
        records
            .into_iter()
            .map(|r| (r.concept_id().clone(), r))
            .collect()
    }

    #[test]
    fn unattempted_ties_break_on_difficulty_weight() {
        let catalog = ConceptCatalog::new(vec![
            concept("b", Level::Beginner, 0.2),
            concept("a", Level::Beginner, 0.8),
        ])
        .unwrap();
        let selector = ConceptSelector::new(&catalog);

        let pick = selector
            .select_next(Level::Beginner, &MasteryState::new(), fixed_now())
            .unwrap();
        assert_eq!(pick.concept.id(), &id("a"));
        assert_eq!(pick.reason, SelectionReason::New);
        assert!(!pick.fell_back);
    }

    #[test]
    fn equal_weights_fall_back_to_catalog_order() {
        let catalog = ConceptCatalog::new(vec![
            concept("first", Level::Beginner, 0.5),
            concept("second", Level::Beginner, 0.5),
        ])
        .unwrap();
        let pick = ConceptSelector::new(&catalog)
            .select_next(Level::Beginner, &MasteryState::new(), fixed_now())
            .unwrap();
        assert_eq!(pick.concept.id(), &id("first"));
    }

    #[test]
    fn never_attempted_beats_due() {
        let now = fixed_now();
        let catalog = ConceptCatalog::new(vec![
            concept("seen", Level::Beginner, 1.0),
            concept("fresh", Level::Beginner, 0.1),
        ])
        .unwrap();
        let mastery = state(vec![record("seen", &[false], now - Duration::days(10))]);

        let pick = ConceptSelector::new(&catalog)
            .select_next(Level::Beginner, &mastery, now)
            .unwrap();
        assert_eq!(pick.concept.id(), &id("fresh"));
    }

    #[test]
    fn due_beats_recently_seen_and_weak_concepts_resurface() {
        let now = fixed_now();
        let catalog = ConceptCatalog::new(vec![
            concept("recent_weak", Level::Beginner, 0.5),
            concept("old_strong", Level::Beginner, 0.5),
            concept("recent_mid", Level::Beginner, 0.5),
        ])
        .unwrap();
        let selector = ConceptSelector::new(&catalog);

        let mastery = state(vec![
            record("recent_weak", &[false], now),
            record("old_strong", &[true, true], now - Duration::days(5)),
            record("recent_mid", &[true], now),
        ]);
        let pick = selector.select_next(Level::Beginner, &mastery, now).unwrap();
        assert_eq!(pick.concept.id(), &id("old_strong"));
        assert_eq!(pick.reason, SelectionReason::DueForReview);

        let mastery = state(vec![
            record("recent_weak", &[false], now),
            record("old_strong", &[true, true], now),
            record("recent_mid", &[true], now),
        ]);
        let pick = selector.select_next(Level::Beginner, &mastery, now).unwrap();
        assert_eq!(pick.concept.id(), &id("recent_weak"));
        assert_eq!(pick.reason, SelectionReason::Reinforce);
    }

    #[test]
    fn mastered_beginner_falls_back_to_intermediate() {
        let now = fixed_now();
        let catalog = ConceptCatalog::new(vec![
            concept("variables", Level::Beginner, 0.5),
            concept("loops", Level::Beginner, 0.5),
            concept("closures", Level::Intermediate, 0.5),
        ])
        .unwrap();
        let mastery = state(vec![mastered("variables", now), mastered("loops", now)]);

        let selector = ConceptSelector::new(&catalog);
        assert!(selector.level_mastered(Level::Beginner, &mastery));

        let pick = selector.select_next(Level::Beginner, &mastery, now).unwrap();
        assert_eq!(pick.concept.id(), &id("closures"));
        assert_eq!(pick.level, Level::Intermediate);
        assert!(pick.fell_back);
    }

    #[test]
    fn mastered_but_due_stays_at_requested_level() {
        let now = fixed_now();
        let catalog = ConceptCatalog::new(vec![
            concept("variables", Level::Beginner, 0.5),
            concept("closures", Level::Intermediate, 0.5),
        ])
        .unwrap();
        let mastery = state(vec![mastered("variables", now - Duration::days(365))]);

        let pick = ConceptSelector::new(&catalog)
            .select_next(Level::Beginner, &mastery, now)
            .unwrap();
        assert_eq!(pick.concept.id(), &id("variables"));
        assert_eq!(pick.reason, SelectionReason::DueForReview);
    }

    #[test]
    fn expert_degrades_to_lower_levels_before_failing() {
        let now = fixed_now();
        let catalog = ConceptCatalog::new(vec![
            concept("variables", Level::Beginner, 0.5),
            concept("closures", Level::Intermediate, 0.5),
        ])
        .unwrap();
        let pick = ConceptSelector::new(&catalog)
            .select_next(Level::Expert, &MasteryState::new(), now)
            .unwrap();
        assert_eq!(pick.level, Level::Intermediate);
    }

    #[test]
    fn exhausted_catalog_errors() {
        let now = fixed_now();
        let catalog = ConceptCatalog::new(vec![concept("variables", Level::Beginner, 0.5)]).unwrap();
        let mastery = state(vec![mastered("variables", now)]);

        let err = ConceptSelector::new(&catalog)
            .select_next(Level::Beginner, &mastery, now)
            .unwrap_err();
        assert_eq!(
            err,
            SelectorError::NoConceptsAvailable {
                requested: Level::Beginner
            }
        );

        let empty = ConceptCatalog::default();
        assert!(
            ConceptSelector::new(&empty)
                .select_next(Level::Expert, &MasteryState::new(), now)
                .is_err()
        );
    }

    #[test]
    fn avoid_skips_last_concept_when_alternative_exists() {
        let now = fixed_now();
        let catalog = ConceptCatalog::new(vec![
            concept("a", Level::Beginner, 0.5),
            concept("b", Level::Beginner, 0.5),
        ])
        .unwrap();
        let mastery = state(vec![record("a", &[false], now), record("b", &[true], now)]);
        let selector = ConceptSelector::new(&catalog);

        let plain = selector.select_next(Level::Beginner, &mastery, now).unwrap();
        assert_eq!(plain.concept.id(), &id("a"));

        let avoided = selector
            .select_next_avoiding(Level::Beginner, &mastery, now, Some(&id("a")))
            .unwrap();
        assert_eq!(avoided.concept.id(), &id("b"));

        let only = ConceptCatalog::new(vec![concept("a", Level::Beginner, 0.5)]).unwrap();
        let pick = ConceptSelector::new(&only)
            .select_next_avoiding(Level::Beginner, &mastery, now, Some(&id("a")))
            .unwrap();
        assert_eq!(pick.concept.id(), &id("a"));
    }

    proptest! {
        #[test]
        fn never_returns_higher_level_while_lower_candidates_exist(
            levels in proptest::collection::vec(0_u8..3, 1..12),
            mastered_mask in proptest::collection::vec(any::<bool>(), 12),
            requested in 0_u8..3,
        ) {
            let to_level = |n: u8| Level::ALL[usize::from(n)];
            let now = fixed_now();
            let concepts: Vec<_> = levels
                .iter()
                .enumerate()
                .map(|(i, &l)| concept(&format!("c{i}"), to_level(l), 0.5))
                .collect();
            let catalog = ConceptCatalog::new(concepts).unwrap();
            let mastery = state(
                (0..levels.len())
                    .filter(|&i| mastered_mask[i])
                    .map(|i| mastered(&format!("c{i}"), now))
                    .collect(),
            );
            let requested = to_level(requested);
            let has_lower_or_equal_candidate = levels
                .iter()
                .enumerate()
                .any(|(i, &l)| to_level(l) <= requested && !mastered_mask[i]);

            match ConceptSelector::new(&catalog).select_next(requested, &mastery, now) {
                Ok(pick) => {
                    if has_lower_or_equal_candidate {
                        prop_assert!(pick.concept.level() <= requested);
                    }
                    prop_assert!(!mastered_mask[catalog.position(pick.concept.id()).unwrap()]);
                }
                Err(SelectorError::NoConceptsAvailable { .. }) => {
                    prop_assert!(mastered_mask.iter().take(levels.len()).all(|m| *m));
                }
            }
        }
    }
}
