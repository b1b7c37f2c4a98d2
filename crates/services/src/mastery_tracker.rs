use std::fmt;
use std::sync::Arc;

use storage::repository::{MasteryStore, StorageError};
use study_core::Clock;
use study_core::model::{ConceptId, MasteryPolicy, MasteryRecord, MasteryState, UserId};

/// Persistence failure that was absorbed by switching to memory-only mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageWarning {
    pub user: UserId,
    pub message: String,
}

impl StorageWarning {
    fn from_error(user: UserId, error: &StorageError) -> Self {
        Self {
            user,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for StorageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "progress for user {} is no longer being saved: {}",
            self.user, self.message
        )
    }
}

/// Where the latest mastery change ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    Saved,
    MemoryOnly,
}

/// Outcome of recording one response.
#[derive(Debug, Clone, PartialEq)]
pub struct MasteryUpdate {
    pub record: MasteryRecord,
    pub previous_score: f64,
    /// The concept crossed the mastery criterion with this response.
    pub newly_mastered: bool,
    pub persistence: Persistence,
    /// Set only on the response whose save failed.
    pub warning: Option<StorageWarning>,
}

/// Owns one learner's concept → record mapping and keeps the store in sync.
///
/// After the first storage failure the tracker stops writing and keeps
/// updating in memory for the rest of its lifetime.
pub struct MasteryTracker {
    user: UserId,
    policy: MasteryPolicy,
    clock: Clock,
    state: MasteryState,
    store: Option<Arc<dyn MasteryStore>>,
}

impl MasteryTracker {
    /// Tracker that never persists.
    #[must_use]
    pub fn in_memory(user: UserId, state: MasteryState) -> Self {
        Self {
            user,
            policy: MasteryPolicy::default(),
            clock: Clock::default(),
            state,
            store: None,
        }
    }

    /// Load the learner's state from `store`.
    ///
    /// A failed load yields an empty memory-only tracker and a warning.
    pub async fn load(
        user: UserId,
        store: Arc<dyn MasteryStore>,
    ) -> (Self, Option<StorageWarning>) {
        match store.load_mastery(user).await {
            Ok(state) => {
                tracing::debug!(user = %user, records = state.len(), "mastery loaded");
                let mut tracker = Self::in_memory(user, state);
                tracker.store = Some(store);
                (tracker, None)
            }
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "mastery load failed, continuing in memory");
                let warning = StorageWarning::from_error(user, &e);
                (Self::in_memory(user, MasteryState::new()), Some(warning))
            }
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: MasteryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    #[must_use]
    pub fn policy(&self) -> MasteryPolicy {
        self.policy
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn state(&self) -> &MasteryState {
        &self.state
    }

    #[must_use]
    pub fn record(&self, concept: &ConceptId) -> Option<&MasteryRecord> {
        self.state.get(concept)
    }

    #[must_use]
    pub fn score(&self, concept: &ConceptId) -> f64 {
        self.record(concept).map_or(0.0, MasteryRecord::mastery_score)
    }

    #[must_use]
    pub fn is_mastered(&self, concept: &ConceptId) -> bool {
        self.record(concept)
            .is_some_and(|r| self.policy.is_mastered(r))
    }

    #[must_use]
    pub fn is_memory_only(&self) -> bool {
        self.store.is_none()
    }

    pub(crate) fn advance_clock(&mut self, delta: chrono::Duration) {
        self.clock.advance(delta);
    }

    /// Apply one completed challenge and persist the whole mapping.
    ///
    /// Creates the record on first exposure. A failed save is reported through
    /// `MasteryUpdate::warning` and never undoes the in-memory update.
    pub async fn record_response(&mut self, concept: &ConceptId, is_correct: bool) -> MasteryUpdate {
        let now = self.clock.now();
        let policy = self.policy;
        let record = self
            .state
            .entry(concept.clone())
            .or_insert_with(|| MasteryRecord::new(concept.clone()));

        let was_mastered = policy.is_mastered(record);
        let previous_score = record.mastery_score();
        record.apply_outcome(&policy, is_correct, now);
        let record = record.clone();
        let newly_mastered = !was_mastered && policy.is_mastered(&record);

        tracing::debug!(
            user = %self.user,
            concept = %concept,
            is_correct,
            before = previous_score,
            after = record.mastery_score(),
            "mastery updated"
        );

        let (persistence, warning) = self.persist().await;
        MasteryUpdate {
            record,
            previous_score,
            newly_mastered,
            persistence,
            warning,
        }
    }

    async fn persist(&mut self) -> (Persistence, Option<StorageWarning>) {
        let Some(store) = self.store.as_ref() else {
            return (Persistence::MemoryOnly, None);
        };
        match store.save_mastery(self.user, &self.state).await {
            Ok(()) => (Persistence::Saved, None),
            Err(e) => {
                tracing::warn!(
                    user = %self.user,
                    error = %e,
                    "mastery save failed, switching to memory-only mode"
                );
                self.store = None;
                (
                    Persistence::MemoryOnly,
                    Some(StorageWarning::from_error(self.user, &e)),
                )
            }
        }
    }

    #[must_use]
    pub fn into_state(self) -> MasteryState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;
    use study_core::time::fixed_clock;

    fn concept() -> ConceptId {
        ConceptId::new("python_variables_beginner").unwrap()
    }

    #[tokio::test]
    async fn two_correct_answers_reach_point_51_and_persist() {
        let repo = Arc::new(InMemoryRepository::new());
        let (tracker, warning) = MasteryTracker::load(UserId::new(1), repo.clone()).await;
        assert!(warning.is_none());
        let mut tracker = tracker.with_clock(fixed_clock());

        let first = tracker.record_response(&concept(), true).await;
        assert!((first.record.mastery_score() - 0.3).abs() < 1e-9);
        assert!(first.previous_score.abs() < f64::EPSILON);
        assert_eq!(first.persistence, Persistence::Saved);

        let second = tracker.record_response(&concept(), true).await;
        assert!((second.record.mastery_score() - 0.51).abs() < 1e-9);
        assert_eq!(second.record.attempt_count(), 2);

        let stored = repo.load_mastery(UserId::new(1)).await.unwrap();
        assert!((stored[&concept()].mastery_score() - 0.51).abs() < 1e-9);
    }

    #[tokio::test]
    async fn incorrect_answer_resets_streak() {
        let mut tracker = MasteryTracker::in_memory(UserId::new(1), MasteryState::new());
        tracker.record_response(&concept(), true).await;
        tracker.record_response(&concept(), true).await;
        let update = tracker.record_response(&concept(), false).await;
        assert_eq!(update.record.consecutive_correct(), 0);
        assert_eq!(update.record.correct_count(), 2);
        assert_eq!(update.persistence, Persistence::MemoryOnly);
        assert!(update.warning.is_none());
    }

    #[tokio::test]
    async fn mastery_needs_three_attempts_and_threshold() {
        let policy = MasteryPolicy::new(0.9, 0.85, 3).unwrap();
        let mut tracker =
            MasteryTracker::in_memory(UserId::new(1), MasteryState::new()).with_policy(policy);

        let first = tracker.record_response(&concept(), true).await;
        assert!(first.record.mastery_score() >= 0.85);
        assert!(!first.newly_mastered);

        tracker.record_response(&concept(), true).await;
        let third = tracker.record_response(&concept(), true).await;
        assert!(third.newly_mastered);
        assert!(tracker.is_mastered(&concept()));

        let fourth = tracker.record_response(&concept(), true).await;
        assert!(!fourth.newly_mastered);
    }
}
