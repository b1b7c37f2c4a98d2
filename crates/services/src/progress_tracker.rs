//! Long-term statistics and gamification signals derived from mastery records.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, NaiveDate, Utc};
use study_core::model::{
    LevelProgress, Level, MasteryPolicy, MasteryState, ProgressSnapshot, SessionEnd,
    SessionSummary,
};
use study_core::{Clock, ConceptCatalog};

/// Changes worth celebrating between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LevelUp {
    /// Levels that became fully mastered, ascending.
    pub completed_levels: Vec<Level>,
    /// Set when the overall level rose.
    pub new_overall_level: Option<Level>,
}

impl LevelUp {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.completed_levels.is_empty() && self.new_overall_level.is_none()
    }
}

/// Totals over a list of session summaries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryStats {
    pub sessions: u32,
    pub completed_sessions: u32,
    pub challenges: u32,
    pub correct: u32,
    pub total_score: u32,
    pub best_score: u32,
    pub last_session_at: Option<DateTime<Utc>>,
}

impl HistoryStats {
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.challenges == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.challenges)
        }
    }
}

/// Aggregates mastery state against a catalog. Pure apart from reading the clock.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTracker<'a> {
    catalog: &'a ConceptCatalog,
    policy: MasteryPolicy,
    clock: Clock,
}

impl<'a> ProgressTracker<'a> {
    #[must_use]
    pub fn new(catalog: &'a ConceptCatalog) -> Self {
        Self {
            catalog,
            policy: MasteryPolicy::default(),
            clock: Clock::default(),
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

    /// Derive a snapshot from `state`. Records for concepts outside the
    /// catalog are ignored; an empty catalog yields a zeroed snapshot.
    #[must_use]
    pub fn compute_snapshot(&self, state: &MasteryState) -> ProgressSnapshot {
        if self.catalog.is_empty() {
            return ProgressSnapshot::zeroed();
        }

        let mut levels: Vec<LevelProgress> =
            Level::ALL.iter().copied().map(LevelProgress::empty).collect();
        let mut score_sum = 0.0;
        let mut total_attempts = 0_u32;
        let mut total_correct = 0_u32;
        let mut best_correct_run = 0_u32;
        let mut active_days = BTreeSet::new();

        for concept in self.catalog.iter() {
            let Some(progress) = levels.iter_mut().find(|p| p.level == concept.level()) else {
                continue;
            };
            progress.total += 1;

            let Some(record) = state.get(concept.id()) else {
                continue;
            };
            if record.is_attempted() {
                progress.attempted += 1;
            }
            if self.policy.is_mastered(record) {
                progress.mastered += 1;
            }
            score_sum += record.mastery_score();
            total_attempts = total_attempts.saturating_add(record.attempt_count());
            total_correct = total_correct.saturating_add(record.correct_count());
            best_correct_run = best_correct_run.max(record.consecutive_correct());
            if let Some(seen) = record.last_seen() {
                active_days.insert(seen.date_naive());
            }
        }

        for progress in &mut levels {
            progress.completion_percent = if progress.total == 0 {
                0.0
            } else {
                f64::from(progress.mastered) / f64::from(progress.total) * 100.0
            };
        }

        let total_concepts: u32 = levels.iter().map(|p| p.total).sum();
        let mastered_concepts: u32 = levels.iter().map(|p| p.mastered).sum();

        ProgressSnapshot {
            overall_level: overall_level(&levels),
            levels,
            total_concepts,
            mastered_concepts,
            total_attempts,
            total_correct,
            average_mastery: score_sum / f64::from(total_concepts.max(1)),
            streak_days: streak_days(&active_days, self.clock.today()),
            best_correct_run,
        }
    }

    /// Compare two snapshots of the same learner.
    #[must_use]
    pub fn level_ups(before: &ProgressSnapshot, after: &ProgressSnapshot) -> LevelUp {
        let completed_levels = after
            .levels
            .iter()
            .filter(|p| p.is_complete())
            .filter(|p| !before.level(p.level).is_some_and(LevelProgress::is_complete))
            .map(|p| p.level)
            .collect();
        let new_overall_level =
            (after.overall_level > before.overall_level).then_some(after.overall_level);
        LevelUp {
            completed_levels,
            new_overall_level,
        }
    }

    #[must_use]
    pub fn history_stats(summaries: &[SessionSummary]) -> HistoryStats {
        summaries
            .iter()
            .fold(HistoryStats::default(), |mut stats, summary| {
                stats.sessions = stats.sessions.saturating_add(1);
                if summary.end() == SessionEnd::Completed {
                    stats.completed_sessions = stats.completed_sessions.saturating_add(1);
                }
                stats.challenges = stats.challenges.saturating_add(summary.total());
                stats.correct = stats.correct.saturating_add(summary.correct());
                stats.total_score = stats.total_score.saturating_add(summary.score());
                stats.best_score = stats.best_score.max(summary.score());
                stats.last_session_at = stats.last_session_at.max(Some(summary.ended_at()));
                stats
            })
    }
}

/// Lowest level with concepts that is not fully mastered; `Expert` once every
/// populated level is complete.
fn overall_level(levels: &[LevelProgress]) -> Level {
    levels
        .iter()
        .find(|p| p.total > 0 && !p.is_complete())
        .map_or(Level::Expert, |p| p.level)
}

/// Consecutive active days ending today, or yesterday when today has no activity yet.
fn streak_days(active: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let yesterday = today.checked_sub_days(Days::new(1));
    let mut cursor = if active.contains(&today) {
        Some(today)
    } else if yesterday.is_some_and(|d| active.contains(&d)) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0_u32;
    while let Some(day) = cursor.filter(|d| active.contains(d)) {
        streak += 1;
        cursor = day.checked_sub_days(Days::new(1));
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use study_core::model::{
        ConceptCategory, ConceptDraft, ConceptId, MasteryRecord, SessionEvent, UserId,
    };
    use study_core::time::{fixed_clock, fixed_now};

    fn catalog() -> ConceptCatalog {
        let concept = |id: &str, level| {
            ConceptDraft::new(
                ConceptId::new(id).unwrap(),
                id,
                level,
                ConceptCategory::Basics,
                "about",
            )
            .validate()
            .unwrap()
        };
        ConceptCatalog::new(vec![
            concept("a", Level::Beginner),
            concept("b", Level::Beginner),
            concept("c", Level::Intermediate),
        ])
        .unwrap()
    }

    fn record(id: &str, outcomes: &[bool], at: DateTime<Utc>) -> (ConceptId, MasteryRecord) {
        let policy = MasteryPolicy::new(1.0, 0.85, 3).unwrap();
        let id = ConceptId::new(id).unwrap();
        let mut record = MasteryRecord::new(id.clone());
        for correct in outcomes {
            record.apply_outcome(&policy, *correct, at);
        }
        (id, record)
    }

    fn tracker(catalog: &ConceptCatalog) -> ProgressTracker<'_> {
        ProgressTracker::new(catalog)
            .with_policy(MasteryPolicy::new(1.0, 0.85, 3).unwrap())
            .with_clock(fixed_clock())
    }

    #[test]
    fn empty_catalog_gives_zeroed_snapshot() {
        let catalog = ConceptCatalog::default();
        let snapshot = ProgressTracker::new(&catalog).compute_snapshot(&MasteryState::new());
        assert_eq!(snapshot, ProgressSnapshot::zeroed());
    }

    #[test]
    fn snapshot_counts_levels_and_mastery() {
        let catalog = catalog();
        let now = fixed_now();
        let state: MasteryState = [
            record("a", &[true, true, true], now),
            record("b", &[true, false], now),
            record("zzz", &[true], now),
        ]
        .into_iter()
        .collect();

        let snapshot = tracker(&catalog).compute_snapshot(&state);
        let beginner = snapshot.level(Level::Beginner).unwrap();
        assert_eq!(beginner.total, 2);
        assert_eq!(beginner.attempted, 2);
        assert_eq!(beginner.mastered, 1);
        assert!((beginner.completion_percent - 50.0).abs() < 1e-9);
        assert_eq!(snapshot.total_concepts, 3);
        assert_eq!(snapshot.total_attempts, 5);
        assert_eq!(snapshot.total_correct, 4);
        assert_eq!(snapshot.best_correct_run, 3);
        assert_eq!(snapshot.overall_level, Level::Beginner);
        assert!((snapshot.average_mastery - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn completing_beginner_raises_overall_level() {
        let catalog = catalog();
        let tracker = tracker(&catalog);
        let now = fixed_now();

        let before_state: MasteryState = [record("a", &[true, true, true], now)].into_iter().collect();
        let mut after_state = before_state.clone();
        let (id, rec) = record("b", &[true, true, true], now);
        after_state.insert(id, rec);

        let before = tracker.compute_snapshot(&before_state);
        let after = tracker.compute_snapshot(&after_state);
        assert_eq!(after.overall_level, Level::Intermediate);

        let up = ProgressTracker::level_ups(&before, &after);
        assert_eq!(up.completed_levels, vec![Level::Beginner]);
        assert_eq!(up.new_overall_level, Some(Level::Intermediate));
        assert!(ProgressTracker::level_ups(&after, &after).is_empty());
    }

    #[test]
    fn streak_counts_consecutive_days() {
        let catalog = catalog();
        let now = fixed_now();
        let state: MasteryState = [
            record("a", &[true], now - Duration::days(1)),
            record("b", &[true], now - Duration::days(2)),
            record("c", &[true], now - Duration::days(4)),
        ]
        .into_iter()
        .collect();
        assert_eq!(tracker(&catalog).compute_snapshot(&state).streak_days, 2);

        let stale: MasteryState = [record("a", &[true], now - Duration::days(3))]
            .into_iter()
            .collect();
        assert_eq!(tracker(&catalog).compute_snapshot(&stale).streak_days, 0);
    }

    #[test]
    fn history_stats_aggregate_summaries() {
        let now = fixed_now();
        let event = |correct: bool| SessionEvent {
            concept_id: ConceptId::new("a").unwrap(),
            template_id: "a_1".into(),
            difficulty: Level::Beginner,
            response: "x".into(),
            is_correct: correct,
            well_formed: true,
            points_awarded: if correct { 10 } else { 0 },
            mastery_before: 0.0,
            mastery_after: 0.3,
            answered_at: now,
        };
        let first = SessionSummary::from_events(
            UserId::new(1),
            Level::Beginner,
            now,
            now,
            SessionEnd::Completed,
            &[event(true), event(false)],
        )
        .unwrap();
        let second = SessionSummary::from_events(
            UserId::new(1),
            Level::Beginner,
            now,
            now + Duration::hours(1),
            SessionEnd::Aborted,
            &[event(true), event(true)],
        )
        .unwrap();

        let stats = ProgressTracker::history_stats(&[first, second]);
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.completed_sessions, 1);
        assert_eq!(stats.challenges, 4);
        assert_eq!(stats.best_score, 20);
        assert_eq!(stats.total_score, 30);
        assert!((stats.accuracy() - 0.75).abs() < 1e-9);
        assert_eq!(stats.last_session_at, Some(now + Duration::hours(1)));
    }

    proptest::proptest! {
        #[test]
        fn snapshot_is_stable_for_unchanged_state(
            entries in proptest::collection::vec(
                (0_usize..4, proptest::collection::vec(proptest::bool::ANY, 0..6), 0_i64..5),
                0..8,
            ),
        ) {
            let catalog = catalog();
            let ids = ["a", "b", "c", "zzz"];
            let state: MasteryState = entries
                .iter()
                .map(|(idx, outcomes, days)| {
                    record(ids[*idx], outcomes, fixed_now() - Duration::days(*days))
                })
                .collect();

            let tracker = tracker(&catalog);
            let first = tracker.compute_snapshot(&state);
            let second = tracker.compute_snapshot(&state);
            proptest::prop_assert_eq!(&first, &second);
            proptest::prop_assert!(first.mastered_concepts <= first.total_concepts);
        }
    }
}
