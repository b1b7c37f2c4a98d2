use serde::Serialize;

use crate::model::Level;

/// Completion of one level of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelProgress {
    pub level: Level,
    pub total: u32,
    pub attempted: u32,
    pub mastered: u32,
    /// Mastered share in percent, `0.0` when the level has no concepts.
    pub completion_percent: f64,
}

impl LevelProgress {
    #[must_use]
    pub fn empty(level: Level) -> Self {
        Self {
            level,
            total: 0,
            attempted: 0,
            mastered: 0,
            completion_percent: 0.0,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.mastered == self.total
    }
}

/// Read-only view derived from a learner's mastery records.
///
/// Never stored; recompute whenever the records change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub overall_level: Level,
    /// One entry per level, ascending.
    pub levels: Vec<LevelProgress>,
    pub total_concepts: u32,
    pub mastered_concepts: u32,
    pub total_attempts: u32,
    pub total_correct: u32,
    pub average_mastery: f64,
    /// Consecutive calendar days (UTC) with activity, ending today or yesterday.
    pub streak_days: u32,
    /// Longest run of consecutive correct answers currently held on any concept.
    pub best_correct_run: u32,
}

impl ProgressSnapshot {
    /// Snapshot for a learner with no catalog or no activity.
    #[must_use]
    pub fn zeroed() -> Self {
        Self {
            overall_level: Level::Beginner,
            levels: Level::ALL.iter().copied().map(LevelProgress::empty).collect(),
            total_concepts: 0,
            mastered_concepts: 0,
            total_attempts: 0,
            total_correct: 0,
            average_mastery: 0.0,
            streak_days: 0,
            best_correct_run: 0,
        }
    }

    #[must_use]
    pub fn level(&self, level: Level) -> Option<&LevelProgress> {
        self.levels.iter().find(|p| p.level == level)
    }

    /// Overall completion across every level, in percent.
    #[must_use]
    pub fn overall_completion_percent(&self) -> f64 {
        if self.total_concepts == 0 {
            0.0
        } else {
            f64::from(self.mastered_concepts) / f64::from(self.total_concepts) * 100.0
        }
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            f64::from(self.total_correct) / f64::from(self.total_attempts)
        }
    }
}
