use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::MasteryRecord;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("base review interval must be positive")]
    InvalidBaseInterval,
    #[error("maximum review interval must be >= base interval")]
    InvalidIntervalBounds,
}

//
// ─── REVIEW POLICY ─────────────────────────────────────────────────────────────
//

/// Spaced-review policy with geometrically growing intervals.
///
/// After `n` consecutive correct answers a concept is next due once
/// `base_interval × 2^n` has elapsed since it was last seen, capped at
/// `max_interval`. A wrong answer resets `n` and therefore the interval.
///
/// # Examples
///
/// ```
/// # use study_core::scheduler::ReviewPolicy;
/// let policy = ReviewPolicy::default();
/// assert_eq!(policy.interval_for(0), chrono::Duration::days(1));
/// assert_eq!(policy.interval_for(3), chrono::Duration::days(8));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewPolicy {
    base_interval: Duration,
    max_interval: Duration,
}

/// Due-ness of a concept at a given moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    /// Never attempted.
    New,
    /// Interval elapsed; `overdue` is the time past the due moment.
    Due { overdue: Duration },
    /// Seen recently; due at `due_at`.
    Scheduled { due_at: DateTime<Utc> },
}

impl ReviewStatus {
    #[must_use]
    pub fn is_due(&self) -> bool {
        matches!(self, ReviewStatus::Due { .. })
    }
}

impl ReviewPolicy {
    /// Doubling exponent beyond which the interval is always capped.
    const MAX_DOUBLINGS: u32 = 20;

    /// Create a policy with custom bounds.
    ///
    /// # Errors
    ///
    /// - `InvalidBaseInterval` if `base_interval` is zero or negative
    /// - `InvalidIntervalBounds` if `max_interval < base_interval`
    pub fn new(base_interval: Duration, max_interval: Duration) -> Result<Self, SchedulerError> {
        if base_interval <= Duration::zero() {
            return Err(SchedulerError::InvalidBaseInterval);
        }
        if max_interval < base_interval {
            return Err(SchedulerError::InvalidIntervalBounds);
        }
        Ok(Self {
            base_interval,
            max_interval,
        })
    }

    #[must_use]
    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    #[must_use]
    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Review interval after `consecutive_correct` correct answers in a row.
    #[must_use]
    pub fn interval_for(&self, consecutive_correct: u32) -> Duration {
        let exponent = consecutive_correct.min(Self::MAX_DOUBLINGS);
        let factor = 1_i32 << exponent;
        self.base_interval
            .checked_mul(factor)
            .map_or(self.max_interval, |interval| interval.min(self.max_interval))
    }

    /// When the record next becomes due, `None` for a never-attempted concept.
    #[must_use]
    pub fn due_at(&self, record: &MasteryRecord) -> Option<DateTime<Utc>> {
        if !record.is_attempted() {
            return None;
        }
        record
            .last_seen()
            .map(|seen| seen + self.interval_for(record.consecutive_correct()))
    }

    /// Classify a record (or its absence) at `now`.
    #[must_use]
    pub fn status(&self, record: Option<&MasteryRecord>, now: DateTime<Utc>) -> ReviewStatus {
        let Some(record) = record.filter(|r| r.is_attempted()) else {
            return ReviewStatus::New;
        };
        match self.due_at(record) {
            // Attempted but never timestamped: treat as long overdue.
            None => ReviewStatus::Due {
                overdue: self.max_interval,
            },
            Some(due_at) if now - due_at > Duration::zero() => ReviewStatus::Due {
                overdue: now - due_at,
            },
            Some(due_at) => ReviewStatus::Scheduled { due_at },
        }
    }
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            base_interval: Duration::days(1),
            max_interval: Duration::days(60),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
