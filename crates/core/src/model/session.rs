use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{ConceptId, Level, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionSummaryError {
    #[error("ended_at is before started_at")]
    InvalidTimeRange,

    #[error("too many events for a single session: {len}")]
    TooManyEvents { len: usize },
}

/// How a session reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Completed,
    Aborted,
}

/// One answered challenge inside a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub concept_id: ConceptId,
    pub template_id: String,
    pub difficulty: Level,
    pub response: String,
    pub is_correct: bool,
    /// False when the response was malformed and scored as incorrect.
    pub well_formed: bool,
    pub points_awarded: u32,
    pub mastery_before: f64,
    pub mastery_after: f64,
    pub answered_at: DateTime<Utc>,
}

/// Net change in mastery for a concept over a session.
#[derive(Debug, Clone, PartialEq)]
pub struct MasteryDelta {
    pub concept_id: ConceptId,
    pub before: f64,
    pub after: f64,
}

impl MasteryDelta {
    #[must_use]
    pub fn delta(&self) -> f64 {
        self.after - self.before
    }
}

/// Aggregate summary for a finished study session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    user_id: UserId,
    level: Level,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    end: SessionEnd,
    total: u32,
    correct: u32,
    score: u32,
    concepts_touched: Vec<ConceptId>,
    mastery_deltas: Vec<MasteryDelta>,
}

impl SessionSummary {
    /// Build a summary from the ordered event log of a session.
    ///
    /// Concepts are listed in first-touched order; each delta spans from the
    /// score before the first event to the score after the last one.
    ///
    /// # Errors
    ///
    /// Returns `SessionSummaryError::InvalidTimeRange` if `ended_at` is before `started_at`.
    /// Returns `SessionSummaryError::TooManyEvents` if the event count cannot fit in `u32`.
    pub fn from_events(
        user_id: UserId,
        level: Level,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        end: SessionEnd,
        events: &[SessionEvent],
    ) -> Result<Self, SessionSummaryError> {
        if ended_at < started_at {
            return Err(SessionSummaryError::InvalidTimeRange);
        }
        let total = u32::try_from(events.len())
            .map_err(|_| SessionSummaryError::TooManyEvents { len: events.len() })?;

        let mut correct = 0_u32;
        let mut score = 0_u32;
        let mut mastery_deltas: Vec<MasteryDelta> = Vec::new();

        for event in events {
            if event.is_correct {
                correct = correct.saturating_add(1);
            }
            score = score.saturating_add(event.points_awarded);

            match mastery_deltas
                .iter_mut()
                .find(|d| d.concept_id == event.concept_id)
            {
                Some(delta) => delta.after = event.mastery_after,
                None => mastery_deltas.push(MasteryDelta {
                    concept_id: event.concept_id.clone(),
                    before: event.mastery_before,
                    after: event.mastery_after,
                }),
            }
        }

        let concepts_touched = mastery_deltas.iter().map(|d| d.concept_id.clone()).collect();

        Ok(Self {
            user_id,
            level,
            started_at,
            ended_at,
            end,
            total,
            correct,
            score,
            concepts_touched,
            mastery_deltas,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    #[must_use]
    pub fn end(&self) -> SessionEnd {
        self.end
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn concepts_touched(&self) -> &[ConceptId] {
        &self.concepts_touched
    }

    #[must_use]
    pub fn mastery_deltas(&self) -> &[MasteryDelta] {
        &self.mastery_deltas
    }

    /// Fraction of correct answers, `0.0` for an empty session.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.total)
        }
    }
}
