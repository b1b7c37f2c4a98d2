use std::sync::Arc;

use chrono::{DateTime, Utc};
use study_core::model::{Challenge, Level, SessionEnd, SessionEvent, SessionSummary, UserId};
use study_core::scheduler::ReviewPolicy;
use study_core::{ConceptCatalog, ConceptSelector, SelectionReason, SelectorError};

use super::config::SessionConfig;
use super::progress::SessionProgress;
use crate::challenge_generator::ChallengeGenerator;
use crate::error::SessionError;
use crate::mastery_tracker::{MasteryTracker, StorageWarning};
use crate::scoring::score_response;

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    InProgress,
    Completed,
    Aborted,
}

/// The challenge currently shown, with the context it was selected in.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentedChallenge {
    pub challenge: Challenge,
    pub reason: SelectionReason,
    /// The concept came from another level than the one requested.
    pub fell_back: bool,
    hints_shown: usize,
}

impl PresentedChallenge {
    #[must_use]
    pub fn hints_shown(&self) -> usize {
        self.hints_shown
    }

    #[must_use]
    pub fn hints_remaining(&self) -> usize {
        self.challenge.hints.len().saturating_sub(self.hints_shown)
    }
}

/// What the caller learns after a response was scored.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseFeedback {
    pub event: SessionEvent,
    /// First accepted answer, for display after a miss.
    pub expected: Option<String>,
    pub newly_mastered: bool,
    pub warning: Option<StorageWarning>,
    pub state: SessionState,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One bounded, adaptive study session for a single learner.
///
/// `NotStarted → InProgress → Completed`, with `Aborted` as the other terminal
/// state. The session owns its event log and the learner's mastery tracker;
/// concepts are referenced by id from the shared catalog.
pub struct StudySession {
    catalog: Arc<ConceptCatalog>,
    tracker: MasteryTracker,
    generator: ChallengeGenerator,
    review: ReviewPolicy,
    config: SessionConfig,
    state: SessionState,
    level: Level,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    current: Option<PresentedChallenge>,
    events: Vec<SessionEvent>,
    score: u32,
    warnings: Vec<StorageWarning>,
}

impl StudySession {
    #[must_use]
    pub fn new(catalog: Arc<ConceptCatalog>, tracker: MasteryTracker) -> Self {
        Self {
            catalog,
            tracker,
            generator: ChallengeGenerator::default(),
            review: ReviewPolicy::default(),
            config: SessionConfig::default(),
            state: SessionState::NotStarted,
            level: Level::Beginner,
            started_at: None,
            ended_at: None,
            current: None,
            events: Vec::new(),
            score: 0,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_generator(mut self, generator: ChallengeGenerator) -> Self {
        self.generator = generator;
        self
    }

    #[must_use]
    pub fn with_review_policy(mut self, review: ReviewPolicy) -> Self {
        self.review = review;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Carry warnings raised before the session existed (e.g. a failed load).
    pub(crate) fn push_warning(&mut self, warning: StorageWarning) {
        self.warnings.push(warning);
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn user(&self) -> UserId {
        self.tracker.user()
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    #[must_use]
    pub fn events(&self) -> &[SessionEvent] {
        &self.events
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Storage warnings raised so far, oldest first.
    #[must_use]
    pub fn warnings(&self) -> &[StorageWarning] {
        &self.warnings
    }

    #[must_use]
    pub fn tracker(&self) -> &MasteryTracker {
        &self.tracker
    }

    #[must_use]
    pub fn catalog(&self) -> &ConceptCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn into_tracker(self) -> MasteryTracker {
        self.tracker
    }

    #[must_use]
    pub fn current_challenge(&self) -> Option<&PresentedChallenge> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Completed | SessionState::Aborted)
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let answered = u32::try_from(self.events.len()).unwrap_or(u32::MAX);
        let correct = u32::try_from(self.events.iter().filter(|e| e.is_correct).count())
            .unwrap_or(u32::MAX);
        SessionProgress {
            answered,
            correct,
            max_challenges: self.config.max_challenges(),
            remaining: self.config.max_challenges().saturating_sub(answered),
            score: self.score,
            is_finished: self.is_finished(),
        }
    }

    /// Step a fixed session clock forward. Has no effect on the system clock.
    pub fn advance_clock(&mut self, delta: chrono::Duration) {
        self.tracker.advance_clock(delta);
    }

    fn now(&self) -> DateTime<Utc> {
        self.tracker.clock().now()
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    /// Begin the session at `level` and prepare the first challenge.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is `NotStarted`.
    /// Returns `SessionError::Selector` when the catalog has nothing to study and
    /// `SessionError::Challenge` when the chosen concept has no usable content;
    /// both leave the session `Aborted`.
    pub fn start_study_session(&mut self, level: Level) -> Result<&PresentedChallenge, SessionError> {
        self.expect_state(SessionState::NotStarted)?;
        let now = self.now();
        self.level = level;
        self.started_at = Some(now);
        self.state = SessionState::InProgress;
        tracing::info!(user = %self.user(), %level, "study session started");

        if let Err(e) = self.prepare_next() {
            self.finish(SessionState::Aborted, now);
            return Err(e);
        }
        self.current.as_ref().ok_or(SessionError::NoCurrentChallenge)
    }

    /// Reveal the next hint of the current challenge, if any remain.
    pub fn next_hint(&mut self) -> Option<&str> {
        let current = self.current.as_mut()?;
        let hint = current.challenge.hints.get(current.hints_shown)?;
        current.hints_shown += 1;
        Some(hint.as_str())
    }

    /// Complete the session if its time budget is used up. Returns true when it did.
    pub fn check_time_budget(&mut self) -> bool {
        if self.state != SessionState::InProgress || !self.budget_exhausted() {
            return false;
        }
        tracing::info!(user = %self.user(), "session time budget used up");
        self.finish(SessionState::Completed, self.now());
        true
    }

    /// Time left before the budget runs out, `None` without a budget or outside `InProgress`.
    #[must_use]
    pub fn remaining_budget(&self) -> Option<chrono::Duration> {
        if self.state != SessionState::InProgress {
            return None;
        }
        let budget = self.config.time_budget()?;
        let started = self.started_at?;
        let elapsed = self.tracker.clock().elapsed_since(started);
        Some((budget - elapsed).max(chrono::Duration::zero()))
    }

    fn budget_exhausted(&self) -> bool {
        match (self.config.time_budget(), self.started_at) {
            (Some(budget), Some(started)) => self.tracker.clock().elapsed_since(started) >= budget,
            _ => false,
        }
    }

    /// Score `response` against the current challenge and move on.
    ///
    /// Malformed responses count as incorrect. Persistence failures switch the
    /// tracker to memory-only mode and come back as a warning in the feedback.
    /// The session completes when the challenge limit or time budget is reached,
    /// or when nothing is left to study.
    ///
    /// A response that arrives after the time budget ran out is not scored: the
    /// session completes without recording it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is `InProgress`,
    /// `SessionError::TimeBudgetExhausted` for a late response, and
    /// `SessionError::Challenge` if the next concept has no usable content
    /// (the session is then `Aborted`, with this response already recorded).
    pub async fn submit_response(&mut self, response: &str) -> Result<ResponseFeedback, SessionError> {
        self.expect_state(SessionState::InProgress)?;
        if self.check_time_budget() {
            return Err(SessionError::TimeBudgetExhausted);
        }
        let presented = self.current.take().ok_or(SessionError::NoCurrentChallenge)?;
        let challenge = presented.challenge;

        let outcome = score_response(&challenge, response);
        let update = self
            .tracker
            .record_response(&challenge.concept_id, outcome.is_correct)
            .await;
        let points = if outcome.is_correct { challenge.points } else { 0 };
        self.score = self.score.saturating_add(points);

        let event = SessionEvent {
            concept_id: challenge.concept_id.clone(),
            template_id: challenge.template_id.clone(),
            difficulty: challenge.difficulty,
            response: response.to_owned(),
            is_correct: outcome.is_correct,
            well_formed: outcome.well_formed,
            points_awarded: points,
            mastery_before: update.previous_score,
            mastery_after: update.record.mastery_score(),
            answered_at: update.record.last_seen().unwrap_or_else(|| self.now()),
        };
        self.events.push(event.clone());
        if let Some(warning) = &update.warning {
            self.warnings.push(warning.clone());
        }
        if update.newly_mastered {
            tracing::info!(user = %self.user(), concept = %challenge.concept_id, "concept mastered");
        }

        let reached_limit = self.events.len() >= self.config.max_challenges() as usize;
        if reached_limit || self.budget_exhausted() {
            self.finish(SessionState::Completed, self.now());
        } else {
            match self.prepare_next() {
                Ok(()) => {}
                Err(SessionError::Selector(SelectorError::NoConceptsAvailable { .. })) => {
                    tracing::info!(user = %self.user(), "nothing left to study, completing session");
                    self.finish(SessionState::Completed, self.now());
                }
                Err(e) => {
                    self.finish(SessionState::Aborted, self.now());
                    return Err(e);
                }
            }
        }

        Ok(ResponseFeedback {
            event,
            expected: challenge.expected.accepted().first().cloned(),
            newly_mastered: update.newly_mastered,
            warning: update.warning,
            state: self.state,
        })
    }

    /// Finish an in-progress session normally and summarize it.
    ///
    /// Calling this on a session that already completed on its own returns the
    /// same summary.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` for sessions that never started or were aborted.
    pub fn end_session(&mut self) -> Result<SessionSummary, SessionError> {
        match self.state {
            SessionState::InProgress => {
                self.finish(SessionState::Completed, self.now());
            }
            SessionState::Completed => {}
            actual => {
                return Err(SessionError::InvalidState {
                    expected: SessionState::InProgress,
                    actual,
                });
            }
        }
        self.summary()
    }

    /// Abandon an in-progress session. Answers already given stay recorded.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` unless the session is `InProgress`.
    pub fn abort(&mut self) -> Result<SessionSummary, SessionError> {
        self.expect_state(SessionState::InProgress)?;
        self.finish(SessionState::Aborted, self.now());
        self.summary()
    }

    /// Summary of a finished session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` while the session has not finished.
    pub fn summary(&self) -> Result<SessionSummary, SessionError> {
        let end = match self.state {
            SessionState::Completed => SessionEnd::Completed,
            SessionState::Aborted => SessionEnd::Aborted,
            actual => {
                return Err(SessionError::InvalidState {
                    expected: SessionState::Completed,
                    actual,
                });
            }
        };
        let (Some(started_at), Some(ended_at)) = (self.started_at, self.ended_at) else {
            return Err(SessionError::InvalidState {
                expected: SessionState::Completed,
                actual: self.state,
            });
        };
        Ok(SessionSummary::from_events(
            self.user(),
            self.level,
            started_at,
            ended_at,
            end,
            &self.events,
        )?)
    }

    fn finish(&mut self, state: SessionState, at: DateTime<Utc>) {
        self.state = state;
        // A system clock may step backwards mid-session.
        self.ended_at = Some(self.started_at.map_or(at, |started| at.max(started)));
        self.current = None;
        tracing::info!(
            user = %self.user(),
            ?state,
            answered = self.events.len(),
            score = self.score,
            "study session finished"
        );
    }

    fn prepare_next(&mut self) -> Result<(), SessionError> {
        let now = self.now();
        let catalog = Arc::clone(&self.catalog);
        let selector = ConceptSelector::new(&catalog)
            .with_mastery_policy(self.tracker.policy())
            .with_review_policy(self.review);
        let avoid = if self.config.avoid_repeats() {
            self.events.last().map(|e| &e.concept_id)
        } else {
            None
        };

        let selection = selector.select_next_avoiding(self.level, self.tracker.state(), now, avoid)?;
        if selection.fell_back {
            tracing::info!(
                requested = %self.level,
                used = %selection.level,
                concept = %selection.concept.id(),
                "no eligible concept at requested level"
            );
        }
        tracing::debug!(
            concept = %selection.concept.id(),
            reason = ?selection.reason,
            "concept selected"
        );

        let challenge = self
            .generator
            .generate_at_or_below(selection.concept, selection.level)?;
        self.current = Some(PresentedChallenge {
            challenge,
            reason: selection.reason,
            fell_back: selection.fell_back,
            hints_shown: 0,
        });
        Ok(())
    }
}
