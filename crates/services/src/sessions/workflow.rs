use std::sync::Arc;

use storage::repository::MasteryStore;
use study_core::model::{MasteryPolicy, MasteryState, ProgressSnapshot, UserId};
use study_core::scheduler::ReviewPolicy;
use study_core::{Clock, ConceptCatalog};

use super::config::SessionConfig;
use super::service::StudySession;
use crate::challenge_generator::ChallengeGenerator;
use crate::mastery_tracker::MasteryTracker;
use crate::progress_tracker::ProgressTracker;

/// Wires the catalog, the mastery store and the policies into sessions.
///
/// Each call to [`open_session`](Self::open_session) yields an isolated
/// tracker/session pair for one learner.
#[derive(Clone)]
pub struct SessionLoopService {
    clock: Clock,
    catalog: Arc<ConceptCatalog>,
    store: Arc<dyn MasteryStore>,
    mastery: MasteryPolicy,
    review: ReviewPolicy,
    config: SessionConfig,
    seed: Option<u64>,
}

impl SessionLoopService {
    #[must_use]
    pub fn new(clock: Clock, catalog: Arc<ConceptCatalog>, store: Arc<dyn MasteryStore>) -> Self {
        Self {
            clock,
            catalog,
            store,
            mastery: MasteryPolicy::default(),
            review: ReviewPolicy::default(),
            config: SessionConfig::default(),
            seed: None,
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

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed challenge generation for reproducible sessions.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &Arc<ConceptCatalog> {
        &self.catalog
    }

    /// Load the learner's mastery and build a session ready to start.
    ///
    /// A failed load does not prevent studying: the session runs memory-only
    /// and carries the warning in [`StudySession::warnings`].
    pub async fn open_session(&self, user: UserId) -> StudySession {
        let (tracker, warning) = MasteryTracker::load(user, Arc::clone(&self.store)).await;
        let tracker = tracker.with_policy(self.mastery).with_clock(self.clock);
        let generator = self
            .seed
            .map_or_else(ChallengeGenerator::from_entropy, ChallengeGenerator::seeded);

        let mut session = StudySession::new(Arc::clone(&self.catalog), tracker)
            .with_generator(generator)
            .with_review_policy(self.review)
            .with_config(self.config);
        if let Some(warning) = warning {
            session.push_warning(warning);
        }
        session
    }

    #[must_use]
    pub fn snapshot(&self, state: &MasteryState) -> ProgressSnapshot {
        ProgressTracker::new(&self.catalog)
            .with_policy(self.mastery)
            .with_clock(self.clock)
            .compute_snapshot(state)
    }
}
