#![forbid(unsafe_code)]

pub mod app_services;
pub mod challenge_generator;
pub mod error;
pub mod mastery_tracker;
pub mod progress_tracker;
pub mod scoring;
pub mod sessions;

pub use study_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use challenge_generator::ChallengeGenerator;
pub use error::{AppServicesError, SessionConfigError, SessionError};
pub use mastery_tracker::{MasteryTracker, MasteryUpdate, Persistence, StorageWarning};
pub use progress_tracker::{HistoryStats, LevelUp, ProgressTracker};
pub use scoring::{ScoreError, ScoreOutcome};

pub use sessions::{
    PresentedChallenge, ResponseFeedback, SessionConfig, SessionLoopService, SessionProgress,
    SessionState, StudySession,
};
