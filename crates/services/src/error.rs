//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use study_core::model::{ChallengeError, SessionSummaryError};
use study_core::SelectorError;

use crate::sessions::SessionState;

/// Errors emitted by session services.
///
/// Malformed responses and persistence failures during a session are not
/// errors; they surface as incorrect answers and storage warnings.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },
    #[error("no challenge is currently presented")]
    NoCurrentChallenge,
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error(transparent)]
    Summary(#[from] SessionSummaryError),
    #[error("session time budget was used up before the response arrived")]
    TimeBudgetExhausted,
}

/// Invalid `SessionConfig` values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionConfigError {
    #[error("max challenges must be at least 1")]
    ZeroChallenges,
    #[error("time budget must be positive")]
    NonPositiveBudget,
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
