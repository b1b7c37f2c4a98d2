use thiserror::Error;

use crate::catalog::CatalogError;
use crate::model::{ChallengeError, ConceptError, MasteryError, SessionSummaryError};
use crate::scheduler::SchedulerError;
use crate::selector::SelectorError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Concept(#[from] ConceptError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error(transparent)]
    Mastery(#[from] MasteryError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Summary(#[from] SessionSummaryError),
}
