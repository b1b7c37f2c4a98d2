mod challenge;
mod concept;
mod ids;
mod level;
mod mastery;
mod progress;
mod session;

pub use ids::{ConceptId, ParseIdError, UserId};
pub use level::{Level, LevelParams, ParseLevelError};

pub use challenge::{
    AnswerMatch, Challenge, ChallengeError, ChallengeTemplate, ChallengeType, ExpectedAnswer,
};
pub use concept::{CodeExample, ConceptCategory, ConceptDraft, ConceptError, LearningConcept};
pub use mastery::{MasteryError, MasteryPolicy, MasteryRecord, MasteryState};
pub use progress::{LevelProgress, ProgressSnapshot};
pub use session::{MasteryDelta, SessionEnd, SessionEvent, SessionSummary, SessionSummaryError};
