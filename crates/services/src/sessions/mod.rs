mod config;
mod progress;
mod service;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use config::SessionConfig;
pub use progress::SessionProgress;
pub use service::{PresentedChallenge, ResponseFeedback, SessionState, StudySession};
pub use workflow::SessionLoopService;
