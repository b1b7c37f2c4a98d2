use chrono::Duration;

use crate::error::SessionConfigError;

/// Bounds of a single study session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    max_challenges: u32,
    time_budget: Option<Duration>,
    avoid_repeats: bool,
}

impl SessionConfig {
    pub const DEFAULT_MAX_CHALLENGES: u32 = 10;

    /// # Errors
    ///
    /// Returns `SessionConfigError::ZeroChallenges` if `max_challenges` is 0.
    pub fn new(max_challenges: u32) -> Result<Self, SessionConfigError> {
        if max_challenges == 0 {
            return Err(SessionConfigError::ZeroChallenges);
        }
        Ok(Self {
            max_challenges,
            ..Self::default()
        })
    }

    /// Add a wall-clock budget; the session completes once it is used up.
    ///
    /// # Errors
    ///
    /// Returns `SessionConfigError::NonPositiveBudget` for a zero or negative budget.
    pub fn with_time_budget(mut self, budget: Duration) -> Result<Self, SessionConfigError> {
        if budget <= Duration::zero() {
            return Err(SessionConfigError::NonPositiveBudget);
        }
        self.time_budget = Some(budget);
        Ok(self)
    }

    /// Allow the same concept to be presented twice in a row.
    #[must_use]
    pub fn allow_repeats(mut self) -> Self {
        self.avoid_repeats = false;
        self
    }

    #[must_use]
    pub fn max_challenges(&self) -> u32 {
        self.max_challenges
    }

    #[must_use]
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget
    }

    #[must_use]
    pub fn avoid_repeats(&self) -> bool {
        self.avoid_repeats
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_challenges: Self::DEFAULT_MAX_CHALLENGES,
            time_budget: None,
            avoid_repeats: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_bounds() {
        assert_eq!(SessionConfig::new(0), Err(SessionConfigError::ZeroChallenges));
        assert_eq!(
            SessionConfig::new(5)
                .unwrap()
                .with_time_budget(Duration::zero()),
            Err(SessionConfigError::NonPositiveBudget)
        );
    }

    #[test]
    fn builder_keeps_values() {
        let config = SessionConfig::new(3)
            .unwrap()
            .with_time_budget(Duration::minutes(15))
            .unwrap()
            .allow_repeats();
        assert_eq!(config.max_challenges(), 3);
        assert_eq!(config.time_budget(), Some(Duration::minutes(15)));
        assert!(!config.avoid_repeats());
    }
}
