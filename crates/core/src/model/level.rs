use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown level: {0}")]
pub struct ParseLevelError(pub String);

/// Skill level of a concept, a challenge, or a learner.
///
/// Levels are ordered: `Beginner < Intermediate < Expert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Beginner,
    Intermediate,
    Expert,
}

/// Level-specific tuning used by scoring and gamification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelParams {
    /// Minimum normalized similarity for a fuzzy answer to count as correct.
    pub fuzzy_threshold: f64,
    /// Default points for a correct answer when a template does not set its own.
    pub default_points: u32,
}

impl Level {
    /// All levels in ascending order.
    pub const ALL: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Expert];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Expert => "expert",
        }
    }

    #[must_use]
    pub fn params(self) -> LevelParams {
        match self {
            Level::Beginner => LevelParams {
                fuzzy_threshold: 0.80,
                default_points: 10,
            },
            Level::Intermediate => LevelParams {
                fuzzy_threshold: 0.88,
                default_points: 15,
            },
            Level::Expert => LevelParams {
                fuzzy_threshold: 0.95,
                default_points: 25,
            },
        }
    }

    /// The next level down, if any.
    #[must_use]
    pub fn lower(self) -> Option<Level> {
        match self {
            Level::Beginner => None,
            Level::Intermediate => Some(Level::Beginner),
            Level::Expert => Some(Level::Intermediate),
        }
    }

    /// The next level up, if any.
    #[must_use]
    pub fn higher(self) -> Option<Level> {
        match self {
            Level::Beginner => Some(Level::Intermediate),
            Level::Intermediate => Some(Level::Expert),
            Level::Expert => None,
        }
    }

    /// Levels in fallback order starting at `self`: the level itself, every
    /// lower level descending, then every higher level ascending.
    #[must_use]
    pub fn fallback_order(self) -> Vec<Level> {
        let mut order = vec![self];
        let mut cursor = self;
        while let Some(lower) = cursor.lower() {
            order.push(lower);
            cursor = lower;
        }
        cursor = self;
        while let Some(higher) = cursor.higher() {
            order.push(higher);
            cursor = higher;
        }
        order
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Level::Beginner),
            "intermediate" => Ok(Level::Intermediate),
            "expert" => Ok(Level::Expert),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(Level::Beginner < Level::Intermediate);
        assert!(Level::Intermediate < Level::Expert);
    }

    #[test]
    fn fallback_prefers_lower_levels_first() {
        assert_eq!(
            Level::Intermediate.fallback_order(),
            vec![Level::Intermediate, Level::Beginner, Level::Expert]
        );
        assert_eq!(
            Level::Beginner.fallback_order(),
            vec![Level::Beginner, Level::Intermediate, Level::Expert]
        );
        assert_eq!(
            Level::Expert.fallback_order(),
            vec![Level::Expert, Level::Intermediate, Level::Beginner]
        );
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Expert".parse::<Level>().unwrap(), Level::Expert);
        assert!(matches!("guru".parse::<Level>(), Err(ParseLevelError(_))));
    }

    #[test]
    fn stricter_matching_at_higher_levels() {
        assert!(Level::Beginner.params().fuzzy_threshold < Level::Expert.params().fuzzy_threshold);
    }
}
