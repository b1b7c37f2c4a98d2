use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use study_core::model::{Challenge, ChallengeError, LearningConcept, Level};

/// Builds challenges from the content registered on a concept.
///
/// The random source only picks among prompt variants, so two generators
/// built from the same seed produce the same sequence of challenges.
#[derive(Debug, Clone)]
pub struct ChallengeGenerator {
    rng: StdRng,
}

impl ChallengeGenerator {
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Pick one of the concept's templates at `level` and instantiate it.
    ///
    /// # Errors
    ///
    /// Returns `ChallengeError::UnsupportedLevel` if the concept registers no
    /// content at `level`.
    pub fn generate_challenge(
        &mut self,
        concept: &LearningConcept,
        level: Level,
    ) -> Result<Challenge, ChallengeError> {
        let variants: Vec<_> = concept.challenges_at(level).collect();
        if variants.is_empty() {
            return Err(ChallengeError::UnsupportedLevel {
                concept_id: concept.id().clone(),
                level,
            });
        }
        let template = variants[self.rng.random_range(0..variants.len())];
        Ok(Challenge::from_template(concept.id().clone(), template))
    }

    /// Generate at `level`, stepping down one level at a time when the concept
    /// has no content there.
    ///
    /// # Errors
    ///
    /// Returns the `UnsupportedLevel` error for `level` when no level at or
    /// below it has content.
    pub fn generate_at_or_below(
        &mut self,
        concept: &LearningConcept,
        level: Level,
    ) -> Result<Challenge, ChallengeError> {
        let first_error = match self.generate_challenge(concept, level) {
            Ok(challenge) => return Ok(challenge),
            Err(e) => e,
        };

        let mut cursor = level.lower();
        while let Some(lower) = cursor {
            if let Ok(challenge) = self.generate_challenge(concept, lower) {
                tracing::warn!(
                    concept = %concept.id(),
                    requested = %level,
                    used = %lower,
                    "no content at requested difficulty, using lower level"
                );
                return Ok(challenge);
            }
            cursor = lower.lower();
        }
        Err(first_error)
    }
}

impl Default for ChallengeGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}
