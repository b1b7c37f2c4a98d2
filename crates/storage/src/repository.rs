use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use study_core::model::{LearningConcept, MasteryState, UserId};
use study_core::{ConceptCatalog, LearningPath};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

/// Persistence contract for learner mastery.
///
/// Implementations store the whole concept → record mapping per learner.
#[async_trait]
pub trait MasteryStore: Send + Sync {
    /// Load every record for `user`. A learner with no history yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read or holds invalid rows.
    async fn load_mastery(&self, user: UserId) -> Result<MasteryState, StorageError>;

    /// Replace the stored mapping for `user` with `state`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the mapping cannot be written.
    async fn save_mastery(&self, user: UserId, state: &MasteryState) -> Result<(), StorageError>;
}

/// Source of concept definitions, read once at startup.
pub trait CatalogProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the source is missing or holds invalid concepts.
    fn load_concepts(&self) -> Result<Vec<LearningConcept>, StorageError>;

    /// Learning paths shipped with the concepts. Sources without paths return none.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the source cannot be read.
    fn load_paths(&self) -> Result<Vec<LearningPath>, StorageError> {
        Ok(Vec::new())
    }

    /// Build a validated catalog from the concepts and paths of this source.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidData` when concepts or paths do not form a
    /// consistent catalog.
    fn load_catalog(&self) -> Result<ConceptCatalog, StorageError> {
        let mut catalog = ConceptCatalog::new(self.load_concepts()?)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        for path in self.load_paths()? {
            catalog = catalog
                .with_path(path)
                .map_err(|e| StorageError::InvalidData(e.to_string()))?;
        }
        tracing::debug!(
            concepts = catalog.len(),
            paths = catalog.paths().len(),
            "catalog loaded"
        );
        Ok(catalog)
    }
}

/// Simple in-memory repository for tests and memory-only runs.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    mastery: Arc<Mutex<HashMap<UserId, MasteryState>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mastery: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl MasteryStore for InMemoryRepository {
    async fn load_mastery(&self, user: UserId) -> Result<MasteryState, StorageError> {
        let guard = self
            .mastery
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&user).cloned().unwrap_or_default())
    }

    async fn save_mastery(&self, user: UserId, state: &MasteryState) -> Result<(), StorageError> {
        let mut guard = self
            .mastery
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(user, state.clone());
        Ok(())
    }
}

/// Mastery persistence behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub mastery: Arc<dyn MasteryStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let mastery: Arc<dyn MasteryStore> = Arc::new(InMemoryRepository::new());
        Self { mastery }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::model::{ConceptId, MasteryPolicy, MasteryRecord};
    use study_core::time::fixed_now;

    fn state_with(concept: &str, correct: bool) -> MasteryState {
        let id = ConceptId::new(concept).unwrap();
        let mut record = MasteryRecord::new(id.clone());
        record.apply_outcome(&MasteryPolicy::default(), correct, fixed_now());
        MasteryState::from([(id, record)])
    }

    #[tokio::test]
    async fn unknown_user_loads_empty_state() {
        let repo = InMemoryRepository::new();
        let state = repo.load_mastery(UserId::new(9)).await.unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn save_replaces_previous_state() {
        let repo = InMemoryRepository::new();
        let user = UserId::new(1);

        repo.save_mastery(user, &state_with("loops", true))
            .await
            .unwrap();
        repo.save_mastery(user, &state_with("variables", false))
            .await
            .unwrap();

        let loaded = repo.load_mastery(user).await.unwrap();
        assert_eq!(loaded.len(), 1);
        let record = &loaded[&ConceptId::new("variables").unwrap()];
        assert_eq!(record.attempt_count(), 1);
        assert_eq!(record.consecutive_correct(), 0);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let storage = Storage::in_memory();
        storage
            .mastery
            .save_mastery(UserId::new(1), &state_with("loops", true))
            .await
            .unwrap();

        let other = storage.mastery.load_mastery(UserId::new(2)).await.unwrap();
        assert!(other.is_empty());
    }
}
