use std::sync::Arc;

use storage::repository::{CatalogProvider, Storage};
use study_core::ConceptCatalog;

use crate::Clock;
use crate::error::AppServicesError;
use crate::sessions::SessionLoopService;

/// Assembles the catalog and storage into app-facing services.
#[derive(Clone)]
pub struct AppServices {
    catalog: Arc<ConceptCatalog>,
    session_loop: Arc<SessionLoopService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or catalog loading fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        catalog: &dyn CatalogProvider,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock, catalog)
    }

    /// Build services that keep progress in memory only.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the catalog cannot be loaded.
    pub fn in_memory(clock: Clock, catalog: &dyn CatalogProvider) -> Result<Self, AppServicesError> {
        Self::from_storage(Storage::in_memory(), clock, catalog)
    }

    fn from_storage(
        storage: Storage,
        clock: Clock,
        provider: &dyn CatalogProvider,
    ) -> Result<Self, AppServicesError> {
        let catalog = Arc::new(provider.load_catalog()?);
        let session_loop = Arc::new(SessionLoopService::new(
            clock,
            Arc::clone(&catalog),
            Arc::clone(&storage.mastery),
        ));
        Ok(Self {
            catalog,
            session_loop,
        })
    }

    /// Replace the session loop, e.g. to apply session limits or a seed.
    #[must_use]
    pub fn map_session_loop(
        mut self,
        f: impl FnOnce(SessionLoopService) -> SessionLoopService,
    ) -> Self {
        self.session_loop = Arc::new(f((*self.session_loop).clone()));
        self
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<ConceptCatalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn session_loop(&self) -> Arc<SessionLoopService> {
        Arc::clone(&self.session_loop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::BuiltinCatalog;
    use study_core::model::{Level, UserId};
    use study_core::time::fixed_clock;

    #[tokio::test]
    async fn in_memory_services_open_sessions_on_builtin_catalog() {
        let services = AppServices::in_memory(fixed_clock(), &BuiltinCatalog)
            .unwrap()
            .map_session_loop(|l| l.with_seed(11));
        assert!(!services.catalog().is_empty());

        let mut session = services.session_loop().open_session(UserId::new(1)).await;
        let first = session.start_study_session(Level::Beginner).unwrap();
        assert_eq!(first.challenge.difficulty, Level::Beginner);
        assert!(session.warnings().is_empty());
    }
}
