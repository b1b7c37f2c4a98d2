use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Error;
use crate::model::{ConceptCategory, ConceptDraft, ConceptId, LearningConcept, Level};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("duplicate concept id: {0}")]
    DuplicateConcept(ConceptId),

    #[error("concept {concept} requires unknown prerequisite {prerequisite}")]
    UnknownPrerequisite {
        concept: ConceptId,
        prerequisite: ConceptId,
    },

    #[error("learning path {path} references unknown concept {concept}")]
    UnknownPathConcept { path: String, concept: ConceptId },

    #[error("duplicate learning path id: {0}")]
    DuplicatePath(String),
}

//
// ─── LEARNING PATH ─────────────────────────────────────────────────────────────
//

/// Ordered sequence of concepts forming a curriculum for one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: String,
    pub name: String,
    pub level: Level,
    #[serde(default)]
    pub description: String,
    pub concept_ids: Vec<ConceptId>,
    #[serde(default)]
    pub estimated_total_hours: u32,
}

impl LearningPath {
    /// First concept on the path that is not in `completed`.
    #[must_use]
    pub fn next_concept(&self, completed: &[ConceptId]) -> Option<&ConceptId> {
        self.concept_ids.iter().find(|id| !completed.contains(id))
    }

    /// Share of the path in `completed`, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percentage(&self, completed: &[ConceptId]) -> f64 {
        if self.concept_ids.is_empty() {
            return 0.0;
        }
        let done = self
            .concept_ids
            .iter()
            .filter(|id| completed.contains(id))
            .count();
        done as f64 / self.concept_ids.len() as f64 * 100.0
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Read-only set of concepts, built once at startup and shared by reference.
///
/// Iteration always follows catalog (insertion) order, which is also the final
/// tie-break when selecting concepts.
#[derive(Debug, Clone, Default)]
pub struct ConceptCatalog {
    concepts: Vec<LearningConcept>,
    index: HashMap<ConceptId, usize>,
    paths: Vec<LearningPath>,
}

impl ConceptCatalog {
    /// Build a catalog from validated concepts.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateConcept` for repeated ids and
    /// `CatalogError::UnknownPrerequisite` if a prerequisite is not in the catalog.
    pub fn new(concepts: Vec<LearningConcept>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(concepts.len());
        for (position, concept) in concepts.iter().enumerate() {
            if index.insert(concept.id().clone(), position).is_some() {
                return Err(CatalogError::DuplicateConcept(concept.id().clone()));
            }
        }
        for concept in &concepts {
            if let Some(missing) = concept
                .prerequisites()
                .iter()
                .find(|p| !index.contains_key(*p))
            {
                return Err(CatalogError::UnknownPrerequisite {
                    concept: concept.id().clone(),
                    prerequisite: missing.clone(),
                });
            }
        }
        Ok(Self {
            concepts,
            index,
            paths: Vec::new(),
        })
    }

    /// Validate every draft and build the catalog from the result.
    ///
    /// # Errors
    ///
    /// Returns the first `ConceptError` or `CatalogError` encountered.
    pub fn from_drafts(drafts: impl IntoIterator<Item = ConceptDraft>) -> Result<Self, Error> {
        let concepts = drafts
            .into_iter()
            .map(ConceptDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(concepts)?)
    }

    /// Attach a learning path.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the path id is taken or it names unknown concepts.
    pub fn with_path(mut self, path: LearningPath) -> Result<Self, CatalogError> {
        if self.paths.iter().any(|p| p.id == path.id) {
            return Err(CatalogError::DuplicatePath(path.id));
        }
        if let Some(missing) = path
            .concept_ids
            .iter()
            .find(|id| !self.index.contains_key(*id))
        {
            return Err(CatalogError::UnknownPathConcept {
                path: path.id.clone(),
                concept: missing.clone(),
            });
        }
        self.paths.push(path);
        Ok(self)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &ConceptId) -> Option<&LearningConcept> {
        self.index.get(id).map(|&i| &self.concepts[i])
    }

    /// Position of a concept in catalog order.
    #[must_use]
    pub fn position(&self, id: &ConceptId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LearningConcept> {
        self.concepts.iter()
    }

    /// Concepts at one level, in catalog order.
    pub fn by_level(&self, level: Level) -> impl Iterator<Item = &LearningConcept> {
        self.concepts.iter().filter(move |c| c.level() == level)
    }

    /// Concepts in a category, optionally restricted to one level.
    #[must_use]
    pub fn by_category(
        &self,
        category: ConceptCategory,
        level: Option<Level>,
    ) -> Vec<&LearningConcept> {
        self.concepts
            .iter()
            .filter(|c| c.category() == category)
            .filter(|c| level.is_none_or(|l| c.level() == l))
            .collect()
    }

    /// Case-insensitive search over name, description and keywords.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&LearningConcept> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        self.concepts
            .iter()
            .filter(|c| c.matches_query(query))
            .collect()
    }

    #[must_use]
    pub fn paths(&self) -> &[LearningPath] {
        &self.paths
    }

    #[must_use]
    pub fn path(&self, id: &str) -> Option<&LearningPath> {
        self.paths.iter().find(|p| p.id == id)
    }

    pub fn paths_for_level(&self, level: Level) -> impl Iterator<Item = &LearningPath> {
        self.paths.iter().filter(move |p| p.level == level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConceptError;

    fn concept(id: &str, level: Level, category: ConceptCategory) -> LearningConcept {
        ConceptDraft::new(
            ConceptId::new(id).unwrap(),
            id.replace('_', " "),
            level,
            category,
            format!("About {id}"),
        )
        .validate()
        .unwrap()
    }

    fn catalog() -> ConceptCatalog {
        ConceptCatalog::new(vec![
            concept("variables", Level::Beginner, ConceptCategory::Basics),
            concept("loops", Level::Beginner, ConceptCategory::ControlFlow),
            concept("closures", Level::Intermediate, ConceptCategory::Functions),
            concept("async_io", Level::Expert, ConceptCategory::Async),
        ])
        .unwrap()
    }

    fn id(s: &str) -> ConceptId {
        ConceptId::new(s).unwrap()
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = ConceptCatalog::new(vec![
            concept("loops", Level::Beginner, ConceptCategory::ControlFlow),
            concept("loops", Level::Expert, ConceptCategory::ControlFlow),
        ])
        .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateConcept(id("loops")));
    }

    #[test]
    fn from_drafts_surfaces_validation_errors() {
        let bad = ConceptDraft::new(
            id("empty"),
            " ",
            Level::Beginner,
            ConceptCategory::Basics,
            "desc",
        );
        let err = ConceptCatalog::from_drafts(vec![bad]).unwrap_err();
        assert!(matches!(err, Error::Concept(ConceptError::EmptyName)));
    }

    #[test]
    fn rejects_unknown_prerequisite() {
        let mut draft = ConceptDraft::new(
            id("closures"),
            "Closures",
            Level::Intermediate,
            ConceptCategory::Functions,
            "Functions capturing state",
        );
        draft.prerequisites.push(id("functions"));
        let err = ConceptCatalog::new(vec![draft.validate().unwrap()]).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownPrerequisite { .. }));
    }

    #[test]
    fn by_level_keeps_catalog_order() {
        let catalog = catalog();
        let names: Vec<_> = catalog
            .by_level(Level::Beginner)
            .map(|c| c.id().as_str().to_owned())
            .collect();
        assert_eq!(names, vec!["variables", "loops"]);
        assert_eq!(catalog.position(&id("closures")), Some(2));
    }

    #[test]
    fn by_category_filters_optionally_by_level() {
        let catalog = catalog();
        assert_eq!(catalog.by_category(ConceptCategory::Functions, None).len(), 1);
        assert!(
            catalog
                .by_category(ConceptCategory::Functions, Some(Level::Beginner))
                .is_empty()
        );
    }

    #[test]
    fn search_is_case_insensitive() {
        let catalog = catalog();
        let hits = catalog.search("LOOPS");
        assert_eq!(hits.len(), 1);
        assert!(catalog.search("   ").is_empty());
    }

    #[test]
    fn learning_path_tracks_progress() {
        let catalog = catalog()
            .with_path(LearningPath {
                id: "fundamentals".into(),
                name: "Fundamentals".into(),
                level: Level::Beginner,
                description: "Start here".into(),
                concept_ids: vec![id("variables"), id("loops")],
                estimated_total_hours: 4,
            })
            .unwrap();

        let path = catalog.path("fundamentals").unwrap();
        assert_eq!(path.next_concept(&[]), Some(&id("variables")));
        assert_eq!(path.next_concept(&[id("variables")]), Some(&id("loops")));
        assert_eq!(path.next_concept(&[id("variables"), id("loops")]), None);
        assert!((path.progress_percentage(&[id("loops")]) - 50.0).abs() < 1e-9);
        assert_eq!(catalog.paths_for_level(Level::Expert).count(), 0);
    }

    #[test]
    fn path_with_unknown_concept_is_rejected() {
        let err = catalog()
            .with_path(LearningPath {
                id: "broken".into(),
                name: "Broken".into(),
                level: Level::Beginner,
                description: String::new(),
                concept_ids: vec![id("missing")],
                estimated_total_hours: 1,
            })
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownPathConcept { .. }));
    }
}
