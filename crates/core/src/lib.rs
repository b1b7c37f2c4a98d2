#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod selector;
pub mod time;

pub use catalog::{CatalogError, ConceptCatalog, LearningPath};
pub use error::Error;
pub use selector::{ConceptSelector, Selection, SelectionReason, SelectorError};
pub use time::Clock;
