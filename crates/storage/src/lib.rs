#![forbid(unsafe_code)]

pub mod catalog;
pub mod repository;
pub mod sqlite;

pub use catalog::{BuiltinCatalog, JsonCatalog};
pub use repository::{CatalogProvider, InMemoryRepository, MasteryStore, Storage, StorageError};
