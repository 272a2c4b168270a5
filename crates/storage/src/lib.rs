#![forbid(unsafe_code)]

pub mod remote;
pub mod repository;
pub mod sqlite;

pub use repository::{
    CatalogWriter, CategoryRepository, CompletionRepository, InMemoryRepository,
    QuestionRepository, Storage, StorageError,
};
