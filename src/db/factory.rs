//! Factory for creating repository instances.
//!
//! The factory hides the concrete backend from the rest of the application:
//! callers receive an `Arc<dyn FullRepository>` and never name
//! `LocalRepository` directly.

use std::path::Path;
use std::sync::Arc;

use crate::db::repositories::LocalRepository;
use crate::db::repository::{FullRepository, RepositoryResult};

/// Factory for repository instances.
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create a purely in-memory repository.
    pub fn create_local() -> Arc<dyn FullRepository> {
        Arc::new(LocalRepository::new())
    }

    /// Create a journal-backed repository, replaying existing entries.
    pub fn create_journaled(path: impl AsRef<Path>) -> RepositoryResult<Arc<dyn FullRepository>> {
        Ok(Arc::new(LocalRepository::with_journal(path)?))
    }

    /// Create the repository described by the settings: journaled when a
    /// journal path is configured, plain in-memory otherwise.
    pub fn from_settings(
        journal_path: Option<&Path>,
    ) -> RepositoryResult<Arc<dyn FullRepository>> {
        match journal_path {
            Some(path) => Self::create_journaled(path),
            None => Ok(Self::create_local()),
        }
    }
}
