//! Storage trait definitions for Gold Miner
//!
//! `RepoStore` is the persistence boundary of the mining pipeline. The write
//! side (`exists`, `save`, `mark_notified`) is what a mining cycle uses; the
//! read side backs the CLI's `search` and `pending` commands.
//!
//! Implementations are async and backend-agnostic. An in-memory fake lives in
//! the `fakes` module.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::Repo;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Upper bound applied by [`RepoStore::candidates`] when callers pass 0.
pub const DEFAULT_CANDIDATE_LIMIT: usize = 100;

/// Persistent store of discovered repositories, keyed by [`Repo::id`].
#[async_trait]
pub trait RepoStore: Send + Sync {
    /// Whether a record with this identifier was ever saved.
    async fn exists(&self, id: &str) -> StorageResult<bool>;

    /// Insert or update a record.
    ///
    /// An existing `already_notified = true` is never cleared by a later save.
    async fn save(&self, repo: &Repo) -> StorageResult<()>;

    /// Set the notified flag on a stored record.
    ///
    /// Returns `StorageError::NotFound` if the identifier is unknown.
    async fn mark_notified(&self, id: &str) -> StorageResult<()>;

    /// Fetch a single record.
    async fn get(&self, id: &str) -> StorageResult<Option<Repo>>;

    /// Case-insensitive keyword match on name, description and review,
    /// ordered by score descending.
    async fn search(&self, query: &str, limit: usize) -> StorageResult<Vec<Repo>>;

    /// Most recently created records first.
    async fn candidates(&self, limit: usize) -> StorageResult<Vec<Repo>>;

    /// Records not yet notified, highest score first.
    async fn unnotified(&self) -> StorageResult<Vec<Repo>>;
}
