//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryRepoStore`, which satisfies the `RepoStore` contract
//! without any external dependencies, plus switches to make individual
//! operations fail.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::Repo;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryRepoStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Failures {
    exists: bool,
    save: bool,
    mark: bool,
}

/// In-memory repository store backed by a `HashMap<id, Repo>`.
#[derive(Debug, Default)]
pub struct MemoryRepoStore {
    store: Mutex<HashMap<String, Repo>>,
    failures: Mutex<Failures>,
    saves: Mutex<Vec<String>>,
}

impl MemoryRepoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store.
    pub fn with_repos(repos: impl IntoIterator<Item = Repo>) -> Self {
        let store = Self::default();
        {
            let mut map = store.store.lock().unwrap();
            for repo in repos {
                map.insert(repo.id().to_string(), repo);
            }
        }
        store
    }

    pub fn fail_exists(&self, fail: bool) {
        self.failures.lock().unwrap().exists = fail;
    }

    pub fn fail_save(&self, fail: bool) {
        self.failures.lock().unwrap().save = fail;
    }

    pub fn fail_mark(&self, fail: bool) {
        self.failures.lock().unwrap().mark = fail;
    }

    /// Identifiers passed to successful `save` calls, in call order.
    pub fn saved_ids(&self) -> Vec<String> {
        self.saves.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn sort_by_score(repos: &mut [Repo]) {
    repos.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id().cmp(b.id())));
}

#[async_trait]
impl RepoStore for MemoryRepoStore {
    async fn exists(&self, id: &str) -> StorageResult<bool> {
        if self.failures.lock().unwrap().exists {
            return Err(StorageError::Backend("injected exists failure".into()));
        }
        Ok(self.store.lock().unwrap().contains_key(id))
    }

    async fn save(&self, repo: &Repo) -> StorageResult<()> {
        if self.failures.lock().unwrap().save {
            return Err(StorageError::Backend("injected save failure".into()));
        }
        let mut store = self.store.lock().unwrap();
        let mut row = repo.clone();
        if store.get(repo.id()).is_some_and(|r| r.already_notified()) {
            row.mark_notified();
        }
        store.insert(repo.id().to_string(), row);
        self.saves.lock().unwrap().push(repo.id().to_string());
        Ok(())
    }

    async fn mark_notified(&self, id: &str) -> StorageResult<()> {
        if self.failures.lock().unwrap().mark {
            return Err(StorageError::Backend("injected mark failure".into()));
        }
        let mut store = self.store.lock().unwrap();
        let repo = store
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })?;
        repo.mark_notified();
        Ok(())
    }

    async fn get(&self, id: &str) -> StorageResult<Option<Repo>> {
        Ok(self.store.lock().unwrap().get(id).cloned())
    }

    async fn search(&self, query: &str, limit: usize) -> StorageResult<Vec<Repo>> {
        let needle = query.to_lowercase();
        let store = self.store.lock().unwrap();
        let mut hits: Vec<Repo> = store
            .values()
            .filter(|r| {
                r.name.to_lowercase().contains(&needle)
                    || r.description.to_lowercase().contains(&needle)
                    || r.review.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        sort_by_score(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn candidates(&self, limit: usize) -> StorageResult<Vec<Repo>> {
        let limit = if limit == 0 {
            DEFAULT_CANDIDATE_LIMIT
        } else {
            limit
        };
        let store = self.store.lock().unwrap();
        let mut all: Vec<Repo> = store.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn unnotified(&self) -> StorageResult<Vec<Repo>> {
        let store = self.store.lock().unwrap();
        let mut pending: Vec<Repo> = store
            .values()
            .filter(|r| !r.already_notified())
            .cloned()
            .collect();
        sort_by_score(&mut pending);
        Ok(pending)
    }
}
