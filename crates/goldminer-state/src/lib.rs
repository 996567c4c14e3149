//! Goldminer-State: persistence for discovered repositories
//!
//! This crate owns the candidate record and everything needed to store it.
//! It is the bottom layer of the workspace: the pipeline in `goldminer-core`
//! talks to storage only through the [`RepoStore`] trait defined here.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: dedup by repository identifier and a notified flag that never
//! reverts.
//!
//! ## Key Components
//!
//! - `Repo`: the candidate repository flowing through the pipeline
//! - `RepoStore`: async storage abstraction (exists / save / mark_notified + read side)
//! - `MemoryRepoStore`: in-memory fake for tests
//! - `SurrealRepoStore`: SurrealDB-backed implementation (mem, surrealkv, ws)

mod error;
pub mod fakes;
mod migrations;
mod model;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use fakes::MemoryRepoStore;
pub use model::Repo;
pub use storage_traits::{RepoStore, StorageResult};
pub use surreal_store::{CloudConfig, SurrealRepoStore};

/// Result type for goldminer-state setup operations
pub type Result<T> = std::result::Result<T, StateError>;
