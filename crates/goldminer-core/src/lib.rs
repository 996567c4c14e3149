//! Goldminer Core Library
//!
//! The mining pipeline: fetch candidates, filter out stale and README-only
//! repositories, appraise the rest concurrently, then persist and push the
//! qualifying ones.
//!
//! External systems are reached through the traits in [`ports`] and the
//! [`RepoStore`] from `goldminer-state`; every outbound call can be wrapped in
//! [`retry::execute`].

pub mod analyzer;
pub mod clock;
pub mod context;
pub mod error;
pub mod fakes;
pub mod filter;
pub mod mining;
pub mod obs;
pub mod ports;
pub mod retry;
pub mod telemetry;

pub use goldminer_state::{Repo, RepoStore, StorageError};

pub use analyzer::{compute_star_growth, AppraisalBatch, AppraisalFailure, AppraisalPool};
pub use clock::{Clock, FixedClock, SystemClock};
pub use context::{CancelCause, RunContext};
pub use error::{AppraisalError, FilterError, MiningError, PoolError, PortError};
pub use filter::{filter_by_age, is_readme_file, parse_github_url, ActivityFilter};
pub use mining::{CycleReport, CycleStage, MiningConfig, MiningService};
pub use ports::{
    Appraisal, Appraiser, CommitInspector, CommitRef, Fetcher, Notifier, PortResult,
    TrendingWindow,
};
pub use retry::{RetryConfig, RetryError};
