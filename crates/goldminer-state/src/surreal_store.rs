//! SurrealDB-backed RepoStore implementation
//!
//! Uses `schema::RepoRecord` for persistence, converting to and from
//! [`Repo`] at the boundary. Records live in the `repos` table under
//! `repos:⟨repo_id⟩`.

use async_trait::async_trait;
use chrono::Utc;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::model::Repo;
use crate::schema::{RepoRecord, REPO_COLUMNS};
use crate::storage_traits::{RepoStore, StorageResult, DEFAULT_CANDIDATE_LIMIT};

const DEFAULT_NAMESPACE: &str = "goldminer";
const DEFAULT_DATABASE: &str = "main";
const LOCAL_DB_PATH: &str = ".goldminer/db";

/// Configuration for an authenticated SurrealDB connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Namespace (default: "goldminer")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create a new configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "goldminer")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace = std::env::var("SURREALDB_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// SurrealDB-backed implementation of [`RepoStore`].
#[derive(Clone)]
pub struct SurrealRepoStore {
    db: Surreal<Any>,
}

impl SurrealRepoStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        let store = Self::connect("mem://").await?;
        info!("SurrealRepoStore connected (in-memory)");
        Ok(store)
    }

    /// Connect to any engine URL (`mem://`, `surrealkv://path`, `ws://host`)
    /// without authentication, using the default namespace and database.
    pub async fn connect(url: &str) -> crate::Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        Self::select_and_init(db, DEFAULT_NAMESPACE, DEFAULT_DATABASE).await
    }

    /// Connect with credentials.
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace))]
    pub async fn setup_cloud(config: CloudConfig) -> crate::Result<Self> {
        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Root auth failed: {e}")))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("DB auth failed: {e}")))?;
        }

        let store = Self::select_and_init(db, &config.namespace, &config.database).await?;
        info!("SurrealRepoStore connected (cloud)");
        Ok(store)
    }

    /// Create from environment variables.
    ///
    /// Resolution order: [`CloudConfig::from_env`], then `SURREALDB_URL`,
    /// then a local `surrealkv://.goldminer/db`.
    pub async fn from_env() -> crate::Result<Self> {
        if let Ok(config) = CloudConfig::from_env() {
            return Self::setup_cloud(config).await;
        }

        if let Ok(url) = std::env::var("SURREALDB_URL") {
            let store = Self::connect(&url).await?;
            info!("SurrealRepoStore connected ({})", url);
            return Ok(store);
        }

        std::fs::create_dir_all(LOCAL_DB_PATH).map_err(|e| {
            StateError::Connection(format!(
                "Failed to create database directory {}: {}",
                LOCAL_DB_PATH, e
            ))
        })?;
        let url = format!("surrealkv://{}", LOCAL_DB_PATH);
        info!(
            "No cloud config or SURREALDB_URL found, using local persistence: {}",
            url
        );
        Self::connect(&url).await
    }

    async fn select_and_init(db: Surreal<Any>, ns: &str, database: &str) -> crate::Result<Self> {
        db.use_ns(ns)
            .use_db(database)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        Ok(Self { db })
    }

    // -- private helpers -----------------------------------------------------

    async fn select_rows(
        &self,
        sql: String,
        bind: Option<(&'static str, String)>,
    ) -> StorageResult<Vec<Repo>> {
        let mut query = self.db.query(sql);
        if let Some(b) = bind {
            query = query.bind(b);
        }
        let mut res = query
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let rows: Vec<RepoRecord> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(rows.into_iter().map(RepoRecord::into_repo).collect())
    }
}

#[async_trait]
impl RepoStore for SurrealRepoStore {
    async fn exists(&self, id: &str) -> StorageResult<bool> {
        let mut res = self
            .db
            .query("SELECT VALUE repo_id FROM type::thing('repos', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let ids: Vec<String> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(!ids.is_empty())
    }

    #[instrument(skip(self, repo), fields(repo_id = %repo.id()))]
    async fn save(&self, repo: &Repo) -> StorageResult<()> {
        let mut row = RepoRecord::from_repo(repo, Utc::now());
        if !row.already_notified {
            if let Some(existing) = self.get(repo.id()).await? {
                row.already_notified = existing.already_notified();
            }
        }

        debug!(score = row.score, "upserting repo");

        self.db
            .query("UPSERT type::thing('repos', $id) CONTENT $row RETURN NONE")
            .bind(("id", repo.id().to_string()))
            .bind(("row", row))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .check()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_notified(&self, id: &str) -> StorageResult<()> {
        let mut res = self
            .db
            .query("UPDATE type::thing('repos', $id) SET already_notified = true RETURN VALUE repo_id")
            .bind(("id", id.to_string()))
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let updated: Vec<String> = res
            .take(0)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        if updated.is_empty() {
            return Err(StorageError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> StorageResult<Option<Repo>> {
        let sql = format!("SELECT {REPO_COLUMNS} FROM type::thing('repos', $id)");
        let rows = self.select_rows(sql, Some(("id", id.to_string()))).await?;
        Ok(rows.into_iter().next())
    }

    async fn search(&self, query: &str, limit: usize) -> StorageResult<Vec<Repo>> {
        let sql = format!(
            "SELECT {REPO_COLUMNS} FROM repos \
             WHERE string::contains(string::lowercase(name), $q) \
                OR string::contains(string::lowercase(description), $q) \
                OR string::contains(string::lowercase(review), $q) \
             ORDER BY score DESC, repo_id ASC LIMIT {limit}"
        );
        self.select_rows(sql, Some(("q", query.to_lowercase()))).await
    }

    async fn candidates(&self, limit: usize) -> StorageResult<Vec<Repo>> {
        let limit = if limit == 0 {
            DEFAULT_CANDIDATE_LIMIT
        } else {
            limit
        };
        let sql = format!("SELECT {REPO_COLUMNS} FROM repos ORDER BY created_at DESC LIMIT {limit}");
        self.select_rows(sql, None).await
    }

    async fn unnotified(&self) -> StorageResult<Vec<Repo>> {
        let sql = format!(
            "SELECT {REPO_COLUMNS} FROM repos WHERE already_notified = false \
             ORDER BY score DESC, repo_id ASC"
        );
        self.select_rows(sql, None).await
    }
}
