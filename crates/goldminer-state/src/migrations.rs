//! SurrealDB schema initialization
//!
//! Sets up the `repos` table and its indexes.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all Gold Miner tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing goldminer SurrealDB schema");

    init_repos_table(db).await?;

    info!("goldminer schema initialization complete");
    Ok(())
}

/// Initialize `repos` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE repos {
///   repo_id:           STRING (unique, also the record id)
///   name:              STRING
///   url:               STRING
///   description:       STRING
///   stars:             INT
///   language:          STRING
///   created_at:        DATETIME (indexed)
///   updated_at:        DATETIME
///   star_growth_rate:  FLOAT
///   is_ai_tool:        BOOL
///   score:             INT (indexed)
///   review:            STRING
///   already_notified:  BOOL (indexed)
///   stored_at:         DATETIME
/// }
/// ```
///
/// `already_notified` only ever moves false → true (enforced in the store).
async fn init_repos_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing repos table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS repos SCHEMALESS;

        DEFINE INDEX IF NOT EXISTS idx_repo_id ON TABLE repos COLUMNS repo_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_repo_score ON TABLE repos COLUMNS score;
        DEFINE INDEX IF NOT EXISTS idx_repo_created_at ON TABLE repos COLUMNS created_at;
        DEFINE INDEX IF NOT EXISTS idx_repo_notified ON TABLE repos COLUMNS already_notified;
    "#;

    db.query(sql)
        .await
        .map_err(|e| crate::StateError::SchemaSetup(e.to_string()))?
        .check()
        .map_err(|e| crate::StateError::SchemaSetup(e.to_string()))?;
    info!("repos table initialized");
    Ok(())
}
