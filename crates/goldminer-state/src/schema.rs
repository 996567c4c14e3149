//! Row types for the Gold Miner SurrealDB tables
//!
//! Tables:
//! - repos: discovered repositories, one record per repository identifier

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Repo;

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// A row of the `repos` table.
///
/// The SurrealDB record id is derived from `repo_id`; the row carries the
/// identifier again as a plain string so selects never have to decode a
/// `Thing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoRecord {
    pub repo_id: String,
    pub name: String,
    pub url: String,
    pub description: String,
    pub stars: u32,
    pub language: String,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
    pub star_growth_rate: f64,
    pub is_ai_tool: bool,
    pub score: u8,
    pub review: String,
    pub already_notified: bool,
    #[serde(with = "surreal_datetime")]
    pub stored_at: DateTime<Utc>,
}

/// Column list used by every select on `repos`.
pub const REPO_COLUMNS: &str = "repo_id, name, url, description, stars, language, created_at, \
     updated_at, star_growth_rate, is_ai_tool, score, review, already_notified, stored_at";

impl RepoRecord {
    pub fn from_repo(repo: &Repo, stored_at: DateTime<Utc>) -> Self {
        Self {
            repo_id: repo.id().to_string(),
            name: repo.name.clone(),
            url: repo.url.clone(),
            description: repo.description.clone(),
            stars: repo.stars,
            language: repo.language.clone(),
            created_at: repo.created_at,
            updated_at: repo.updated_at,
            star_growth_rate: repo.star_growth_rate,
            is_ai_tool: repo.is_ai_tool,
            score: repo.score,
            review: repo.review.clone(),
            already_notified: repo.already_notified(),
            stored_at,
        }
    }

    pub fn into_repo(self) -> Repo {
        let mut repo = Repo::new(self.repo_id, self.name, self.url, self.created_at)
            .with_description(self.description)
            .with_stars(self.stars)
            .with_language(self.language)
            .with_updated_at(self.updated_at);
        repo.star_growth_rate = self.star_growth_rate;
        repo.is_ai_tool = self.is_ai_tool;
        repo.score = self.score;
        repo.review = self.review;
        if self.already_notified {
            repo.mark_notified();
        }
        repo
    }
}
