//! The candidate repository record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate repository flowing through the mining pipeline.
///
/// The identifier (`github-<numeric id>`) is the dedup key both within a run
/// and in storage, so it is fixed at construction. The notified flag can only
/// move from `false` to `true` via [`Repo::mark_notified`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    id: String,
    /// Display name, `owner/name`
    pub name: String,
    /// Source URL (`https://github.com/owner/name`)
    pub url: String,
    pub description: String,
    pub stars: u32,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Stars per day since creation; 0 for repositories with no measurable age
    pub star_growth_rate: f64,
    /// Set by a successful appraisal
    pub is_ai_tool: bool,
    /// Appraisal score, 0..=100; 0 means not appraised
    pub score: u8,
    pub review: String,
    already_notified: bool,
}

impl Repo {
    /// Create an un-appraised, un-notified record.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            description: String::new(),
            stars: 0,
            language: String::new(),
            created_at,
            updated_at: created_at,
            star_growth_rate: 0.0,
            is_ai_tool: false,
            score: 0,
            review: String::new(),
            already_notified: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_stars(mut self, stars: u32) -> Self {
        self.stars = stars;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn already_notified(&self) -> bool {
        self.already_notified
    }

    /// Flip the notified flag. There is no way to clear it again.
    pub fn mark_notified(&mut self) {
        self.already_notified = true;
    }

    /// True once an appraisal has written a score.
    pub fn is_appraised(&self) -> bool {
        self.score > 0 || !self.review.is_empty()
    }

    /// Qualifying tool with a score at or above `min_score`.
    pub fn meets_bar(&self, min_score: u8) -> bool {
        self.is_ai_tool && self.score >= min_score
    }

    /// Age in fractional days relative to `now`. Negative for timestamps in the future.
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        let secs = (now - self.created_at).num_milliseconds() as f64 / 1000.0;
        secs / 86_400.0
    }
}
