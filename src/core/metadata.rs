use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Cards only ever show this many genres
pub const MAX_GENRES: usize = 3;

/// Airing status enum of the primary provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    Finished,
    Releasing,
    NotYetReleased,
    Cancelled,
    Hiatus,
    #[serde(other)]
    Unknown,
}

/// Next scheduled episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextAiringEpisode {
    pub episode: u32,

    /// Unix seconds
    pub airing_at: i64,
}

impl NextAiringEpisode {
    pub fn airing_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.airing_at, 0).single()
    }

    pub fn has_aired(&self, now: DateTime<Utc>) -> bool {
        self.airing_at <= now.timestamp()
    }
}

/// Unified answer of whichever provider resolved a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResult {
    /// Provider that produced this result
    pub provider: String,
    pub cover_url: Option<String>,
    pub cover_fallback_url: Option<String>,
    pub title: String,
    #[serde(default)]
    pub genres: Vec<String>,
    /// 0-100
    pub average_score: Option<u8>,
    pub popularity: Option<u64>,
    #[serde(default)]
    pub status: Option<MediaStatus>,
    #[serde(default)]
    pub next_airing_episode: Option<NextAiringEpisode>,
}

impl FetchResult {
    pub fn new(provider: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            cover_url: None,
            cover_fallback_url: None,
            title: title.into(),
            genres: Vec::new(),
            average_score: None,
            popularity: None,
            status: None,
            next_airing_episode: None,
        }
    }

    pub fn primary_cover(&self) -> Option<&str> {
        self.cover_url
            .as_deref()
            .or(self.cover_fallback_url.as_deref())
    }

    /// Record to persist, or `None` when there is no cover worth caching
    pub fn to_record(&self, now: DateTime<Utc>) -> Option<MetadataRecord> {
        let cover = self.primary_cover()?;
        Some(MetadataRecord::new(
            Some(cover.to_string()),
            self.title.clone(),
            self.genres.clone(),
            self.average_score,
            self.popularity,
            now,
        ))
    }

    pub fn is_releasing(&self) -> bool {
        self.status == Some(MediaStatus::Releasing)
    }
}

/// Cached card metadata.
///
/// `genres` doubles as the schema marker: records written before genre
/// support lack the field entirely and deserialize with `genres: None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    #[serde(default)]
    pub cover_url: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub saved_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<String>>,

    #[serde(default)]
    pub average_score: Option<u8>,

    #[serde(default)]
    pub popularity: Option<u64>,
}

impl MetadataRecord {
    pub fn new(
        cover_url: Option<String>,
        title: impl Into<String>,
        genres: Vec<String>,
        average_score: Option<u8>,
        popularity: Option<u64>,
        saved_at: DateTime<Utc>,
    ) -> Self {
        let mut genres = genres;
        genres.truncate(MAX_GENRES);

        Self {
            cover_url,
            title: title.into(),
            saved_at: truncate_to_millis(saved_at),
            genres: Some(genres),
            average_score,
            popularity,
        }
    }

    /// Written by a build that predates genre support
    pub fn is_legacy(&self) -> bool {
        self.genres.is_none()
    }

    /// Fresh iff younger than `ttl` and carrying the current schema
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        !self.is_legacy() && now.signed_duration_since(self.saved_at) < ttl
    }
}

fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(at.timestamp_millis())
        .single()
        .unwrap_or(at)
}
