use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AtlasError;

/// Media kind understood by both providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaKind {
    #[default]
    Anime,
    Manga,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Anime => "ANIME",
            MediaKind::Manga => "MANGA",
        }
    }

    /// Path segment used by the secondary provider
    pub fn path_segment(&self) -> &'static str {
        match self {
            MediaKind::Anime => "anime",
            MediaKind::Manga => "manga",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ANIME" => Ok(MediaKind::Anime),
            "MANGA" => Ok(MediaKind::Manga),
            other => Err(AtlasError::Config(format!("unknown media kind: {}", other))),
        }
    }
}

/// A titled card on the page that needs cover art and metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    /// Display title
    pub title: String,

    /// Free-text search query sent to the providers
    pub query: String,

    /// Numeric provider identity, when the page knows it
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(default)]
    pub kind: MediaKind,
}

impl Subject {
    pub fn new(title: impl Into<String>, query: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            title: title.into(),
            query: query.into(),
            id: None,
            kind,
        }
    }

    /// Anime subject whose title doubles as its query
    pub fn anime(query: impl Into<String>) -> Self {
        let query = query.into();
        Self::new(query.clone(), query, MediaKind::Anime)
    }

    pub fn manga(query: impl Into<String>) -> Self {
        let query = query.into();
        Self::new(query.clone(), query, MediaKind::Manga)
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    /// Cache identity: kind plus the exact query string
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.query)
    }
}
