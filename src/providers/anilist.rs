use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::core::{FetchResult, MediaStatus, NextAiringEpisode, Subject, MAX_GENRES};
use crate::endpoints::EndpointSelector;
use crate::error::{AtlasError, Result};
use crate::providers::MetadataProvider;
use crate::retry::RetryPolicy;
use crate::transport::HttpTransport;

const MEDIA_QUERY: &str = r#"
query ($search: String, $type: MediaType) {
  Media(search: $search, type: $type) {
    coverImage {
      large
      extraLarge
    }
    title {
      english
      romaji
    }
    genres
    averageScore
    popularity
    status
    nextAiringEpisode {
      airingAt
      episode
    }
  }
}
"#;

/// AniList GraphQL provider (primary, rich schema)
pub struct AniListProvider {
    transport: Arc<dyn HttpTransport>,
    selector: EndpointSelector,
    rate_limit_retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<MediaData>,
}

#[derive(Debug, Deserialize)]
struct MediaData {
    #[serde(rename = "Media", default)]
    media: Option<AniListMedia>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AniListMedia {
    #[serde(default)]
    cover_image: Option<CoverImage>,
    #[serde(default)]
    title: Option<MediaTitle>,
    #[serde(default)]
    genres: Option<Vec<String>>,
    #[serde(default)]
    average_score: Option<u8>,
    #[serde(default)]
    popularity: Option<u64>,
    #[serde(default)]
    status: Option<MediaStatus>,
    #[serde(default)]
    next_airing_episode: Option<NextAiringEpisode>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct CoverImage {
    #[serde(default)]
    large: Option<String>,
    #[serde(default)]
    extra_large: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MediaTitle {
    #[serde(default)]
    english: Option<String>,
    #[serde(default)]
    romaji: Option<String>,
}

impl AniListProvider {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoints: Vec<String>, rate_limit_retry: RetryPolicy) -> Self {
        Self {
            transport,
            selector: EndpointSelector::new(endpoints),
            rate_limit_retry,
        }
    }

    pub fn selector(&self) -> &EndpointSelector {
        &self.selector
    }

    /// Convert AniList media to the unified result
    fn media_to_fetch_result(media: AniListMedia, query: &str) -> FetchResult {
        let cover = media.cover_image.unwrap_or_default();
        let title = media.title.unwrap_or_default();

        let mut result = FetchResult::new(
            "anilist",
            non_empty(title.english)
                .or_else(|| non_empty(title.romaji))
                .unwrap_or_else(|| query.to_string()),
        );

        result.cover_url = cover.extra_large.clone().or_else(|| cover.large.clone());
        result.cover_fallback_url = cover.large.or(cover.extra_large);
        result.genres = media
            .genres
            .unwrap_or_default()
            .into_iter()
            .take(MAX_GENRES)
            .collect();
        result.average_score = media.average_score.filter(|s| *s > 0);
        result.popularity = media.popularity.filter(|p| *p > 0);
        result.status = media.status;
        result.next_airing_episode = media.next_airing_episode;

        result
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl MetadataProvider for AniListProvider {
    async fn resolve(&self, subject: &Subject) -> Result<Option<FetchResult>> {
        let body = json!({
            "query": MEDIA_QUERY,
            "variables": { "search": subject.query, "type": subject.kind.as_str() },
        });

        let selector = &self.selector;
        let transport = self.transport.as_ref();
        let body = &body;

        let response = self
            .rate_limit_retry
            .run("anilist", AtlasError::is_rate_limited, move || selector.post(transport, body))
            .await?;

        let payload: GraphQlResponse = match serde_json::from_str(&response.body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!("AniList payload for {:?} unreadable: {}", subject.query, e);
                return Ok(None);
            }
        };

        let media = payload.data.and_then(|d| d.media);
        if media.is_none() {
            tracing::debug!("AniList has no media for {:?}", subject.query);
        }

        Ok(media.map(|m| Self::media_to_fetch_result(m, &subject.query)))
    }

    fn name(&self) -> &str {
        "anilist"
    }
}
