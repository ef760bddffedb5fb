use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::core::{FetchResult, Subject, MAX_GENRES};
use crate::error::{AtlasError, Result};
use crate::providers::MetadataProvider;
use crate::transport::HttpTransport;

/// Jikan REST provider (secondary, simpler schema)
pub struct JikanProvider {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<JikanItem>,
}

#[derive(Debug, Deserialize)]
struct JikanItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    images: Option<JikanImages>,
    #[serde(default)]
    genres: Vec<JikanGenre>,
    /// Native 0-10 scale
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    members: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct JikanImages {
    #[serde(default)]
    jpg: Option<JikanImageSet>,
}

#[derive(Debug, Deserialize)]
struct JikanImageSet {
    #[serde(default)]
    large_image_url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    small_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JikanGenre {
    name: String,
}

impl JikanProvider {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, subject: &Subject) -> String {
        format!(
            "{}/v4/{}?q={}&limit=1",
            self.base_url,
            subject.kind.path_segment(),
            urlencoding::encode(&subject.query)
        )
    }

    /// Convert the best-match item; items without any cover are dropped
    fn item_to_fetch_result(item: JikanItem, query: &str) -> Option<FetchResult> {
        let jpg = item.images.and_then(|i| i.jpg)?;
        let cover = jpg
            .large_image_url
            .or(jpg.image_url)
            .or(jpg.small_image_url)
            .filter(|url| !url.is_empty())?;

        let mut result = FetchResult::new(
            "jikan",
            item.title.filter(|t| !t.is_empty()).unwrap_or_else(|| query.to_string()),
        );

        result.cover_url = Some(cover.clone());
        result.cover_fallback_url = Some(cover);
        result.genres = item
            .genres
            .into_iter()
            .map(|g| g.name)
            .take(MAX_GENRES)
            .collect();
        result.average_score = item.score.and_then(rescale_score);
        result.popularity = item.members.filter(|m| *m > 0);

        Some(result)
    }
}

/// 0-10 float to 0-100 integer
fn rescale_score(score: f64) -> Option<u8> {
    if !score.is_finite() || score <= 0.0 {
        return None;
    }
    Some((score * 10.0).round().min(100.0) as u8)
}

#[async_trait]
impl MetadataProvider for JikanProvider {
    async fn resolve(&self, subject: &Subject) -> Result<Option<FetchResult>> {
        let url = self.search_url(subject);
        tracing::debug!("Trying Jikan fallback for {:?} ({})", subject.query, subject.kind);

        let response = self.transport.get(&url).await?;

        if !response.is_success() {
            return Err(AtlasError::Provider {
                provider: "jikan".to_string(),
                message: format!("HTTP {}", response.status),
            });
        }

        let payload: SearchResponse = match serde_json::from_str(&response.body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!("Jikan payload for {:?} unreadable: {}", subject.query, e);
                return Ok(None);
            }
        };

        let result = payload
            .data
            .into_iter()
            .next()
            .and_then(|item| Self::item_to_fetch_result(item, &subject.query));

        if result.is_some() {
            tracing::debug!("Jikan found cover for {:?}", subject.query);
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "jikan"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{Reply, ScriptedTransport};
    use serde_json::json;

    const BASE: &str = "https://jikan.test";

    fn item_payload() -> String {
        json!({ "data": [{
            "title": "Berserk",
            "images": { "jpg": {
                "image_url": "https://cdn/b.jpg",
                "small_image_url": "https://cdn/b_s.jpg",
                "large_image_url": "https://cdn/b_l.jpg"
            }},
            "genres": [{ "name": "Action" }, { "name": "Drama" }, { "name": "Fantasy" }, { "name": "Horror" }],
            "score": 9.47,
            "members": 750000
        }]})
        .to_string()
    }

    #[test]
    fn test_search_url() {
        let provider = JikanProvider::new(Arc::new(ScriptedTransport::new()), "https://jikan.test/");
        assert_eq!(
            provider.search_url(&Subject::manga("Spy x Family")),
            "https://jikan.test/v4/manga?q=Spy%20x%20Family&limit=1"
        );
        assert_eq!(
            provider.search_url(&Subject::anime("Naruto")),
            "https://jikan.test/v4/anime?q=Naruto&limit=1"
        );
    }

    #[test]
    fn test_rescale_score() {
        assert_eq!(rescale_score(9.47), Some(95));
        assert_eq!(rescale_score(7.0), Some(70));
        assert_eq!(rescale_score(0.0), None);
        assert_eq!(rescale_score(f64::NAN), None);
    }

    #[tokio::test]
    async fn test_normalizes_best_match() {
        let transport = Arc::new(ScriptedTransport::new().route(BASE, vec![Reply::ok(item_payload())]));
        let provider = JikanProvider::new(transport, BASE);

        let result = provider.resolve(&Subject::manga("Berserk")).await.unwrap().unwrap();
        assert_eq!(result.provider, "jikan");
        assert_eq!(result.title, "Berserk");
        assert_eq!(result.cover_url.as_deref(), Some("https://cdn/b_l.jpg"));
        assert_eq!(result.genres, vec!["Action", "Drama", "Fantasy"]);
        assert_eq!(result.average_score, Some(95));
        assert_eq!(result.popularity, Some(750000));
        assert!(result.status.is_none());
    }

    #[tokio::test]
    async fn test_empty_results_is_none() {
        let transport = Arc::new(ScriptedTransport::new().route(BASE, vec![Reply::ok(r#"{"data":[]}"#)]));
        let provider = JikanProvider::new(transport, BASE);
        assert!(provider.resolve(&Subject::anime("Nothing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_item_without_cover_is_none() {
        let payload = json!({ "data": [{ "title": "Coverless", "images": { "jpg": {} } }] });
        let transport = Arc::new(ScriptedTransport::new().route(BASE, vec![Reply::ok(payload.to_string())]));
        let provider = JikanProvider::new(transport, BASE);
        assert!(provider.resolve(&Subject::anime("Coverless")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_http_error_is_provider_error() {
        let transport = Arc::new(ScriptedTransport::new().route(BASE, vec![Reply::status(503)]));
        let provider = JikanProvider::new(transport, BASE);

        let err = provider.resolve(&Subject::anime("Naruto")).await.unwrap_err();
        assert!(matches!(err, AtlasError::Provider { .. }));
        assert!(!err.is_transient());
    }
}
