#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anime_atlas_engine::cache::StorageBackend;
use anime_atlas_engine::image::ImageProbe;
use anime_atlas_engine::pipeline::{CardRenderer, CardView, ViewOrigin};
use anime_atlas_engine::{
    AniListProvider, AtlasConfig, AtlasError, FallbackResolver, HttpResponse, HttpTransport, JikanProvider,
    MetadataPipeline, MetadataProvider, PosterCache, Result, Subject,
};

pub const GRAPHQL: &str = "https://graphql.test";
pub const PROXY_A: &str = "https://proxy-a.test/?";
pub const PROXY_B: &str = "https://proxy-b.test/?";
pub const JIKAN: &str = "https://jikan.test";

pub fn test_config() -> AtlasConfig {
    AtlasConfig {
        primary_endpoint: GRAPHQL.to_string(),
        proxy_prefixes: vec![PROXY_A.to_string(), PROXY_B.to_string()],
        secondary_base_url: JIKAN.to_string(),
        ..AtlasConfig::default()
    }
}

pub fn proxied(prefix: &str) -> String {
    format!("{}{}", prefix, GRAPHQL)
}

pub fn anilist_media(english: Option<&str>, romaji: &str, genres: &[&str]) -> String {
    json!({ "data": { "Media": {
        "coverImage": { "large": "https://img.test/l.jpg", "extraLarge": "https://img.test/xl.jpg" },
        "title": { "english": english, "romaji": romaji },
        "genres": genres,
        "averageScore": 79,
        "popularity": 560000,
        "status": "FINISHED",
        "nextAiringEpisode": null
    }}})
    .to_string()
}

pub fn anilist_not_found() -> String {
    r#"{"data":{"Media":null}}"#.to_string()
}

pub fn jikan_item(title: &str) -> String {
    json!({ "data": [{
        "title": title,
        "images": { "jpg": { "large_image_url": "https://cdn.test/j.jpg" } },
        "genres": [{ "name": "Drama" }],
        "score": 8.1,
        "members": 1200
    }]})
    .to_string()
}

#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    NetworkError,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Reply::Status(200, body.into())
    }

    pub fn status(status: u16) -> Self {
        Reply::Status(status, String::new())
    }
}

struct Route {
    prefix: String,
    queue: VecDeque<Reply>,
    repeat: Reply,
}

/// Prefix-routed canned replies; unrouted URLs fail like an unreachable host
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, prefix: &str, replies: Vec<Reply>) -> Self {
        let repeat = replies.last().cloned().unwrap_or(Reply::NetworkError);
        self.routes.lock().unwrap().push(Route {
            prefix: prefix.to_string(),
            queue: replies.into(),
            repeat,
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn reply(&self, url: &str) -> Result<HttpResponse> {
        self.calls.lock().unwrap().push(url.to_string());
        let reply = self
            .routes
            .lock()
            .unwrap()
            .iter_mut()
            .find(|r| url.starts_with(&r.prefix))
            .map(|r| r.queue.pop_front().unwrap_or_else(|| r.repeat.clone()))
            .unwrap_or(Reply::NetworkError);

        match reply {
            Reply::Status(status, body) => Ok(HttpResponse::new(status, body)),
            Reply::NetworkError => Err(AtlasError::Network(format!("unreachable: {}", url))),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(&self, url: &str, _body: &Value, _headers: &[(&str, &str)]) -> Result<HttpResponse> {
        self.reply(url)
    }

    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.reply(url)
    }

    async fn head(&self, url: &str) -> Result<u16> {
        self.reply(url).map(|r| r.status)
    }
}

/// Answers every request after a delay while tracking peak concurrency
pub struct SlowTransport {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    body: String,
}

impl SlowTransport {
    pub fn new(delay: Duration, body: impl Into<String>) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            body: body.into(),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn reply(&self) -> Result<HttpResponse> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(HttpResponse::new(200, self.body.clone()))
    }
}

#[async_trait]
impl HttpTransport for SlowTransport {
    async fn post_json(&self, _url: &str, _body: &Value, _headers: &[(&str, &str)]) -> Result<HttpResponse> {
        self.reply().await
    }

    async fn get(&self, _url: &str) -> Result<HttpResponse> {
        self.reply().await
    }

    async fn head(&self, _url: &str) -> Result<u16> {
        Ok(200)
    }
}

/// Every cover loads
pub struct AlwaysLoads;

#[async_trait]
impl ImageProbe for AlwaysLoads {
    async fn load(&self, _url: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub query: String,
    pub title: String,
    pub cover: String,
    pub origin: ViewOrigin,
}

#[derive(Default)]
pub struct RecordingRenderer {
    pub rendered: Mutex<Vec<Rendered>>,
    pub notices: Mutex<Vec<String>>,
}

impl RecordingRenderer {
    pub fn rendered(&self) -> Vec<Rendered> {
        self.rendered.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl CardRenderer for RecordingRenderer {
    fn render(&self, subject: &Subject, view: &CardView) {
        self.rendered.lock().unwrap().push(Rendered {
            query: subject.query.clone(),
            title: view.title.clone(),
            cover: view.cover.url().to_string(),
            origin: view.origin,
        });
    }

    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

/// Production provider chain over `transport`, covers always load
pub async fn build_pipeline(
    config: &AtlasConfig,
    storage: Arc<dyn StorageBackend>,
    transport: Arc<dyn HttpTransport>,
) -> MetadataPipeline {
    let cache = Arc::new(PosterCache::open(storage, config.storage_key.clone(), config.cache_ttl_chrono()).await);

    let providers: Vec<Arc<dyn MetadataProvider>> = vec![
        Arc::new(AniListProvider::new(
            transport.clone(),
            config.anilist_endpoints(),
            config.rate_limit_retry,
        )),
        Arc::new(JikanProvider::new(transport, config.secondary_base_url.clone())),
    ];

    MetadataPipeline::with_parts(config, cache, FallbackResolver::new(providers), Arc::new(AlwaysLoads))
}
