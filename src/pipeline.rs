use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

use crate::batch::run_with_concurrency;
use crate::cache::{CacheStats, PosterCache, StorageBackend};
use crate::config::{AtlasConfig, PageOrigin};
use crate::core::{FetchResult, MediaStatus, MetadataRecord, NextAiringEpisode, Subject};
use crate::display::{self, CountdownStyle, ScorePill};
use crate::image::{load_cover, CoverCandidates, HttpImageProbe, ImageProbe, LoadedCover};
use crate::providers::{AniListProvider, FallbackResolver, JikanProvider, MetadataProvider};
use crate::transport::HttpTransport;

pub use crate::providers::fallback::FetchTally;

pub const FILE_ORIGIN_NOTICE: &str =
    "Posters may not load on file://. Use a local server (Live Server) for AniList images.";

pub const BATCH_FAILURE_ADVISORY: &str =
    "Posters failed to load. Try Live Server or check your network/CORS settings.";

/// Where the data on a card came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOrigin {
    FreshCache,
    StaleCache,
    Network,
    Placeholder,
}

/// Everything a card shows for one subject
#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub title: String,
    pub cover: LoadedCover,
    pub genres: Vec<String>,
    pub average_score: Option<u8>,
    pub popularity: Option<u64>,
    pub status: Option<MediaStatus>,
    pub next_airing_episode: Option<NextAiringEpisode>,
    pub origin: ViewOrigin,
}

impl CardView {
    pub fn score_pill(&self) -> Option<ScorePill> {
        self.average_score.map(display::score_pill)
    }

    pub fn popularity_pill(&self) -> Option<String> {
        self.popularity.map(display::popularity_pill)
    }

    pub fn airing_label(&self, now: DateTime<Utc>, style: CountdownStyle) -> Option<String> {
        display::airing_label(self.status, self.next_airing_episode.as_ref(), now, style)
    }
}

/// Receives card updates. Called from concurrent pipelines.
pub trait CardRenderer: Send + Sync {
    fn render(&self, subject: &Subject, view: &CardView);

    /// Page-level notice (file origin warning, batch failure advisory)
    fn notice(&self, _message: &str) {}
}

/// Per-subject resolution state
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionState {
    CacheCheck,
    OptimisticRender(MetadataRecord),
    Fetch {
        stale: Option<MetadataRecord>,
    },
    Success {
        result: FetchResult,
        revalidated: bool,
        tally: FetchTally,
    },
    Failure {
        stale: Option<MetadataRecord>,
        tally: FetchTally,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Fresh cached record, no network
    CacheHit,
    /// Nothing usable was cached; fetched from a provider
    Fetched,
    /// Stale record shown first, then replaced by fetched data
    Revalidated,
    /// Fetch failed; placeholder or stale data stays on the card
    Failed,
}

/// Terminal data of a resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Settled {
    pub source: ResolutionSource,
    pub title: String,
    pub provider: Option<String>,
    pub tally: FetchTally,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Continue(ResolutionState),
    Done(Settled),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionOutcome {
    pub subject: Subject,
    pub source: ResolutionSource,
    pub title: String,
    pub provider: Option<String>,
    pub tally: FetchTally,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// In completion order
    pub outcomes: Vec<ResolutionOutcome>,
    pub fetch_attempts: u32,
    pub fetch_failures: u32,
    pub advisory: Option<String>,
}

impl BatchReport {
    pub fn count(&self, source: ResolutionSource) -> usize {
        self.outcomes.iter().filter(|o| o.source == source).count()
    }
}

/// Cache-first metadata resolution for poster cards
pub struct MetadataPipeline {
    cache: Arc<PosterCache>,
    resolver: FallbackResolver,
    images: Arc<dyn ImageProbe>,
    concurrency: usize,
    placeholder: String,
    origin: PageOrigin,
}

impl MetadataPipeline {
    /// Production wiring: AniList then Jikan, HEAD-probed covers
    pub async fn new(
        config: &AtlasConfig,
        storage: Arc<dyn StorageBackend>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let cache = Arc::new(
            PosterCache::open(storage, config.storage_key.clone(), config.cache_ttl_chrono()).await,
        );

        let providers: Vec<Arc<dyn MetadataProvider>> = vec![
            Arc::new(AniListProvider::new(
                transport.clone(),
                config.anilist_endpoints(),
                config.rate_limit_retry,
            )),
            Arc::new(JikanProvider::new(transport.clone(), config.secondary_base_url.clone())),
        ];
        let resolver = FallbackResolver::new(providers);

        tracing::info!("✅ Metadata pipeline ready ({})", config);

        Self::with_parts(config, cache, resolver, Arc::new(HttpImageProbe::new(transport)))
    }

    pub fn with_parts(
        config: &AtlasConfig,
        cache: Arc<PosterCache>,
        resolver: FallbackResolver,
        images: Arc<dyn ImageProbe>,
    ) -> Self {
        Self {
            cache,
            resolver: resolver.with_primary_retry(config.transient_retry),
            images,
            concurrency: config.concurrency,
            placeholder: config.placeholder_image.clone(),
            origin: config.origin,
        }
    }

    pub fn cache(&self) -> &PosterCache {
        &self.cache
    }

    /// Drive one subject from `CacheCheck` to a terminal state
    pub async fn resolve(&self, subject: &Subject, renderer: &dyn CardRenderer) -> ResolutionOutcome {
        let start = Instant::now();
        let mut state = ResolutionState::CacheCheck;

        let settled = loop {
            match self.step(subject, state, renderer).await {
                Step::Continue(next) => state = next,
                Step::Done(settled) => break settled,
            }
        };

        ResolutionOutcome {
            subject: subject.clone(),
            source: settled.source,
            title: settled.title,
            provider: settled.provider,
            tally: settled.tally,
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }

    /// Advance the state machine by one transition
    pub async fn step(&self, subject: &Subject, state: ResolutionState, renderer: &dyn CardRenderer) -> Step {
        match state {
            ResolutionState::CacheCheck => match self.cache.get(subject).await {
                Some(record) if self.cache.is_fresh(&record, Utc::now()) => {
                    let view = self.record_view(subject, &record, ViewOrigin::FreshCache).await;
                    renderer.render(subject, &view);
                    tracing::debug!("Cache hit for {}", subject.cache_key());

                    Step::Done(Settled {
                        source: ResolutionSource::CacheHit,
                        title: view.title,
                        provider: None,
                        tally: FetchTally::default(),
                    })
                }
                Some(record) => Step::Continue(ResolutionState::OptimisticRender(record)),
                None => Step::Continue(ResolutionState::Fetch { stale: None }),
            },

            ResolutionState::OptimisticRender(record) => {
                let view = self.record_view(subject, &record, ViewOrigin::StaleCache).await;
                renderer.render(subject, &view);
                Step::Continue(ResolutionState::Fetch { stale: Some(record) })
            }

            ResolutionState::Fetch { stale } => {
                let (fetched, tally) = self.fetch(subject).await;
                match fetched {
                    Some(result) => Step::Continue(ResolutionState::Success {
                        result,
                        revalidated: stale.is_some(),
                        tally,
                    }),
                    None => Step::Continue(ResolutionState::Failure { stale, tally }),
                }
            }

            ResolutionState::Success {
                result,
                revalidated,
                tally,
            } => {
                if let Some(record) = result.to_record(Utc::now()) {
                    self.cache.put(subject, record).await;
                }

                let view = self.result_view(&result).await;
                renderer.render(subject, &view);

                Step::Done(Settled {
                    source: if revalidated {
                        ResolutionSource::Revalidated
                    } else {
                        ResolutionSource::Fetched
                    },
                    title: result.title,
                    provider: Some(result.provider),
                    tally,
                })
            }

            ResolutionState::Failure { stale, tally } => {
                let title = match stale {
                    // stale data is already on the card
                    Some(record) => display_title(&record, subject),
                    None => {
                        let view = self.placeholder_view(subject);
                        renderer.render(subject, &view);
                        view.title
                    }
                };

                Step::Done(Settled {
                    source: ResolutionSource::Failed,
                    title,
                    provider: None,
                    tally,
                })
            }
        }
    }

    /// Resolve every subject with bounded concurrency
    pub async fn run_batch(&self, subjects: Vec<Subject>, renderer: &dyn CardRenderer) -> BatchReport {
        if self.origin == PageOrigin::File {
            renderer.notice(FILE_ORIGIN_NOTICE);
        }

        let total = subjects.len();
        let start = Instant::now();

        let outcomes = run_with_concurrency(subjects, self.concurrency, move |_, subject| async move {
            self.resolve(&subject, renderer).await
        })
        .await;

        let mut tally = FetchTally::default();
        for outcome in &outcomes {
            tally += outcome.tally;
        }

        let advisory = if tally.attempts > 0 && tally.failures >= tally.attempts {
            tracing::warn!("⚠️ All {} metadata fetches failed", tally.attempts);
            renderer.notice(BATCH_FAILURE_ADVISORY);
            Some(BATCH_FAILURE_ADVISORY.to_string())
        } else {
            None
        };

        let report = BatchReport {
            outcomes,
            fetch_attempts: tally.attempts,
            fetch_failures: tally.failures,
            advisory,
        };

        tracing::info!(
            "📦 Resolved {} subjects in {:.0}ms ({} cached, {} fetched, {} revalidated, {} failed)",
            total,
            start.elapsed().as_secs_f64() * 1000.0,
            report.count(ResolutionSource::CacheHit),
            report.count(ResolutionSource::Fetched),
            report.count(ResolutionSource::Revalidated),
            report.count(ResolutionSource::Failed),
        );

        report
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats(Utc::now()).await
    }

    pub async fn prune_cache(&self) -> usize {
        self.cache.prune_expired(Utc::now()).await
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await
    }

    async fn fetch(&self, subject: &Subject) -> (Option<FetchResult>, FetchTally) {
        let resolution = self.resolver.resolve(subject).await;
        if resolution.result.is_none() {
            tracing::debug!("No provider knows {}", subject.cache_key());
        }
        (resolution.result, resolution.tally)
    }

    async fn record_view(&self, subject: &Subject, record: &MetadataRecord, origin: ViewOrigin) -> CardView {
        let candidates = CoverCandidates::new(record.cover_url.as_deref(), None, self.placeholder.clone());

        CardView {
            title: display_title(record, subject),
            cover: load_cover(self.images.as_ref(), &candidates).await,
            genres: record.genres.clone().unwrap_or_default(),
            average_score: record.average_score,
            popularity: record.popularity,
            status: None,
            next_airing_episode: None,
            origin,
        }
    }

    async fn result_view(&self, result: &FetchResult) -> CardView {
        let candidates = CoverCandidates::new(
            result.cover_url.as_deref(),
            result.cover_fallback_url.as_deref(),
            self.placeholder.clone(),
        );

        CardView {
            title: result.title.clone(),
            cover: load_cover(self.images.as_ref(), &candidates).await,
            genres: result.genres.clone(),
            average_score: result.average_score,
            popularity: result.popularity,
            status: result.status,
            next_airing_episode: result.next_airing_episode,
            origin: ViewOrigin::Network,
        }
    }

    fn placeholder_view(&self, subject: &Subject) -> CardView {
        CardView {
            title: subject.title.clone(),
            cover: LoadedCover::Placeholder(self.placeholder.clone()),
            genres: Vec::new(),
            average_score: None,
            popularity: None,
            status: None,
            next_airing_episode: None,
            origin: ViewOrigin::Placeholder,
        }
    }
}

fn display_title(record: &MetadataRecord, subject: &Subject) -> String {
    if record.title.trim().is_empty() {
        subject.query.clone()
    } else {
        record.title.clone()
    }
}
