//! # Anime Atlas Engine
//!
//! Cache-first poster and metadata resolution for anime/manga cards:
//! - Poster cache with TTL and schema-marker invalidation (SQLite or in-memory)
//! - AniList GraphQL through direct + CORS-proxy endpoints, Jikan as fallback
//! - Linear backoff on rate limiting and network failures
//! - Bounded-concurrency batch resolution with stale-while-revalidate
//! - New-episode email notifier
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use anime_atlas_engine::cache::SqliteStorage;
//! use anime_atlas_engine::pipeline::{CardRenderer, CardView};
//! use anime_atlas_engine::transport::ReqwestTransport;
//! use anime_atlas_engine::{AtlasConfig, MetadataPipeline, Subject};
//!
//! struct Print;
//!
//! impl CardRenderer for Print {
//!     fn render(&self, subject: &Subject, view: &CardView) {
//!         println!("{} -> {} ({})", subject.query, view.title, view.cover.url());
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AtlasConfig::default();
//!     let storage = Arc::new(SqliteStorage::new(&config.db_path).await?);
//!     let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
//!     let pipeline = MetadataPipeline::new(&config, storage, transport).await;
//!
//!     let report = pipeline
//!         .run_batch(vec![Subject::anime("Naruto"), Subject::manga("Berserk")], &Print)
//!         .await;
//!
//!     println!("{} fetch attempts, {} failed", report.fetch_attempts, report.fetch_failures);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod core;
pub mod display;
pub mod endpoints;
pub mod error;
pub mod image;
pub mod notify;
pub mod pipeline;
pub mod providers;
pub mod retry;
pub mod transport;

// Re-export primary types
pub use cache::{MemoryStorage, PosterCache, SqliteStorage, StorageBackend};
pub use config::{AtlasConfig, PageOrigin};
pub use core::{FetchResult, MediaKind, MediaStatus, MetadataRecord, NextAiringEpisode, Subject};
pub use endpoints::EndpointSelector;
pub use error::{AtlasError, Result};
pub use pipeline::{BatchReport, CardRenderer, CardView, MetadataPipeline, ResolutionOutcome, ResolutionSource};
pub use providers::{AniListProvider, FallbackResolver, JikanProvider, MetadataProvider};
pub use retry::RetryPolicy;
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
