use chrono::Utc;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use anime_atlas_engine::cache::SqliteStorage;
use anime_atlas_engine::display::CountdownStyle;
use anime_atlas_engine::pipeline::{CardRenderer, CardView, ResolutionSource, ViewOrigin};
use anime_atlas_engine::transport::ReqwestTransport;
use anime_atlas_engine::{AtlasConfig, MediaKind, MetadataPipeline, PageOrigin, Subject};

#[derive(Parser)]
#[command(name = "atlas-cli")]
#[command(about = "Anime Atlas poster/metadata CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database path (defaults to ATLAS_DB_PATH or atlas.db)
    #[arg(short, long)]
    db: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve cards for one or more titles
    Resolve {
        /// Search queries
        #[arg(required = true)]
        queries: Vec<String>,

        /// Look up manga instead of anime
        #[arg(long)]
        manga: bool,

        /// Max pipelines in flight
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Behave like a page opened from file:// (proxies first)
        #[arg(long)]
        file_origin: bool,
    },

    /// Get cache statistics
    Stats,

    /// Drop expired cache entries
    Prune,

    /// Remove the whole poster cache
    Clear,
}

/// Prints every card update to stdout
struct PrintRenderer;

impl CardRenderer for PrintRenderer {
    fn render(&self, subject: &Subject, view: &CardView) {
        let origin = match view.origin {
            ViewOrigin::FreshCache => "cache",
            ViewOrigin::StaleCache => "stale",
            ViewOrigin::Network => "network",
            ViewOrigin::Placeholder => "placeholder",
        };

        println!("\n🎴 {} [{}] ({})", view.title, subject.query, origin);
        println!("   Cover: {}", view.cover.url());

        if !view.genres.is_empty() {
            println!("   Genres: {}", view.genres.join(", "));
        }

        let pills: Vec<String> = view
            .score_pill()
            .map(|p| p.text)
            .into_iter()
            .chain(view.popularity_pill())
            .collect();
        if !pills.is_empty() {
            println!("   {}", pills.join("  "));
        }

        if let Some(label) = view.airing_label(Utc::now(), CountdownStyle::Badge) {
            println!("   ⏰ {}", label);
        }
    }

    fn notice(&self, message: &str) {
        println!("⚠️  {}", message);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anime_atlas_engine=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = AtlasConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    if let Commands::Resolve {
        concurrency,
        file_origin,
        ..
    } = &cli.command
    {
        if let Some(n) = concurrency {
            config.concurrency = (*n).max(1);
        }
        if *file_origin {
            config.origin = PageOrigin::File;
        }
    }

    let storage = Arc::new(SqliteStorage::new(&config.db_path).await?);
    let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
    let pipeline = MetadataPipeline::new(&config, storage, transport).await;

    match cli.command {
        Commands::Resolve { queries, manga, .. } => {
            let kind = if manga { MediaKind::Manga } else { MediaKind::Anime };
            let subjects: Vec<Subject> = queries
                .iter()
                .map(|q| Subject::new(q.clone(), q.clone(), kind))
                .collect();

            println!("🔍 Resolving {} {} title(s)", subjects.len(), kind);

            let report = pipeline.run_batch(subjects, &PrintRenderer).await;

            println!("\n📋 Summary:");
            for outcome in &report.outcomes {
                let source = match outcome.source {
                    ResolutionSource::CacheHit => "cache hit",
                    ResolutionSource::Fetched => "fetched",
                    ResolutionSource::Revalidated => "revalidated",
                    ResolutionSource::Failed => "failed",
                };
                println!(
                    "   {} -> {} ({}, {}, {:.2}ms)",
                    outcome.subject.query,
                    outcome.title,
                    source,
                    outcome.provider.as_deref().unwrap_or("-"),
                    outcome.latency_ms
                );
            }
            println!(
                "   Fetch attempts: {}, failures: {}",
                report.fetch_attempts, report.fetch_failures
            );
        }

        Commands::Stats => {
            let stats = pipeline.cache_stats().await;

            println!("📊 Cache Statistics:");
            println!("   Total entries: {}", stats.total_entries);
            println!("   Fresh: {}", stats.fresh_entries);
            println!("   Stale: {}", stats.stale_entries);
            println!("   Blob size: {} bytes", stats.blob_bytes);

            if let Some(oldest) = stats.oldest_entry {
                println!("   Oldest entry: {}", oldest.format("%Y-%m-%d %H:%M:%S"));
            }

            if let Some(newest) = stats.newest_entry {
                println!("   Newest entry: {}", newest.format("%Y-%m-%d %H:%M:%S"));
            }
        }

        Commands::Prune => {
            println!("🧹 Dropping entries older than {}d...", config.cache_ttl.as_secs() / 86_400);

            let removed = pipeline.prune_cache().await;

            println!("✅ Removed {} entries", removed);
        }

        Commands::Clear => {
            pipeline.clear_cache().await;
            println!("✅ Poster cache cleared");
        }
    }

    Ok(())
}
