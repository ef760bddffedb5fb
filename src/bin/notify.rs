use chrono::Utc;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use anime_atlas_engine::notify::{BrevoMailer, NotifyJob, NotifyOutcome};
use anime_atlas_engine::transport::ReqwestTransport;
use anime_atlas_engine::AtlasConfig;

const LAST_EPISODES_FILE: &str = "data/last-episodes.json";
const SUBSCRIBERS_FILE: &str = "data/subscribers.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "episode_notifier=info,anime_atlas_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AtlasConfig::from_env();
    let force = std::env::var("FORCE_NOTIFY").map(|v| v == "1").unwrap_or(false);

    let last_episodes = std::env::var("LAST_EPISODES_FILE").unwrap_or_else(|_| LAST_EPISODES_FILE.to_string());
    let subscribers = std::env::var("SUBSCRIBERS_FILE").unwrap_or_else(|_| SUBSCRIBERS_FILE.to_string());

    tracing::info!("🚀 Starting episode notifier");
    tracing::info!("📦 Last episodes: {}", last_episodes);
    tracing::info!("📬 Subscribers: {}", subscribers);

    let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
    let job = NotifyJob::new(transport, BrevoMailer::from_env(), last_episodes, subscribers)
        .with_anilist_endpoint(config.primary_endpoint);

    match job.run(force, Utc::now()).await? {
        NotifyOutcome::TestSent => println!("Sent test notification."),
        NotifyOutcome::Sent(n) => println!("Sent {} update(s).", n),
        NotifyOutcome::NothingNew => println!("No new episodes to notify."),
    }

    Ok(())
}
