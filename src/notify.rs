//! New-episode email notifications.
//!
//! For a fixed watch list, ask AniList which episode airs next. Once that
//! episode's air time has passed and it is newer than the last one we
//! notified about, it goes into a single digest email sent through Brevo
//! to every subscriber.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ANILIST_ENDPOINT;
use crate::core::{MediaStatus, NextAiringEpisode};
use crate::error::{AtlasError, Result};
use crate::transport::HttpTransport;

pub const BREVO_ENDPOINT: &str = "https://api.brevo.com/v3/smtp/email";
pub const DEFAULT_SENDER_NAME: &str = "Anime Atlas";

pub const UPDATE_SUBJECT: &str = "New anime episodes released";
pub const TEST_SUBJECT: &str = "Test anime episode notification";

/// A watched show: display title (also the last-episode key) and search query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchEntry {
    pub title: &'static str,
    pub query: &'static str,
}

const fn watch(title: &'static str, query: &'static str) -> WatchEntry {
    WatchEntry { title, query }
}

pub const WATCH_LIST: [WatchEntry; 10] = [
    watch("Naruto", "Naruto"),
    watch("One Piece", "One Piece"),
    watch("Attack on Titan", "Shingeki no Kyojin"),
    watch("My Hero Academia", "Boku no Hero Academia"),
    watch("Dragon Ball Z", "Dragon Ball Z"),
    watch("Demon Slayer", "Kimetsu no Yaiba"),
    watch("One Punch Man", "One Punch Man"),
    watch("Spy x Family", "Spy x Family"),
    watch("Chainsaw Man", "Chainsaw Man"),
    watch("Jujutsu Kaisen", "Jujutsu Kaisen"),
];

const AIRING_QUERY: &str = r#"
query ($search: String) {
  Media(search: $search, type: ANIME) {
    title {
      romaji
      english
    }
    status
    nextAiringEpisode {
      airingAt
      episode
    }
    siteUrl
  }
}
"#;

#[derive(Debug, Deserialize)]
struct AiringResponse {
    #[serde(default)]
    data: Option<AiringData>,
}

#[derive(Debug, Deserialize)]
struct AiringData {
    #[serde(rename = "Media", default)]
    media: Option<AiringMedia>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiringTitle {
    #[serde(default)]
    pub romaji: Option<String>,
    #[serde(default)]
    pub english: Option<String>,
}

/// Airing info for one watched show
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiringMedia {
    #[serde(default)]
    pub title: Option<AiringTitle>,
    #[serde(default)]
    pub status: Option<MediaStatus>,
    #[serde(default)]
    pub next_airing_episode: Option<NextAiringEpisode>,
    #[serde(default)]
    pub site_url: Option<String>,
}

/// One row of the digest email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeUpdate {
    pub title: String,
    pub episode: u32,
    pub aired: String,
    pub url: String,
}

/// Watch-list title -> last episode already notified
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LastEpisodes(BTreeMap<String, u32>);

impl LastEpisodes {
    /// Missing or unreadable file starts from scratch
    pub fn load(path: &Path) -> Self {
        read_json(path).unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn get(&self, title: &str) -> u32 {
        self.0.get(title).copied().unwrap_or(0)
    }

    pub fn record(&mut self, title: &str, episode: u32) {
        self.0.insert(title.to_string(), episode);
    }
}

#[derive(Debug, Default, Deserialize)]
struct SubscriberFile {
    #[serde(default)]
    emails: Vec<String>,
}

/// Recipient list from `{"emails": [...]}`; an empty list is an error
pub fn load_subscribers(path: &Path) -> Result<Vec<String>> {
    let file: SubscriberFile = read_json(path).unwrap_or_default();
    let emails: Vec<String> = file
        .emails
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();

    if emails.is_empty() {
        return Err(AtlasError::Notify(format!("No subscribers found in {}", path.display())));
    }

    Ok(emails)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring unreadable {}: {}", path.display(), e);
            None
        }
    }
}

/// Query AniList directly (no proxies, no retry)
pub async fn fetch_airing(transport: &dyn HttpTransport, endpoint: &str, search: &str) -> Result<Option<AiringMedia>> {
    let body = json!({
        "query": AIRING_QUERY,
        "variables": { "search": search },
    });

    let response = transport.post_json(endpoint, &body, &[]).await?;
    if !response.is_success() {
        return Err(AtlasError::Provider {
            provider: "anilist".to_string(),
            message: format!("HTTP {} for {}", response.status, search),
        });
    }

    let payload: AiringResponse = serde_json::from_str(&response.body)?;
    Ok(payload.data.and_then(|d| d.media))
}

/// Digest row if the next episode has aired and is newer than `last`
pub fn detect_update(entry: &WatchEntry, media: &AiringMedia, last: u32, now: DateTime<Utc>) -> Option<EpisodeUpdate> {
    let next = media.next_airing_episode?;
    if !next.has_aired(now) || next.episode <= last {
        return None;
    }

    let title = media.title.clone().unwrap_or_default();
    Some(EpisodeUpdate {
        title: title
            .english
            .filter(|t| !t.is_empty())
            .or(title.romaji.filter(|t| !t.is_empty()))
            .unwrap_or_else(|| entry.title.to_string()),
        episode: next.episode,
        aired: local_time(next.airing_at),
        url: media
            .site_url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "#".to_string()),
    })
}

fn local_time(unix_seconds: i64) -> String {
    if unix_seconds <= 0 {
        return "Unknown".to_string();
    }
    match Local.timestamp_opt(unix_seconds, 0).single() {
        Some(at) => format_local(at),
        None => "Unknown".to_string(),
    }
}

fn format_local(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Check every watched show; failures are logged and the show skipped.
/// `last` is updated for each show that produced a row.
pub async fn collect_updates(
    transport: &dyn HttpTransport,
    endpoint: &str,
    watch_list: &[WatchEntry],
    last: &mut LastEpisodes,
    now: DateTime<Utc>,
) -> Vec<EpisodeUpdate> {
    let mut updates = Vec::new();

    for entry in watch_list {
        let media = match fetch_airing(transport, endpoint, entry.query).await {
            Ok(Some(media)) => media,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!("⚠️ Failed for {}: {}", entry.title, e);
                continue;
            }
        };

        if let Some(update) = detect_update(entry, &media, last.get(entry.title), now) {
            tracing::info!("🆕 {} episode {}", update.title, update.episode);
            last.record(entry.title, update.episode);
            updates.push(update);
        }
    }

    updates
}

pub fn build_email(updates: &[EpisodeUpdate]) -> String {
    const CELL: &str = "padding:8px 12px;border-bottom:1px solid #e6e6e6;";
    const HEAD: &str = "padding:8px 12px;border-bottom:2px solid #111;";

    let rows: Vec<String> = updates
        .iter()
        .map(|u| {
            format!(
                "<tr><td style=\"{c}\">{}</td><td style=\"{c}\">Episode {}</td><td style=\"{c}\">{}</td><td style=\"{c}\"><a href=\"{}\">Link</a></td></tr>",
                escape_html(&u.title),
                u.episode,
                escape_html(&u.aired),
                escape_html(&u.url),
                c = CELL,
            )
        })
        .collect();

    format!(
        "<h2>New anime episodes are out!</h2>\n\
         <p>Here's what just released:</p>\n\
         <table style=\"border-collapse:collapse;width:100%;\">\n\
         <thead><tr>\
         <th align=\"left\" style=\"{h}\">Anime</th>\
         <th align=\"left\" style=\"{h}\">Episode</th>\
         <th align=\"left\" style=\"{h}\">Aired</th>\
         <th align=\"left\" style=\"{h}\">More</th>\
         </tr></thead>\n\
         <tbody>\n{}\n</tbody>\n\
         </table>\n",
        rows.join("\n"),
        h = HEAD,
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Brevo transactional email settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrevoMailer {
    api_key: Option<String>,
    sender_email: Option<String>,
    sender_name: String,
    endpoint: String,
}

impl BrevoMailer {
    pub fn from_env() -> Self {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("BREVO_"))
            .collect();
        Self::from_vars(&vars)
    }

    /// Reads `BREVO_API_KEY`, `BREVO_SENDER_EMAIL` and `BREVO_SENDER_NAME`.
    /// Missing credentials only fail at send time.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let non_empty = |key: &str| vars.get(key).filter(|v| !v.trim().is_empty()).cloned();

        Self {
            api_key: non_empty("BREVO_API_KEY"),
            sender_email: non_empty("BREVO_SENDER_EMAIL"),
            sender_name: non_empty("BREVO_SENDER_NAME").unwrap_or_else(|| DEFAULT_SENDER_NAME.to_string()),
            endpoint: BREVO_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (self.api_key.as_deref(), self.sender_email.as_deref()) {
            (Some(key), Some(email)) => Ok((key, email)),
            _ => Err(AtlasError::Notify("Missing Brevo credentials.".to_string())),
        }
    }

    pub async fn send(
        &self,
        transport: &dyn HttpTransport,
        recipients: &[String],
        subject: &str,
        html: &str,
    ) -> Result<()> {
        let (api_key, sender_email) = self.credentials()?;

        let body = json!({
            "sender": { "email": sender_email, "name": self.sender_name },
            "to": recipients.iter().map(|email| json!({ "email": email })).collect::<Vec<_>>(),
            "subject": subject,
            "htmlContent": html,
        });

        let response = transport
            .post_json(&self.endpoint, &body, &[("api-key", api_key)])
            .await?;

        if !response.is_success() {
            return Err(AtlasError::Notify(format!("Brevo error: {}", response.body)));
        }

        Ok(())
    }
}

/// What a run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    TestSent,
    Sent(usize),
    NothingNew,
}

/// One scheduled run of the notifier
pub struct NotifyJob {
    transport: Arc<dyn HttpTransport>,
    mailer: BrevoMailer,
    anilist_endpoint: String,
    last_episodes_path: PathBuf,
    subscribers_path: PathBuf,
}

impl NotifyJob {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        mailer: BrevoMailer,
        last_episodes_path: impl Into<PathBuf>,
        subscribers_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            mailer,
            anilist_endpoint: ANILIST_ENDPOINT.to_string(),
            last_episodes_path: last_episodes_path.into(),
            subscribers_path: subscribers_path.into(),
        }
    }

    pub fn with_anilist_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.anilist_endpoint = endpoint.into();
        self
    }

    /// `force` sends a single test row and skips the watch list
    pub async fn run(&self, force: bool, now: DateTime<Utc>) -> Result<NotifyOutcome> {
        if force {
            let test_row = EpisodeUpdate {
                title: "Test Anime".to_string(),
                episode: 1,
                aired: format_local(now.with_timezone(&Local)),
                url: "https://anilist.co".to_string(),
            };
            self.deliver(&[test_row], TEST_SUBJECT).await?;
            tracing::info!("📧 Sent test notification");
            return Ok(NotifyOutcome::TestSent);
        }

        let mut last = LastEpisodes::load(&self.last_episodes_path);
        let updates = collect_updates(
            self.transport.as_ref(),
            &self.anilist_endpoint,
            &WATCH_LIST,
            &mut last,
            now,
        )
        .await;

        if updates.is_empty() {
            tracing::info!("No new episodes to notify");
            return Ok(NotifyOutcome::NothingNew);
        }

        self.deliver(&updates, UPDATE_SUBJECT).await?;
        last.save(&self.last_episodes_path)?;

        tracing::info!("📧 Sent {} update(s)", updates.len());
        Ok(NotifyOutcome::Sent(updates.len()))
    }

    async fn deliver(&self, updates: &[EpisodeUpdate], subject: &str) -> Result<()> {
        self.mailer.credentials()?;
        let recipients = load_subscribers(&self.subscribers_path)?;
        let html = build_email(updates);
        self.mailer
            .send(self.transport.as_ref(), &recipients, subject, &html)
            .await
    }
}
