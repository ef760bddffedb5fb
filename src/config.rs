//! Runtime configuration with defaults matching the live site.
//!
//! Every knob can be overridden through `ATLAS_*` variables:
//!
//! | variable                   | meaning                                |
//! |----------------------------|----------------------------------------|
//! | `ATLAS_DB_PATH`            | SQLite file backing the poster cache   |
//! | `ATLAS_CACHE_TTL_DAYS`     | freshness window                       |
//! | `ATLAS_CONCURRENCY`        | batch worker count                     |
//! | `ATLAS_RATE_LIMIT_RETRIES` | retries after HTTP 429                 |
//! | `ATLAS_RATE_LIMIT_STEP_MS` | linear backoff step after HTTP 429     |
//! | `ATLAS_RETRIES`            | retries after network failures         |
//! | `ATLAS_RETRY_STEP_MS`      | linear backoff step after failures     |
//! | `ATLAS_ORIGIN`             | `http` or `file`                       |
//! | `ATLAS_TIMEOUT_SECS`       | per-request timeout                    |
//! | `ATLAS_PLACEHOLDER`        | local placeholder cover asset          |

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AtlasError;
use crate::retry::RetryPolicy;

pub const ANILIST_ENDPOINT: &str = "https://graphql.anilist.co";
pub const JIKAN_BASE_URL: &str = "https://api.jikan.moe";

const SECS_PER_DAY: u64 = 86_400;

/// URL-prefix mirrors of the primary endpoint
pub const CORS_PROXY_PREFIXES: [&str; 2] = [
    "https://cors.isomorphic-git.org/",
    "https://corsproxy.io/?",
];

/// Where the page was loaded from. File origins cannot reach the primary
/// provider directly, so proxies go first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PageOrigin {
    #[default]
    Http,
    File,
}

impl FromStr for PageOrigin {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "https" => Ok(PageOrigin::Http),
            "file" => Ok(PageOrigin::File),
            other => Err(AtlasError::Config(format!("unknown origin: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtlasConfig {
    pub db_path: String,

    /// Storage key holding the whole poster cache blob
    pub storage_key: String,

    pub cache_ttl: Duration,

    /// Max pipelines in flight per batch
    pub concurrency: usize,

    /// Applied inside the primary provider after HTTP 429
    pub rate_limit_retry: RetryPolicy,

    /// Applied around the whole provider chain after network failures
    pub transient_retry: RetryPolicy,

    pub origin: PageOrigin,

    pub primary_endpoint: String,
    pub proxy_prefixes: Vec<String>,
    pub secondary_base_url: String,

    pub placeholder_image: String,

    pub request_timeout: Duration,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            db_path: "atlas.db".to_string(),
            storage_key: "animeAtlasPosterCache".to_string(),
            cache_ttl: Duration::from_secs(60 * 60 * 24 * 7),
            concurrency: 6,
            rate_limit_retry: RetryPolicy::new(2, 400),
            transient_retry: RetryPolicy::new(2, 300),
            origin: PageOrigin::Http,
            primary_endpoint: ANILIST_ENDPOINT.to_string(),
            proxy_prefixes: CORS_PROXY_PREFIXES.iter().map(|p| p.to_string()).collect(),
            secondary_base_url: JIKAN_BASE_URL.to_string(),
            placeholder_image: "assets/placeholder.svg".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl AtlasConfig {
    /// Build from the process environment
    pub fn from_env() -> Self {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with("ATLAS_"))
            .collect();
        Self::from_vars(&vars)
    }

    /// Apply `ATLAS_*` overrides on top of the defaults; unparseable values
    /// keep the default.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let defaults = Self::default();

        let cache_ttl = parse_var::<u64>(vars, "ATLAS_CACHE_TTL_DAYS")
            .and_then(|days| {
                let ttl = days
                    .checked_mul(SECS_PER_DAY)
                    .map(Duration::from_secs)
                    .filter(|ttl| chrono::Duration::from_std(*ttl).is_ok());
                if ttl.is_none() {
                    tracing::warn!("Ignoring out-of-range ATLAS_CACHE_TTL_DAYS={}, using default", days);
                }
                ttl
            })
            .unwrap_or(defaults.cache_ttl);

        let rate_limit_retry = RetryPolicy::new(
            parse_var(vars, "ATLAS_RATE_LIMIT_RETRIES").unwrap_or(defaults.rate_limit_retry.max_retries),
            parse_var(vars, "ATLAS_RATE_LIMIT_STEP_MS").unwrap_or(defaults.rate_limit_retry.step_ms),
        );

        let transient_retry = RetryPolicy::new(
            parse_var(vars, "ATLAS_RETRIES").unwrap_or(defaults.transient_retry.max_retries),
            parse_var(vars, "ATLAS_RETRY_STEP_MS").unwrap_or(defaults.transient_retry.step_ms),
        );

        Self {
            db_path: vars.get("ATLAS_DB_PATH").cloned().unwrap_or(defaults.db_path),
            storage_key: defaults.storage_key,
            cache_ttl,
            concurrency: parse_var::<usize>(vars, "ATLAS_CONCURRENCY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.concurrency),
            rate_limit_retry,
            transient_retry,
            origin: parse_var(vars, "ATLAS_ORIGIN").unwrap_or(defaults.origin),
            primary_endpoint: defaults.primary_endpoint,
            proxy_prefixes: defaults.proxy_prefixes,
            secondary_base_url: defaults.secondary_base_url,
            placeholder_image: vars
                .get("ATLAS_PLACEHOLDER")
                .cloned()
                .unwrap_or(defaults.placeholder_image),
            request_timeout: parse_var::<u64>(vars, "ATLAS_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        }
    }

    /// Primary provider endpoints in origin-dependent fallback order
    pub fn anilist_endpoints(&self) -> Vec<String> {
        let proxies = self
            .proxy_prefixes
            .iter()
            .map(|prefix| format!("{}{}", prefix, self.primary_endpoint));

        match self.origin {
            PageOrigin::Http => std::iter::once(self.primary_endpoint.clone())
                .chain(proxies)
                .collect(),
            PageOrigin::File => proxies
                .chain(std::iter::once(self.primary_endpoint.clone()))
                .collect(),
        }
    }

    pub fn cache_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.cache_ttl).unwrap_or_else(|_| chrono::Duration::days(7))
    }
}

fn parse_var<T: FromStr>(vars: &HashMap<String, String>, key: &str) -> Option<T> {
    let raw = vars.get(key)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}, using default", key, raw);
            None
        }
    }
}

impl fmt::Display for AtlasConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "db={}, ttl={}d, concurrency={}, 429-retry={}, retry={}, origin={:?}, timeout={}s",
            self.db_path,
            self.cache_ttl.as_secs() / 86_400,
            self.concurrency,
            self.rate_limit_retry,
            self.transient_retry,
            self.origin,
            self.request_timeout.as_secs()
        )
    }
}
