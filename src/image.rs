use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{AtlasError, Result};
use crate::transport::HttpTransport;

/// Checks whether a cover URL can actually be loaded
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn load(&self, url: &str) -> Result<()>;
}

/// Probes covers with a HEAD request
pub struct HttpImageProbe {
    transport: Arc<dyn HttpTransport>,
}

impl HttpImageProbe {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn load(&self, url: &str) -> Result<()> {
        let status = self.transport.head(url).await?;
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(AtlasError::HttpStatus { status })
        }
    }
}

/// Ordered cover URLs ending in the local placeholder asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverCandidates {
    remote: Vec<String>,
    placeholder: String,
}

impl CoverCandidates {
    /// High-res first, then the fallback resolution; blanks and duplicates dropped
    pub fn new(primary: Option<&str>, fallback: Option<&str>, placeholder: impl Into<String>) -> Self {
        let mut remote: Vec<String> = Vec::with_capacity(2);
        for url in [primary, fallback].into_iter().flatten() {
            let url = url.trim();
            if !url.is_empty() && !remote.iter().any(|u| u == url) {
                remote.push(url.to_string());
            }
        }

        Self {
            remote,
            placeholder: placeholder.into(),
        }
    }

    pub fn placeholder_only(placeholder: impl Into<String>) -> Self {
        Self::new(None, None, placeholder)
    }

    pub fn remote(&self) -> &[String] {
        &self.remote
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }
}

/// Cover that ended up on the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedCover {
    Remote(String),
    Placeholder(String),
}

impl LoadedCover {
    pub fn url(&self) -> &str {
        match self {
            LoadedCover::Remote(url) | LoadedCover::Placeholder(url) => url,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, LoadedCover::Placeholder(_))
    }
}

/// Try each remote candidate once, in order; first load wins.
/// The placeholder is local and always loads.
pub async fn load_cover(probe: &dyn ImageProbe, candidates: &CoverCandidates) -> LoadedCover {
    for url in candidates.remote() {
        match probe.load(url).await {
            Ok(()) => return LoadedCover::Remote(url.clone()),
            Err(e) => tracing::debug!("Cover {} failed to load: {}", url, e),
        }
    }

    LoadedCover::Placeholder(candidates.placeholder().to_string())
}
