pub mod anilist;
pub mod fallback;
pub mod jikan;

use async_trait::async_trait;
use crate::core::{FetchResult, Subject};
use crate::error::Result;

pub use anilist::AniListProvider;
pub use fallback::{FallbackResolver, FetchTally, Resolution};
pub use jikan::JikanProvider;

/// Trait for metadata providers (AniList, Jikan, ...)
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Resolve card metadata for a subject.
    ///
    /// `Ok(None)` means the provider answered but knows nothing usable
    /// (including malformed payloads); `Err` means it could not be asked.
    async fn resolve(&self, subject: &Subject) -> Result<Option<FetchResult>>;

    /// Get provider name
    fn name(&self) -> &str;
}
