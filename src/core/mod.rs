pub mod metadata;
pub mod subject;

pub use metadata::{FetchResult, MediaStatus, MetadataRecord, NextAiringEpisode, MAX_GENRES};
pub use subject::{MediaKind, Subject};
