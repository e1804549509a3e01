//! Trait definition for the metadata service client.
//!
//! Handlers depend on [`MetadataApi`] rather than the concrete client so
//! tests can substitute mock implementations.

use async_trait::async_trait;

use super::domain::EnrichmentError;
use crate::model::SongDetail;

/// Trait for song detail lookup.
#[async_trait]
pub trait MetadataApi: Send + Sync {
    /// Fetch release date, lyrics and link for a song.
    async fn fetch_detail(&self, group: &str, song: &str) -> Result<SongDetail, EnrichmentError>;
}

#[async_trait]
impl MetadataApi for super::client::MetadataClient {
    async fn fetch_detail(&self, group: &str, song: &str) -> Result<SongDetail, EnrichmentError> {
        self.fetch_detail(group, song).await
    }
}
