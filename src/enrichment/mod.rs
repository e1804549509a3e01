//! Song enrichment - fetches release date, lyrics and link from the external
//! metadata service.
//!
//! # Architecture
//!
//! - **Domain** (`domain.rs`) - Error type and retry classification
//! - **Client** (`client.rs`) - HTTP client with timeout and bounded retry
//! - **Traits** (`traits.rs`) - [`MetadataApi`] seam used by the HTTP handlers
//!
//! # Usage
//!
//! ```ignore
//! use songs_api::enrichment::{MetadataClient, MetadataApi};
//!
//! let client = MetadataClient::new(&config.metadata)?;
//! let detail = client.fetch_detail("Muse", "Uprising").await?;
//! println!("Released {}, {} lines", detail.release_date, detail.text.len());
//! ```

pub mod client;
pub mod domain;
pub mod traits;

pub use client::MetadataClient;
pub use domain::EnrichmentError;
pub use traits::MetadataApi;
