//! Core data models for the song catalogue.
//!
//! Defines [`Song`] as returned to clients, plus the request bodies accepted
//! by the HTTP layer.
//!
//! # Database Schema
//!
//! The models map to the following tables:
//! - `groups` - Performing groups with unique names
//! - `songs` - Songs referencing a group, with release date and link
//! - `song_lyrics` - One row per lyric line, ordered by row id

pub mod pagination;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

pub use pagination::Pagination;

use crate::error::{Error, Result};

/// A song with its group name resolved for display.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, ToSchema)]
pub struct Song {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Group display name (joined from `groups`)
    #[schema(example = "Muse")]
    pub group: String,
    /// Song title
    #[serde(rename = "song")]
    #[schema(example = "Supermassive Black Hole")]
    pub name: String,
    /// Release date as supplied by the metadata service
    #[serde(rename = "releaseDate")]
    #[schema(example = "16.07.2006")]
    pub release_date: String,
    /// External link
    pub link: String,
}

/// Request body for creating a song or replacing its group and title.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
pub struct NewSong {
    #[schema(example = "Muse")]
    pub group: String,
    #[serde(alias = "name")]
    #[schema(example = "Supermassive Black Hole")]
    pub song: String,
}

impl NewSong {
    /// Reject blank group or song names.
    pub fn validate(&self) -> Result<()> {
        if self.group.trim().is_empty() {
            return Err(Error::validation("field `group` must not be empty"));
        }
        if self.song.trim().is_empty() {
            return Err(Error::validation("field `song` must not be empty"));
        }
        Ok(())
    }
}

/// Enrichment data for a song, as returned by the metadata service.
///
/// Never persisted as its own entity: `release_date` and `link` are copied
/// onto the song row and each entry of `text` becomes one lyric line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SongDetail {
    #[serde(rename = "releaseDate", default)]
    pub release_date: String,
    #[serde(default)]
    pub text: Vec<String>,
    #[serde(default)]
    pub link: String,
}

/// Partial update of a song.
///
/// The field set is the complete list of updatable columns. Any other key in
/// the request body (including `id`) fails deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SongUpdate {
    pub group: Option<String>,
    #[serde(alias = "name")]
    pub song: Option<String>,
    #[serde(rename = "releaseDate")]
    pub release_date: Option<String>,
    pub link: Option<String>,
}

impl SongUpdate {
    pub fn is_empty(&self) -> bool {
        self.group.is_none()
            && self.song.is_none()
            && self.release_date.is_none()
            && self.link.is_none()
    }

    /// An update must touch at least one column, and names may not be blank.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::validation(
                "update must contain at least one of: group, song, releaseDate, link",
            ));
        }
        if self.group.as_deref().is_some_and(|g| g.trim().is_empty()) {
            return Err(Error::validation("field `group` must not be empty"));
        }
        if self.song.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(Error::validation("field `song` must not be empty"));
        }
        Ok(())
    }
}

/// Substring filters for listing songs. Empty strings match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SongFilter {
    pub group: String,
    pub song: String,
}
