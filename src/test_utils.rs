//! Test utilities and fixtures.
//!
//! This module provides common test helpers, fixture factories, and
//! database utilities to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use songs_api::test_utils::{temp_db, insert_mock_song};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (storage, _dir) = temp_db().await;
//!     let id = insert_mock_song(&storage, "Muse", "Uprising", &["line"]).await;
//!     // ... test logic
//! }
//! ```

use tempfile::TempDir;

use crate::db::Storage;
use crate::model::{NewSong, SongDetail};

/// Creates a temporary database for testing.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Migrations are run
/// automatically.
///
/// Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (Storage, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = format!("sqlite:{}", db_path.display());

    let pool = crate::db::init_db(&db_url, 5)
        .await
        .expect("Failed to initialize test database");

    (Storage::new(pool), dir)
}

/// Creates a song creation request.
pub fn mock_new_song(group: &str, song: &str) -> NewSong {
    NewSong {
        group: group.to_string(),
        song: song.to_string(),
    }
}

/// Creates a SongDetail with fixed release date and link and the given lines.
pub fn mock_detail(lines: &[&str]) -> SongDetail {
    SongDetail {
        release_date: "2009-09-14".to_string(),
        text: lines.iter().map(|l| l.to_string()).collect(),
        link: "https://example.com/song".to_string(),
    }
}

/// Inserts a song with the given lyric lines and returns its ID.
pub async fn insert_mock_song(storage: &Storage, group: &str, song: &str, lines: &[&str]) -> i64 {
    storage
        .add_song(&mock_new_song(group, song), &mock_detail(lines))
        .await
        .expect("Failed to insert song")
}

/// Counts rows in a table. `table` must be a trusted literal.
pub async fn count_rows(storage: &Storage, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(storage.pool())
        .await
        .expect("Failed to count rows");
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (storage, _dir) = temp_db().await;
        assert_eq!(count_rows(&storage, "songs").await, 0);
    }

    #[tokio::test]
    async fn test_insert_mock_song() {
        let (storage, _dir) = temp_db().await;

        let id = insert_mock_song(&storage, "Muse", "Uprising", &["one", "two"]).await;
        assert!(id > 0);
        assert_eq!(count_rows(&storage, "song_lyrics").await, 2);
    }

    #[test]
    fn test_mock_detail_defaults() {
        let detail = mock_detail(&["a"]);
        assert_eq!(detail.text, vec!["a"]);
        assert!(!detail.release_date.is_empty());
    }
}
