//! Storage engine for songs, groups and lyric lines.
//!
//! Uses SQLx with SQLite. All SQL is parameterized; no caller-supplied
//! string is ever interpolated into statement text. Multi-row writes
//! (song creation, updates that resolve a group, deletes) run in a single
//! transaction, which rolls back on any error or if the future is dropped.
//!
//! # Example
//!
//! ```ignore
//! use songs_api::db::{init_db, Storage};
//!
//! let pool = init_db("sqlite:songs.db", 5).await?;
//! let storage = Storage::new(pool);
//! storage.create_indexes().await?;
//! let songs = storage.get_songs(&SongFilter::default(), Pagination::new(1, 10)?).await?;
//! ```

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqliteConnection;
use sqlx::migrate::{Migrate, Migrator};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, instrument};

use crate::error::{Error, Result, ResultExt};
use crate::model::{NewSong, Pagination, Song, SongDetail, SongFilter, SongUpdate};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// How long a connection waits for another writer before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Secondary indexes backing the list filters and the lyrics foreign key.
const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_songs_group_id ON songs(group_id)",
    "CREATE INDEX IF NOT EXISTS idx_songs_name ON songs(name)",
    "CREATE INDEX IF NOT EXISTS idx_song_lyrics_song_id ON song_lyrics(song_id)",
];

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool, and runs all pending migrations.
///
/// # Errors
///
/// Returns an error if:
/// - Database creation fails
/// - Connection cannot be established
/// - Migration fails
pub async fn init_db(db_url: &str, max_connections: u32) -> sqlx::Result<SqlitePool> {
    // WAL lets readers run alongside the single writer; concurrent writers
    // queue on the busy timeout instead of failing.
    let options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;

    Ok(pool)
}

/// Revert the most recently applied migration.
///
/// Returns the reverted version, or `None` if nothing was applied.
pub async fn rollback_last_migration(pool: &SqlitePool) -> Result<Option<i64>> {
    let mut conn = pool.acquire().await?;
    conn.ensure_migrations_table().await?;

    let mut applied: Vec<i64> = conn
        .list_applied_migrations()
        .await?
        .into_iter()
        .map(|m| m.version)
        .collect();
    applied.sort_unstable();
    drop(conn);

    let Some(last) = applied.pop() else {
        return Ok(None);
    };
    let target = applied.last().copied().unwrap_or(0);

    MIGRATOR.undo(pool, target).await?;
    Ok(Some(last))
}

/// Build a `LIKE` pattern matching `needle` as a literal substring.
///
/// `%`, `_` and the escape character itself are escaped, so user input
/// never acts as a wildcard. Used with `ESCAPE '\'`.
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Get or create a group by name.
///
/// A single upsert: inside a transaction it is the first statement and takes
/// the write lock immediately, so concurrent writers queue on the busy
/// timeout rather than failing on a shared-to-write lock upgrade.
pub async fn get_or_create_group(conn: &mut SqliteConnection, name: &str) -> sqlx::Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO groups (name) VALUES (?)
        ON CONFLICT(name) DO UPDATE SET name = excluded.name
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    debug!(group = name, id, "Resolved group");
    Ok(id)
}

/// Append one lyric line to a song.
///
/// Lines are ordered by row id, so callers must insert them in text order.
pub async fn add_lyrics(conn: &mut SqliteConnection, song_id: i64, line: &str) -> sqlx::Result<()> {
    sqlx::query("INSERT INTO song_lyrics (song_id, lyrics_line) VALUES (?, ?)")
        .bind(song_id)
        .bind(line)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Handle to the song store. Cheap to clone; clones share the pool.
#[derive(Debug, Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Round-trip a trivial query to check the database is reachable.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create secondary indexes. Idempotent; safe on every startup.
    pub async fn create_indexes(&self) -> Result<()> {
        for statement in INDEXES {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!("Indexes ensured");
        Ok(())
    }

    /// List songs whose group and title contain the filter strings
    /// (ASCII case-insensitive), ordered by id.
    pub async fn get_songs(&self, filter: &SongFilter, page: Pagination) -> Result<Vec<Song>> {
        let songs = sqlx::query_as::<_, Song>(
            r#"
            SELECT s.id, g.name AS "group", s.name, s.release_date, s.link
            FROM songs s
            JOIN groups g ON s.group_id = g.id
            WHERE g.name LIKE ? ESCAPE '\' AND s.name LIKE ? ESCAPE '\'
            ORDER BY s.id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(like_pattern(&filter.group))
        .bind(like_pattern(&filter.song))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(songs)
    }

    /// Get a song by its database ID.
    pub async fn get_song(&self, id: i64) -> Result<Option<Song>> {
        let song = sqlx::query_as::<_, Song>(
            r#"
            SELECT s.id, g.name AS "group", s.name, s.release_date, s.link
            FROM songs s
            JOIN groups g ON s.group_id = g.id
            WHERE s.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(song)
    }

    /// A page of a song's lyric lines in insertion order.
    pub async fn get_lyrics(&self, song_id: i64, page: Pagination) -> Result<Vec<String>> {
        let lines = sqlx::query_scalar::<_, String>(
            r#"
            SELECT lyrics_line
            FROM song_lyrics
            WHERE song_id = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(song_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Persist a song and all of its lyric lines atomically.
    ///
    /// The group is looked up by name and created if absent. Either the song
    /// row, its group and every lyric row commit together, or nothing does.
    ///
    /// # Returns
    ///
    /// The database ID of the new song.
    #[instrument(skip(self, detail), fields(lines = detail.text.len()), err)]
    pub async fn add_song(&self, song: &NewSong, detail: &SongDetail) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let group_id = get_or_create_group(&mut tx, &song.group).await?;
        let (song_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO songs (group_id, name, release_date, link)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(group_id)
        .bind(&song.song)
        .bind(&detail.release_date)
        .bind(&detail.link)
        .fetch_one(&mut *tx)
        .await?;

        for (i, line) in detail.text.iter().enumerate() {
            add_lyrics(&mut tx, song_id, line)
                .await
                .with_context(format!("lyric line {} of song {}", i + 1, song_id))?;
        }

        tx.commit().await?;
        info!(song_id, group = %song.group, song = %song.song, "Song added");
        Ok(song_id)
    }

    /// Replace a song's group and title.
    #[instrument(skip(self), err)]
    pub async fn update_song(&self, id: i64, song: &NewSong) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let group_id = get_or_create_group(&mut tx, &song.group).await?;
        let result = sqlx::query("UPDATE songs SET group_id = ?, name = ? WHERE id = ?")
            .bind(group_id)
            .bind(&song.song)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("song {}", id)));
        }

        tx.commit().await?;
        info!(song_id = id, "Song updated");
        Ok(())
    }

    /// Update only the columns present in `update`.
    ///
    /// The statement text is fixed; absent fields bind NULL and keep the
    /// current value through `COALESCE`.
    #[instrument(skip(self), err)]
    pub async fn update_song_partial(&self, id: i64, update: &SongUpdate) -> Result<()> {
        update.validate()?;
        let mut tx = self.pool.begin().await?;

        let group_id = match &update.group {
            Some(name) => Some(get_or_create_group(&mut tx, name).await?),
            None => None,
        };

        let result = sqlx::query(
            r#"
            UPDATE songs SET
                group_id = COALESCE(?, group_id),
                name = COALESCE(?, name),
                release_date = COALESCE(?, release_date),
                link = COALESCE(?, link)
            WHERE id = ?
            "#,
        )
        .bind(group_id)
        .bind(&update.song)
        .bind(&update.release_date)
        .bind(&update.link)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("song {}", id)));
        }

        tx.commit().await?;
        info!(song_id = id, "Song partially updated");
        Ok(())
    }

    /// Delete a song together with its lyric lines.
    #[instrument(skip(self), err)]
    pub async fn delete_song(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let lyrics = sqlx::query("DELETE FROM song_lyrics WHERE song_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM songs WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("song {}", id)));
        }

        tx.commit().await?;
        info!(song_id = id, lyric_lines = lyrics.rows_affected(), "Song deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::{count_rows, insert_mock_song, mock_detail, mock_new_song, temp_db};

    #[tokio::test]
    async fn test_init_db_creates_database() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db_url = format!("sqlite:{}", db_path.display());

        let pool = init_db(&db_url, 2).await.expect("Failed to init db");
        assert!(db_path.exists());

        let storage = Storage::new(pool);
        let songs = storage
            .get_songs(&SongFilter::default(), Pagination::new(1, 10).unwrap())
            .await
            .expect("Failed to query songs");
        assert!(songs.is_empty());
    }

    #[tokio::test]
    async fn test_create_indexes_is_idempotent() {
        let (storage, _dir) = temp_db().await;
        storage.create_indexes().await.unwrap();
        storage.create_indexes().await.unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'",
        )
        .fetch_one(storage.pool())
        .await
        .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_rollback_last_migration() {
        let (storage, _dir) = temp_db().await;

        let reverted = rollback_last_migration(storage.pool()).await.unwrap();
        assert!(reverted.is_some());

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'songs'",
        )
        .fetch_all(storage.pool())
        .await
        .unwrap();
        assert!(tables.is_empty());

        // Nothing left to revert
        assert_eq!(rollback_last_migration(storage.pool()).await.unwrap(), None);
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(""), "%%");
        assert_eq!(like_pattern("Muse"), "%Muse%");
        assert_eq!(like_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }

    #[tokio::test]
    async fn test_group_creation_and_retrieval() {
        let (storage, _dir) = temp_db().await;
        let mut conn = storage.pool().acquire().await.unwrap();

        let id1 = get_or_create_group(&mut conn, "Muse").await.unwrap();
        assert!(id1 > 0);

        let id2 = get_or_create_group(&mut conn, "Muse").await.unwrap();
        assert_eq!(id1, id2);

        let id3 = get_or_create_group(&mut conn, "Radiohead").await.unwrap();
        assert_ne!(id1, id3);
    }

    #[tokio::test]
    async fn test_add_song_persists_detail_and_lines_in_order() {
        let (storage, _dir) = temp_db().await;

        let song = mock_new_song("Muse", "Time Is Running Out");
        let detail = SongDetail {
            release_date: "2003-09-08".to_string(),
            text: vec!["line1".to_string(), "line2".to_string()],
            link: "http://example.com/tiro".to_string(),
        };
        let id = storage.add_song(&song, &detail).await.unwrap();

        let stored = storage.get_song(id).await.unwrap().unwrap();
        assert_eq!(stored.group, "Muse");
        assert_eq!(stored.name, "Time Is Running Out");
        assert_eq!(stored.release_date, "2003-09-08");
        assert_eq!(stored.link, "http://example.com/tiro");

        let lines = storage
            .get_lyrics(id, Pagination::new(1, 10).unwrap())
            .await
            .unwrap();
        assert_eq!(lines, vec!["line1", "line2"]);
        assert_eq!(count_rows(&storage, "songs").await, 1);
        assert_eq!(count_rows(&storage, "song_lyrics").await, 2);
    }

    #[tokio::test]
    async fn test_add_song_is_atomic() {
        let (storage, _dir) = temp_db().await;
        sqlx::query(
            r#"
            CREATE TRIGGER reject_line BEFORE INSERT ON song_lyrics
            WHEN NEW.lyrics_line = 'boom'
            BEGIN
                SELECT RAISE(ABORT, 'rejected lyric line');
            END
            "#,
        )
        .execute(storage.pool())
        .await
        .unwrap();

        let song = mock_new_song("Muse", "Knights of Cydonia");
        let detail = mock_detail(&["fine", "also fine", "boom", "never reached"]);
        let result = storage.add_song(&song, &detail).await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.to_string().contains("lyric line 3"));
        assert_eq!(count_rows(&storage, "songs").await, 0);
        assert_eq!(count_rows(&storage, "song_lyrics").await, 0);
        assert_eq!(count_rows(&storage, "groups").await, 0);
    }

    #[tokio::test]
    async fn test_lyrics_pagination_follows_insertion_order() {
        let (storage, _dir) = temp_db().await;
        let id = insert_mock_song(&storage, "Muse", "Starlight", &["a", "b", "c", "d", "e"]).await;

        let page = |p, l| Pagination::new(p, l).unwrap();
        assert_eq!(storage.get_lyrics(id, page(1, 2)).await.unwrap(), vec!["a", "b"]);
        assert_eq!(storage.get_lyrics(id, page(2, 2)).await.unwrap(), vec!["c", "d"]);
        assert_eq!(storage.get_lyrics(id, page(3, 2)).await.unwrap(), vec!["e"]);
        assert!(storage.get_lyrics(id, page(4, 2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_songs_filters_case_insensitively_within_limit() {
        let (storage, _dir) = temp_db().await;
        insert_mock_song(&storage, "Muse", "Uprising", &[]).await;
        insert_mock_song(&storage, "Muse", "Madness", &[]).await;
        insert_mock_song(&storage, "Radiohead", "Creep", &[]).await;
        insert_mock_song(&storage, "MUSE tribute", "Uprising (cover)", &[]).await;

        let cases = [
            ("muse", "", 10, 3),
            ("muse", "", 2, 2),
            ("", "UPRISING", 10, 2),
            ("radio", "creep", 10, 1),
            ("", "", 10, 4),
            ("nobody", "", 10, 0),
        ];

        for (group, song, limit, expected) in cases {
            let filter = SongFilter {
                group: group.to_string(),
                song: song.to_string(),
            };
            let songs = storage
                .get_songs(&filter, Pagination::new(1, limit).unwrap())
                .await
                .unwrap();

            assert_eq!(songs.len(), expected, "filter {:?}/{:?}", group, song);
            assert!(songs.len() as i64 <= limit);
            for s in &songs {
                assert!(s.group.to_lowercase().contains(group));
                assert!(s.name.to_lowercase().contains(&song.to_lowercase()));
            }
        }
    }

    #[tokio::test]
    async fn test_get_songs_pages_are_disjoint_and_ordered() {
        let (storage, _dir) = temp_db().await;
        for i in 0..5 {
            insert_mock_song(&storage, "Muse", &format!("Song {}", i), &[]).await;
        }

        let filter = SongFilter::default();
        let first = storage.get_songs(&filter, Pagination::new(1, 3).unwrap()).await.unwrap();
        let second = storage.get_songs(&filter, Pagination::new(2, 3).unwrap()).await.unwrap();

        let ids: Vec<i64> = first.iter().chain(second.iter()).map(|s| s.id).collect();
        assert_eq!(ids.len(), 5);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_get_songs_treats_wildcards_literally() {
        let (storage, _dir) = temp_db().await;
        insert_mock_song(&storage, "Muse", "100% Pure", &[]).await;
        insert_mock_song(&storage, "Muse", "1000 Pure", &[]).await;

        let filter = SongFilter {
            group: String::new(),
            song: "100%".to_string(),
        };
        let songs = storage.get_songs(&filter, Pagination::new(1, 10).unwrap()).await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].name, "100% Pure");
    }

    #[tokio::test]
    async fn test_update_song_partial_changes_only_given_fields() {
        let (storage, _dir) = temp_db().await;
        let id = insert_mock_song(&storage, "Muse", "Old Title", &["x"]).await;
        let before = storage.get_song(id).await.unwrap().unwrap();

        let update = SongUpdate {
            song: Some("New Title".to_string()),
            ..Default::default()
        };
        storage.update_song_partial(id, &update).await.unwrap();

        let after = storage.get_song(id).await.unwrap().unwrap();
        assert_eq!(after.name, "New Title");
        assert_eq!(after.group, before.group);
        assert_eq!(after.release_date, before.release_date);
        assert_eq!(after.link, before.link);
    }

    #[tokio::test]
    async fn test_update_song_partial_resolves_new_group() {
        let (storage, _dir) = temp_db().await;
        let id = insert_mock_song(&storage, "Muse", "Uprising", &[]).await;

        let update = SongUpdate {
            group: Some("Radiohead".to_string()),
            link: Some("http://example.com/new".to_string()),
            ..Default::default()
        };
        storage.update_song_partial(id, &update).await.unwrap();

        let after = storage.get_song(id).await.unwrap().unwrap();
        assert_eq!(after.group, "Radiohead");
        assert_eq!(after.link, "http://example.com/new");
        assert_eq!(after.name, "Uprising");
    }

    #[tokio::test]
    async fn test_update_missing_song_is_not_found_and_leaves_no_group() {
        let (storage, _dir) = temp_db().await;

        let update = SongUpdate {
            group: Some("Ghost Group".to_string()),
            ..Default::default()
        };
        let result = storage.update_song_partial(999, &update).await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let result = storage.update_song(999, &mock_new_song("Ghost Group", "x")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(count_rows(&storage, "groups").await, 0);
    }

    #[tokio::test]
    async fn test_update_song_replaces_group_and_name() {
        let (storage, _dir) = temp_db().await;
        let id = insert_mock_song(&storage, "Muse", "Uprising", &["l"]).await;

        storage
            .update_song(id, &mock_new_song("Placebo", "Every You Every Me"))
            .await
            .unwrap();

        let after = storage.get_song(id).await.unwrap().unwrap();
        assert_eq!(after.group, "Placebo");
        assert_eq!(after.name, "Every You Every Me");
        // Enrichment columns are untouched by a full update
        assert_eq!(after.release_date, mock_detail(&[]).release_date);
    }

    #[tokio::test]
    async fn test_delete_song_removes_lyrics() {
        let (storage, _dir) = temp_db().await;
        let id = insert_mock_song(&storage, "Muse", "Uprising", &["a", "b"]).await;
        let other = insert_mock_song(&storage, "Muse", "Madness", &["c"]).await;

        storage.delete_song(id).await.unwrap();

        assert!(storage.get_song(id).await.unwrap().is_none());
        assert!(storage.get_song(other).await.unwrap().is_some());
        assert_eq!(count_rows(&storage, "song_lyrics").await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_song_into_one_new_group() {
        let (storage, _dir) = temp_db().await;

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    let song = mock_new_song("Muse", &format!("Song {}", i));
                    storage.add_song(&song, &mock_detail(&["a", "b"])).await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(count_rows(&storage, "songs").await, 8);
        assert_eq!(count_rows(&storage, "groups").await, 1);
        assert_eq!(count_rows(&storage, "song_lyrics").await, 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_across_groups() {
        let (storage, _dir) = temp_db().await;
        let existing = insert_mock_song(&storage, "Placebo", "Pure Morning", &[]).await;

        let mut tasks = Vec::new();
        for i in 0..8 {
            let storage = storage.clone();
            tasks.push(tokio::spawn(async move {
                let song = mock_new_song(&format!("Group {}", i), "Track");
                storage.add_song(&song, &mock_detail(&["x"])).await.map(|_| ())
            }));
        }
        for i in 0..4 {
            let storage = storage.clone();
            tasks.push(tokio::spawn(async move {
                let update = SongUpdate {
                    group: Some(format!("Renamed {}", i)),
                    ..Default::default()
                };
                storage.update_song_partial(existing, &update).await
            }));
        }

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(count_rows(&storage, "songs").await, 9);
        let song = storage.get_song(existing).await.unwrap().unwrap();
        assert!(song.group.starts_with("Renamed"));
    }

    #[tokio::test]
    async fn test_delete_missing_song_is_not_found() {
        let (storage, _dir) = temp_db().await;
        let result = storage.delete_song(12345).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
