//! Song handlers.
//!
//! Handlers only decode input, call storage or the metadata client, and
//! encode output. Extractor rejections are turned into validation errors so
//! clients always receive the same error envelope.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, Uri};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::AppState;
use crate::error::{Error, ErrorBody, Result};
use crate::model::{NewSong, Pagination, Song, SongDetail, SongFilter, SongUpdate};

/// Page size for `GET /songs` when `limit` is absent.
const DEFAULT_SONGS_LIMIT: i64 = 10;
/// Page size for `GET /song/:id/lyrics` when `limit` is absent.
const DEFAULT_LYRICS_LIMIT: i64 = 1;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Query parameters for listing songs.
///
/// Pagination values are kept as strings so malformed input can be reported
/// instead of silently defaulted.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListSongsQuery {
    /// Substring of the group name
    pub group: Option<String>,
    /// Substring of the song title
    pub song: Option<String>,
    /// Page number (1-indexed, default: 1)
    pub page: Option<String>,
    /// Items per page (default: 10, max: 100)
    pub limit: Option<String>,
}

/// Query parameters for paging lyrics.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Page number (1-indexed, default: 1)
    pub page: Option<String>,
    /// Lines per page (default: 1, max: 100)
    pub limit: Option<String>,
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize, ToSchema)]
pub struct Message {
    #[schema(value_type = String, example = "Song updated")]
    pub message: &'static str,
}

/// Body returned after a song is created.
#[derive(Debug, Serialize, ToSchema)]
pub struct SongCreated {
    #[schema(value_type = String, example = "Song added")]
    pub message: &'static str,
    pub id: i64,
    pub details: SongDetail,
}

fn parse_id(raw: &str) -> Result<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(Error::validation(format!(
            "song id must be a positive integer, got {:?}",
            raw
        ))),
    }
}

fn reject_query(e: QueryRejection) -> Error {
    Error::validation(e.body_text())
}

fn reject_body(e: JsonRejection) -> Error {
    Error::validation(e.body_text())
}

// =============================================================================
// Handlers
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/v1/songs",
    tag = "songs",
    params(ListSongsQuery),
    responses(
        (status = 200, description = "Matching songs ordered by id", body = [Song]),
        (status = 400, description = "Malformed pagination", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    )
)]
/// List songs.
///
/// Filters by group and title substrings, ordered by id.
pub async fn get_songs(
    State(state): State<AppState>,
    query: std::result::Result<Query<ListSongsQuery>, QueryRejection>,
) -> Result<Json<Vec<Song>>> {
    let Query(query) = query.map_err(reject_query)?;
    let page = Pagination::parse(
        query.page.as_deref(),
        query.limit.as_deref(),
        1,
        DEFAULT_SONGS_LIMIT,
    )?;
    let filter = SongFilter {
        group: query.group.unwrap_or_default(),
        song: query.song.unwrap_or_default(),
    };

    info!(
        group = %filter.group,
        song = %filter.song,
        page = page.page(),
        limit = page.limit(),
        "Listing songs"
    );
    let songs = state.storage.get_songs(&filter, page).await?;
    Ok(Json(songs))
}

#[utoipa::path(
    get,
    path = "/api/v1/song/{id}/lyrics",
    tag = "songs",
    params(("id" = i64, Path, description = "Song id"), PageQuery),
    responses(
        (status = 200, description = "One page of lyric lines", body = [String]),
        (status = 400, description = "Malformed id or pagination", body = ErrorBody),
        (status = 404, description = "Song not found", body = ErrorBody)
    )
)]
/// Page through a song's lyrics.
///
/// Lines come back in their original order.
pub async fn get_lyrics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: std::result::Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Vec<String>>> {
    let id = parse_id(&id)?;
    let Query(query) = query.map_err(reject_query)?;
    let page = Pagination::parse(
        query.page.as_deref(),
        query.limit.as_deref(),
        1,
        DEFAULT_LYRICS_LIMIT,
    )?;

    info!(song_id = id, page = page.page(), limit = page.limit(), "Fetching lyrics");
    if state.storage.get_song(id).await?.is_none() {
        return Err(Error::not_found(format!("song {}", id)));
    }
    let lines = state.storage.get_lyrics(id, page).await?;
    Ok(Json(lines))
}

#[utoipa::path(
    post,
    path = "/api/v1/song",
    tag = "songs",
    request_body = NewSong,
    responses(
        (status = 201, description = "Song enriched and stored", body = SongCreated),
        (status = 400, description = "Malformed body", body = ErrorBody),
        (status = 502, description = "Metadata service failed", body = ErrorBody),
        (status = 504, description = "Metadata service or request timed out", body = ErrorBody)
    )
)]
/// Add a song.
///
/// Fetches enrichment data, then stores the song and its lyrics in one
/// transaction. A metadata failure aborts creation before anything is written.
pub async fn add_song(
    State(state): State<AppState>,
    body: std::result::Result<Json<NewSong>, JsonRejection>,
) -> Result<(StatusCode, Json<SongCreated>)> {
    let Json(song) = body.map_err(reject_body)?;
    song.validate()?;

    info!(group = %song.group, song = %song.song, "Adding song");
    let detail = state.metadata.fetch_detail(&song.group, &song.song).await?;
    info!(
        release_date = %detail.release_date,
        lines = detail.text.len(),
        "Received song detail"
    );

    let id = state.storage.add_song(&song, &detail).await?;
    Ok((
        StatusCode::CREATED,
        Json(SongCreated {
            message: "Song added",
            id,
            details: detail,
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/song/{id}",
    tag = "songs",
    params(("id" = i64, Path, description = "Song id")),
    request_body = NewSong,
    responses(
        (status = 200, description = "Song updated", body = Message),
        (status = 400, description = "Malformed id or body", body = ErrorBody),
        (status = 404, description = "Song not found", body = ErrorBody)
    )
)]
/// Replace a song's group and title.
pub async fn update_song(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: std::result::Result<Json<NewSong>, JsonRejection>,
) -> Result<Json<Message>> {
    let id = parse_id(&id)?;
    let Json(song) = body.map_err(reject_body)?;
    song.validate()?;

    state.storage.update_song(id, &song).await?;
    Ok(Json(Message {
        message: "Song updated",
    }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/song/{id}",
    tag = "songs",
    params(("id" = i64, Path, description = "Song id")),
    request_body = SongUpdate,
    responses(
        (status = 200, description = "Song updated", body = Message),
        (status = 400, description = "Malformed id, empty update or unknown field", body = ErrorBody),
        (status = 404, description = "Song not found", body = ErrorBody)
    )
)]
/// Update some of a song's fields.
///
/// Accepts any subset of `group`, `song` (alias `name`), `releaseDate` and
/// `link`. Any other key is rejected.
pub async fn update_song_partial(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: std::result::Result<Json<SongUpdate>, JsonRejection>,
) -> Result<Json<Message>> {
    let id = parse_id(&id)?;
    let Json(update) = body.map_err(reject_body)?;

    state.storage.update_song_partial(id, &update).await?;
    Ok(Json(Message {
        message: "Song updated",
    }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/song/{id}",
    tag = "songs",
    params(("id" = i64, Path, description = "Song id")),
    responses(
        (status = 200, description = "Song and its lyrics deleted", body = Message),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 404, description = "Song not found", body = ErrorBody)
    )
)]
/// Delete a song and its lyrics.
pub async fn delete_song(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    let id = parse_id(&id)?;
    state.storage.delete_song(id).await?;
    Ok(Json(Message {
        message: "Song deleted",
    }))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Database reachable", body = Message),
        (status = 500, description = "Database unreachable", body = ErrorBody)
    )
)]
/// Check that the database is reachable.
pub async fn health(State(state): State<AppState>) -> Result<Json<Message>> {
    state.storage.ping().await?;
    Ok(Json(Message { message: "ok" }))
}

/// Any unmatched route.
pub async fn fallback(uri: Uri) -> Error {
    Error::not_found(format!("route {}", uri.path()))
}
