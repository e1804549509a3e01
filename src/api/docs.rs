//! OpenAPI description of the HTTP API, served as JSON.

use axum::Json;
use utoipa::OpenApi;

use super::handlers::{self, Message, SongCreated};
use crate::error::{ErrorBody, ErrorKind};
use crate::model::{NewSong, Song, SongDetail, SongUpdate};

/// Path the document is served from.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Songs API",
        description = "Song catalogue with lyrics enriched from an external metadata service"
    ),
    paths(
        handlers::get_songs,
        handlers::get_lyrics,
        handlers::add_song,
        handlers::update_song,
        handlers::update_song_partial,
        handlers::delete_song,
        handlers::health,
    ),
    components(schemas(
        Song,
        NewSong,
        SongDetail,
        SongUpdate,
        SongCreated,
        Message,
        ErrorBody,
        ErrorKind,
    )),
    tags(
        (name = "songs", description = "Songs and their lyrics"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

/// GET /api-docs/openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for path in [
            "/api/v1/songs",
            "/api/v1/song",
            "/api/v1/song/{id}",
            "/api/v1/song/{id}/lyrics",
            "/health",
        ] {
            assert!(paths.contains(&path), "missing {}", path);
        }
    }

    #[test]
    fn test_schemas_use_wire_field_names() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let schemas = &json["components"]["schemas"];

        let song = &schemas["Song"]["properties"];
        assert!(song.get("song").is_some());
        assert!(song.get("releaseDate").is_some());
        assert!(song.get("name").is_none());

        assert!(schemas["SongDetail"]["properties"].get("text").is_some());
        assert!(schemas["ErrorBody"]["properties"].get("kind").is_some());
    }
}
