//! HTTP API.
//!
//! Routes live under `/api/v1`:
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `/songs?group=&song=&page=&limit=` | [`handlers::get_songs`] |
//! | GET | `/song/:id/lyrics?page=&limit=` | [`handlers::get_lyrics`] |
//! | POST | `/song` | [`handlers::add_song`] |
//! | PUT | `/song/:id` | [`handlers::update_song`] |
//! | PATCH | `/song/:id` | [`handlers::update_song_partial`] |
//! | DELETE | `/song/:id` | [`handlers::delete_song`] |
//!
//! plus `GET /health` and the OpenAPI document at [`docs::OPENAPI_PATH`].
//! Every failure is returned as the JSON error envelope produced by
//! [`crate::error::Error`]. CORS is open to any origin.

pub mod docs;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};

use crate::db::Storage;
use crate::enrichment::MetadataApi;

/// Shared handler state. Built once at startup; clones share the pool and
/// the metadata client.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub metadata: Arc<dyn MetadataApi>,
}

impl AppState {
    pub fn new(storage: Storage, metadata: Arc<dyn MetadataApi>) -> Self {
        Self { storage, metadata }
    }
}

/// Create the application router.
///
/// `request_timeout` bounds the whole request; slower requests get a 504.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    let songs = Router::new()
        .route("/songs", get(handlers::get_songs))
        .route("/song", post(handlers::add_song))
        .route(
            "/song/:id",
            put(handlers::update_song)
                .patch(handlers::update_song_partial)
                .delete(handlers::delete_song),
        )
        .route("/song/:id/lyrics", get(handlers::get_lyrics));

    Router::new()
        .nest("/api/v1", songs)
        .route("/health", get(handlers::health))
        .route(docs::OPENAPI_PATH, get(docs::openapi_json))
        .fallback(handlers::fallback)
        .layer(axum::middleware::from_fn_with_state(
            request_timeout,
            middleware::deadline,
        ))
        .layer(axum::middleware::from_fn(middleware::log_request))
        .layer(cors())
        .with_state(state)
}

/// Any origin may call the API; browsers may send JSON bodies.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::CONTENT_LENGTH])
        .max_age(Duration::from_secs(12 * 60 * 60))
}
