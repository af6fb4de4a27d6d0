//! Artifact download route.
//!
//! Result payloads reference artifacts by bare name; clients resolve them
//! against this route.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::debug;

use crate::engine::GuardedEngine;
use crate::server::state::ServerState;

/// GET /download/{name} - serve one stored artifact by name.
async fn download_artifact(
    State(engine): State<GuardedEngine>,
    Path(name): Path<String>,
) -> Response {
    let bytes = match engine.store().read_artifact(&name).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("Download of '{}' refused: {}", name, e);
            return StatusCode::NOT_FOUND.into_response();
        }
    };

    let mime = infer::get(&bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime)
        .body(bytes.into())
    {
        Ok(response) => response,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

pub fn download_routes() -> Router<ServerState> {
    Router::new().route("/download/{name}", get(download_artifact))
}
