use anyhow::Result;
use std::time::Duration;

use tracing::warn;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::download_routes::download_routes;
use super::{log_requests, state::ServerState, RequestsLoggingLevel, ServerConfig};
use crate::engine::{EngineError, GuardedEngine, ProcessOutcome, ProgressReport};
use crate::library::{Instrument, Job};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize, Debug)]
struct ProcessBody {
    pub instruments: Vec<u8>,
}

#[derive(Serialize)]
struct ProgressView {
    progress: u8,
}

/// Public job view: terminal state and artifact locations stay internal.
#[derive(Serialize)]
struct JobView {
    job_id: u64,
    music_id: u64,
    size: usize,
    duration_secs: u64,
    requested_instruments: Vec<Instrument>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        JobView {
            job_id: job.job_id,
            music_id: job.music_id,
            size: job.size,
            duration_secs: job.duration_secs,
            requested_instruments: job.requested_instruments,
        }
    }
}

fn error_response(err: EngineError) -> Response {
    let status = match err {
        EngineError::InvalidInput(_) | EngineError::InvalidInstrument(_) => {
            StatusCode::BAD_REQUEST
        }
        EngineError::NotFound => StatusCode::NOT_FOUND,
        EngineError::Assembly(_) | EngineError::Queue(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

/// POST /music - register an upload (multipart/form-data, field `file`).
async fn post_music(State(engine): State<GuardedEngine>, mut multipart: Multipart) -> Response {
    let mut filename: Option<String> = None;
    let mut data: Option<Vec<u8>> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name().unwrap_or("") != "file" {
            continue;
        }
        filename = field.file_name().map(|s| s.to_string());
        match field.bytes().await {
            Ok(bytes) => data = Some(bytes.to_vec()),
            Err(e) => {
                warn!("Failed to read uploaded file data: {}", e);
                return error_response(EngineError::InvalidInput(
                    "failed to read file".to_string(),
                ));
            }
        }
    }

    let filename = match filename {
        Some(f) if !f.is_empty() => f,
        _ => return error_response(EngineError::InvalidInput("no filename provided".to_string())),
    };
    let data = match data {
        Some(d) if !d.is_empty() => d,
        _ => {
            return error_response(EngineError::InvalidInput("no file data provided".to_string()))
        }
    };

    match engine.submit(data, &filename).await {
        Ok(item) => Json(item).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_musics(State(engine): State<GuardedEngine>) -> Response {
    Json(engine.list()).into_response()
}

/// POST /music/{id} - request processing (or a remix on a cache hit).
async fn post_music_id(
    State(engine): State<GuardedEngine>,
    Path(music_id): Path<u64>,
    Json(body): Json<ProcessBody>,
) -> Response {
    match engine.process(music_id, &body.instruments).await {
        Ok(ProcessOutcome::Dispatched(item)) | Ok(ProcessOutcome::InFlight(item)) => {
            Json(item).into_response()
        }
        Ok(ProcessOutcome::Remixed(result)) => Json(result).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /music/{id} - poll processing progress.
async fn get_music_id(State(engine): State<GuardedEngine>, Path(music_id): Path<u64>) -> Response {
    match engine.progress(music_id) {
        Ok(ProgressReport::Done(result)) => Json(result).into_response(),
        Ok(ProgressReport::Finalizing) => Json(ProgressView { progress: 100 }).into_response(),
        Ok(ProgressReport::InProgress(progress)) => {
            Json(ProgressView { progress }).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn get_jobs(State(engine): State<GuardedEngine>) -> Response {
    Json(engine.library().all_job_ids()).into_response()
}

async fn get_job(State(engine): State<GuardedEngine>, Path(job_id): Path<u64>) -> Response {
    match engine.library().find_job(job_id) {
        Some(job) => Json(JobView::from(job)).into_response(),
        None => error_response(EngineError::NotFound),
    }
}

async fn post_reset(State(engine): State<GuardedEngine>) -> Response {
    match engine.reset().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

pub fn make_app(config: ServerConfig, engine: GuardedEngine) -> Router {
    let state = ServerState::new(config, engine);

    let routes: Router<ServerState> = Router::new()
        .route("/", get(home))
        .route("/music", post(post_music))
        .route("/music", get(get_musics))
        .route("/music/{id}", post(post_music_id))
        .route("/music/{id}", get(get_music_id))
        .route("/job", get(get_jobs))
        .route("/job/{id}", get(get_job))
        .route("/reset", post(post_reset))
        .merge(download_routes())
        .layer(DefaultBodyLimit::max(1024 * 1024 * 1024)); // 1GB

    routes
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .with_state(state)
}

pub async fn run_server(
    engine: GuardedEngine,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
    shutdown: CancellationToken,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
    };
    let app = make_app(config, engine);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
