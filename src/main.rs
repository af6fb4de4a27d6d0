use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use demix_server::config::{AppConfig, CliConfig, FileConfig};
use demix_server::engine::{Engine, ResultListener, DEFAULT_CHUNK_MS};
use demix_server::library::MusicLibrary;
use demix_server::queue::{InProcessBroker, WorkQueue};
use demix_server::server::{run_server, RequestsLoggingLevel};
use demix_server::store::ContentStore;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the data directory (uploads and produced artifacts).
    #[clap(value_parser = parse_path)]
    pub data_dir: Option<PathBuf>,

    /// Path to a TOML config file. File values override CLI values.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// Chunk window play length in seconds.
    #[clap(long, default_value_t = DEFAULT_CHUNK_MS / 1000)]
    pub chunk_seconds: u64,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        data_dir: cli_args.data_dir,
        port: cli_args.port,
        chunk_seconds: cli_args.chunk_seconds,
        logging_level: cli_args.logging_level,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Using data directory {:?}", config.data_dir);
    let store = Arc::new(ContentStore::new(
        config.uploads_dir(),
        config.artifacts_dir(),
    ));
    store.init().await?;

    let broker = Arc::new(InProcessBroker::new());
    let result_receiver = broker
        .take_result_receiver()
        .context("result channel already taken")?;

    let library = Arc::new(MusicLibrary::new());
    let engine = Arc::new(Engine::new(
        library,
        store,
        broker.clone() as Arc<dyn WorkQueue>,
        config.chunk_seconds * 1000,
    ));

    let shutdown = CancellationToken::new();

    let listener = ResultListener::new(engine.clone(), result_receiver, shutdown.clone());
    tokio::spawn(listener.run());

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown signal received");
        signal_shutdown.cancel();
    });

    info!("Ready to serve at port {}!", config.port);
    run_server(engine, config.logging_level, config.port, shutdown).await
}
