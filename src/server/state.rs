use axum::extract::FromRef;

use crate::engine::GuardedEngine;
use std::time::Instant;

use super::ServerConfig;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub engine: GuardedEngine,
    pub hash: String,
}

impl ServerState {
    pub fn new(config: ServerConfig, engine: GuardedEngine) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            engine,
            hash: format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("GIT_HASH")),
        }
    }
}

impl FromRef<ServerState> for GuardedEngine {
    fn from_ref(input: &ServerState) -> Self {
        input.engine.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
