//! Demix Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod audio;
pub mod config;
pub mod engine;
pub mod library;
pub mod queue;
pub mod server;
pub mod store;

// Re-export commonly used types for convenience
pub use engine::{Engine, GuardedEngine, ResultListener};
pub use queue::{InProcessBroker, WorkQueue};
pub use server::{run_server, RequestsLoggingLevel};
