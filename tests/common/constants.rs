//! Shared timing constants for the end-to-end harness.

/// Per-request timeout for the test client.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// How long to wait for a spawned server to answer on `/`.
pub const SERVER_READY_TIMEOUT_MS: u64 = 5_000;

/// Poll interval while waiting for server readiness.
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// How long to wait for a dispatched item to reach a final result.
pub const RESULT_TIMEOUT_MS: u64 = 10_000;

/// Poll interval while waiting for processing results.
pub const RESULT_POLL_INTERVAL_MS: u64 = 25;
