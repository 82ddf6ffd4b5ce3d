// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the server crate.
//!
//! Workers are re-executions of the embedding application's binary; these
//! variables are the only contract between the daemon and a freshly spawned
//! worker process.

use std::path::PathBuf;
use std::time::Duration;

/// Path of the per-worker control socket. Presence marks worker mode.
pub const WORKER_SOCKET: &str = "DROVER_WORKER_SOCKET";

/// Stable pool index of the worker.
pub const WORKER_INDEX: &str = "DROVER_WORKER_INDEX";

/// Validated server configuration, JSON-encoded by the daemon.
pub const CONFIG: &str = "DROVER_CONFIG";

/// True when this process was spawned as a worker.
pub fn is_worker() -> bool {
    std::env::var_os(WORKER_SOCKET).is_some()
}

/// Directory for transient control sockets:
/// `DROVER_RUNTIME_DIR` > `XDG_RUNTIME_DIR` > the system temp dir.
pub fn runtime_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("DROVER_RUNTIME_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(dir) = std::env::var_os("XDG_RUNTIME_DIR") {
        return PathBuf::from(dir);
    }
    std::env::temp_dir()
}

/// Daemon maintenance tick. Bounds enforcement granularity for
/// `max_request_time` and the reaper.
pub fn tick_interval() -> Duration {
    std::env::var("DROVER_TICK_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(100))
}
