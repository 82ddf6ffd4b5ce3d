// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server configuration record.
//!
//! The configuration is built by the embedding application, validated once,
//! and immutable afterwards. The daemon serializes the validated record and
//! hands it to every worker at spawn, so both sides of the process boundary
//! read the same values.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Hard ceiling on the worker pool, independent of configuration.
pub const WORKER_CAP: usize = 1024;

/// Address family for a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    V4,
    V6,
    /// Bind both a v4 and a v6 socket for the address/port pair.
    Both,
}

/// One configured listening address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSpec {
    pub host: String,
    pub port: u16,
    pub family: IpFamily,
}

impl ListenerSpec {
    pub fn new(host: impl Into<String>, port: u16, family: IpFamily) -> Self {
        Self { host: host.into(), port, family }
    }
}

/// Minimum severity surfaced by the logging layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Immutable server configuration (after [`ServerConfig::validate`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Lower pool bound; workers with index below this are permanent.
    pub min_workers: usize,
    /// Upper pool bound.
    pub max_workers: usize,
    /// Wall time after which a worker is recycled even if healthy.
    pub max_worker_lifetime: Duration,
    /// Idle time after which a permanent worker is recycled.
    pub max_worker_idle: Duration,
    /// Idle time after which a dynamic worker is retired.
    pub max_dynamic_worker_idle: Duration,
    /// Per-request wall budget; overrun kills the worker.
    pub max_request_time: Duration,
    /// Idle bound while waiting for the first byte of a request.
    pub max_http_waiting: Duration,
    /// Cap on total request bytes; excess yields 413.
    pub max_request_size: usize,
    /// OS accept backlog.
    pub listener_backlog: u32,
    pub keep_alive_enabled: bool,
    pub keep_alive_timeout: Duration,
    /// Synthesize `X-Remote-IP` on delivered requests.
    pub with_remote_ip: bool,
    pub log_level: LogLevel,
    /// POSIX user to drop to in workers after spawn (empty = inherit).
    pub worker_user: String,
    /// POSIX group to drop to in workers after spawn (empty = inherit).
    pub worker_group: String,
    /// Ordered listener set; at least one.
    pub listeners: Vec<ListenerSpec>,
    /// Non-zero aborts startup with this exit code.
    pub return_code: i32,
    /// Bound on the spawn-to-READY handshake for a new worker.
    pub worker_spawn_timeout: Duration,
    /// Bound on the graceful shutdown drain before force-kill.
    pub shutdown_drain: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            min_workers: 3,
            max_workers: 5,
            max_worker_lifetime: Duration::from_secs(6 * 3600),
            max_worker_idle: Duration::from_secs(3600),
            max_dynamic_worker_idle: Duration::from_secs(10),
            max_request_time: Duration::from_secs(5),
            max_http_waiting: Duration::from_secs(10),
            max_request_size: 10 * 1024 * 1024,
            listener_backlog: 2048,
            keep_alive_enabled: true,
            keep_alive_timeout: Duration::from_secs(3),
            with_remote_ip: false,
            log_level: LogLevel::Info,
            worker_user: String::new(),
            worker_group: String::new(),
            listeners: vec![ListenerSpec::new("0.0.0.0", 8080, IpFamily::V4)],
            return_code: 0,
            worker_spawn_timeout: Duration::from_secs(3),
            shutdown_drain: Duration::from_secs(5),
        }
    }
}

/// Configuration errors, all fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("min_workers ({min}) must not exceed max_workers ({max})")]
    WorkerBounds { min: usize, max: usize },

    #[error("max_workers must be at least 1")]
    NoWorkers,

    #[error("max_workers ({0}) exceeds the cap of {WORKER_CAP}")]
    WorkerCap(usize),

    #[error("at least one listener must be configured")]
    NoListeners,

    #[error("{field} must be non-zero")]
    ZeroDuration { field: &'static str },

    #[error("max_request_size must be non-zero")]
    ZeroRequestSize,
}

impl ServerConfig {
    /// Validate the record. Total: every violation maps to a typed error.
    ///
    /// `min_workers = 0` is permitted (lazy pool); the daemon logs a note
    /// when it sees one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.max_workers > WORKER_CAP {
            return Err(ConfigError::WorkerCap(self.max_workers));
        }
        if self.min_workers > self.max_workers {
            return Err(ConfigError::WorkerBounds {
                min: self.min_workers,
                max: self.max_workers,
            });
        }
        if self.listeners.is_empty() {
            return Err(ConfigError::NoListeners);
        }
        for (field, dur) in [
            ("max_worker_lifetime", self.max_worker_lifetime),
            ("max_request_time", self.max_request_time),
            ("max_http_waiting", self.max_http_waiting),
            ("keep_alive_timeout", self.keep_alive_timeout),
            ("worker_spawn_timeout", self.worker_spawn_timeout),
        ] {
            if dur.is_zero() {
                return Err(ConfigError::ZeroDuration { field });
            }
        }
        if self.max_request_size == 0 {
            return Err(ConfigError::ZeroRequestSize);
        }
        Ok(())
    }

    /// True when the worker at `index` is permanent (within `min_workers`).
    pub fn is_permanent(&self, index: usize) -> bool {
        index < self.min_workers
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
