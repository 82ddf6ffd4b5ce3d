// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the daemon and worker runtimes.
//!
//! Errors are recovered at the smallest scope that restores an invariant:
//! connection scope for protocol errors, worker scope for handler faults
//! and request-time kills, daemon scope only for unrecoverable resource
//! loss. Everything here is the daemon/startup scope; connection-scope
//! errors never leave the worker's connection loop.

use drover_core::ConfigError;
use drover_wire::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal daemon-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("startup aborted by configuration with exit code {0}")]
    StartupAborted(i32),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("failed to bind listener {index} on {addr}: {source}")]
    Bind {
        index: usize,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Errors spawning a worker process.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to encode worker configuration: {0}")]
    ConfigEncode(#[from] serde_json::Error),

    #[error("failed to bind control socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn worker process: {0}")]
    Process(#[source] std::io::Error),

    #[error("worker did not complete its handshake in time")]
    HandshakeTimeout,

    #[error("worker handshake failed: {0}")]
    Handshake(#[from] ProtocolError),

    #[error("worker answered the handshake with {0:?} instead of Ready")]
    UnexpectedStatus(drover_wire::Status),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal worker-side errors. A worker exiting with one of these is reaped
/// by the daemon; permanent slots respawn.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("missing or invalid {name}: {reason}")]
    Environment { name: &'static str, reason: String },

    #[error("failed to connect control socket: {0}")]
    Connect(#[source] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("unknown worker_user {0:?}")]
    UnknownUser(String),

    #[error("unknown worker_group {0:?}")]
    UnknownGroup(String),

    #[error("failed to drop privileges: {0}")]
    Privilege(#[source] std::io::Error),

    #[error("a {0} hook panicked")]
    HookPanicked(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
