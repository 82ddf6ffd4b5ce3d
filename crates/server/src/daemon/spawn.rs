// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process spawning.
//!
//! A worker is a re-execution of the embedding application's own binary:
//! the daemon binds a transient control socket, spawns the binary with
//! `DROVER_WORKER_SOCKET` pointing at it, and waits (bounded) for the
//! worker to connect and answer `Ready`. The socket file is unlinked once
//! the rendezvous completes.

use crate::env;
use crate::error::SpawnError;
use drover_core::ServerConfig;
use drover_wire::{recv_status, Status};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// A handshaken worker, ready for its first dispatch.
pub(crate) struct SpawnedWorker {
    pub pid: u32,
    pub control: UnixStream,
    pub child: Child,
}

/// Spawns workers by re-executing the current binary.
pub(crate) struct ProcessSpawner {
    runtime_dir: PathBuf,
    config_json: String,
    spawn_timeout: Duration,
    counter: u64,
}

impl ProcessSpawner {
    pub fn new(config: &ServerConfig) -> Result<Self, SpawnError> {
        Ok(Self {
            runtime_dir: env::runtime_dir(),
            config_json: serde_json::to_string(config)?,
            spawn_timeout: config.worker_spawn_timeout,
            counter: 0,
        })
    }

    /// Spawn a worker for pool slot `index` and complete the handshake.
    pub async fn spawn(&mut self, index: usize) -> Result<SpawnedWorker, SpawnError> {
        self.counter += 1;
        let socket_path = self.runtime_dir.join(format!(
            "drover-{}-w{}-{}.sock",
            std::process::id(),
            index,
            self.counter,
        ));
        // A stale file from a crashed daemon would fail the bind.
        let _ = std::fs::remove_file(&socket_path);

        let listener = UnixListener::bind(&socket_path)
            .map_err(|source| SpawnError::Bind { path: socket_path.clone(), source })?;

        let exe = std::env::current_exe().map_err(SpawnError::Process)?;
        let mut child = Command::new(exe)
            .env(env::WORKER_SOCKET, &socket_path)
            .env(env::WORKER_INDEX, index.to_string())
            .env(env::CONFIG, &self.config_json)
            .kill_on_drop(true)
            .spawn()
            .map_err(SpawnError::Process)?;

        let pid = child.id().unwrap_or_default();
        debug!(worker = index, pid, "spawned worker, awaiting handshake");

        match self.handshake(&listener, &socket_path).await {
            Ok(control) => {
                let _ = std::fs::remove_file(&socket_path);
                Ok(SpawnedWorker { pid, control, child })
            }
            Err(err) => {
                warn!(worker = index, pid, error = %err, "worker handshake failed");
                let _ = child.start_kill();
                let _ = std::fs::remove_file(&socket_path);
                Err(err)
            }
        }
    }

    async fn handshake(
        &self,
        listener: &UnixListener,
        socket_path: &std::path::Path,
    ) -> Result<UnixStream, SpawnError> {
        let accepted = tokio::time::timeout(self.spawn_timeout, listener.accept())
            .await
            .map_err(|_| SpawnError::HandshakeTimeout)?;
        let (mut control, _) = accepted.map_err(SpawnError::Io)?;

        let status = tokio::time::timeout(self.spawn_timeout, recv_status(&mut control))
            .await
            .map_err(|_| SpawnError::HandshakeTimeout)??;
        if status != Status::Ready {
            return Err(SpawnError::UnexpectedStatus(status));
        }

        debug!(socket = %socket_path.display(), "worker handshake complete");
        Ok(control)
    }
}
