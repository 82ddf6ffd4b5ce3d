// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker runtime: one process, one connection at a time.
//!
//! A worker connects back to the daemon over the control socket named in
//! its environment, handshakes with `Ready`, then serves dispatches until
//! it is told to shut down or its channel closes. Everything here is
//! blocking std I/O; the daemon side is the async half.

mod conn;
mod parse;
mod privilege;

use crate::env;
use crate::error::WorkerError;
use conn::{ConnCtx, ServeOutcome};
use drover_core::{Endpoints, HookKind, ServerConfig};
use drover_wire::{blocking, carrier, Command, ProtocolError, Status};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Entry point for a process spawned in worker mode. Returns after a
/// graceful shutdown; errors are fatal to the process and leave the daemon
/// to reap and respawn.
pub(crate) fn main(endpoints: Endpoints) -> Result<(), WorkerError> {
    let socket_path = env_var(env::WORKER_SOCKET)?;
    let index: usize = env_var(env::WORKER_INDEX)?
        .parse()
        .map_err(|_| environment(env::WORKER_INDEX, "not a number"))?;
    let config: ServerConfig = serde_json::from_str(&env_var(env::CONFIG)?)
        .map_err(|err| environment(env::CONFIG, &err.to_string()))?;

    crate::init_tracing(config.log_level);
    let table = endpoints.build();

    let mut control = UnixStream::connect(&socket_path).map_err(WorkerError::Connect)?;

    // Drop to the configured identity before any handler code runs.
    privilege::drop_privileges(&config)?;

    run_hooks(&table, HookKind::WorkerStart, "worker_start")?;
    blocking::send_status(&mut control, &Status::Ready)?;
    info!(worker = index, "worker ready");

    loop {
        match blocking::recv_command(&mut control) {
            Ok(Command::Dispatch { listener_index, peer_addr, conn_id }) => {
                let fd = carrier::recv_fd(control.as_raw_fd())?;
                let stream = std::net::TcpStream::from(fd);
                // The daemon accepted this socket non-blocking.
                stream.set_nonblocking(false)?;
                debug!(worker = index, conn = conn_id, listener = listener_index,
                       peer = %peer_addr, "connection received");

                let outcome = conn::serve(
                    stream,
                    ConnCtx {
                        config: &config,
                        table: &table,
                        peer: peer_addr,
                        conn_id,
                        control: Some(&control),
                    },
                );
                match outcome {
                    ServeOutcome::Completed => {
                        blocking::send_status(&mut control, &Status::Ready)?;
                    }
                    ServeOutcome::ShutdownRequested => {
                        // The Shutdown frame is still queued on the control
                        // channel; the next loop turn consumes it.
                        debug!(worker = index, "shutdown observed at request boundary");
                    }
                }
            }
            Ok(Command::Shutdown) => break,
            Err(ProtocolError::ConnectionClosed) => {
                debug!(worker = index, "daemon closed the control channel");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }
    }

    run_hooks(&table, HookKind::WorkerStop, "worker_stop")?;
    let _ = blocking::send_status(&mut control, &Status::Exiting);
    info!(worker = index, "worker exiting");
    Ok(())
}

fn run_hooks(
    table: &drover_core::EndpointTable,
    kind: HookKind,
    name: &'static str,
) -> Result<(), WorkerError> {
    for hook in table.hooks(kind) {
        if catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
            warn!(hook = name, "lifecycle hook panicked");
            return Err(WorkerError::HookPanicked(name));
        }
    }
    Ok(())
}

fn env_var(name: &'static str) -> Result<String, WorkerError> {
    std::env::var(name).map_err(|err| environment(name, &err.to_string()))
}

fn environment(name: &'static str, reason: &str) -> WorkerError {
    WorkerError::Environment { name, reason: reason.to_string() }
}
