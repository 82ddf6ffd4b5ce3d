// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon runtime: the event loop owning the pool and the dispatcher.
//!
//! The daemon is one logical consumer: accept loops, per-worker status
//! readers, the timer and the signal watcher all feed a single mpsc
//! channel, and the loop below is the only code that touches pool state.
//! That serializes the dispatcher, the spawner and the reaper without any
//! locking, and preserves per-listener accept order.

mod listeners;
mod pool;
mod spawn;

pub(crate) use listeners::{AcceptedConn, ListenerSet};

use crate::env;
use crate::error::{ServerError, SpawnError};
use drover_core::{Clock, EndpointTable, HookKind, ServerConfig, SystemClock};
use drover_wire::{carrier, send_command, Command, ProtocolError, Status};
use pool::{RetireReason, WorkerPool, WorkerState};
use spawn::ProcessSpawner;
use std::io;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::process::Child;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Everything that can wake the daemon loop.
#[derive(Debug)]
pub(crate) enum DaemonEvent {
    Accepted(AcceptedConn),
    ListenerFailed { index: usize, error: io::Error },
    WorkerStatus { worker: u64, status: Status },
    WorkerClosed { worker: u64 },
    Tick,
    Shutdown,
}

/// Daemon-side transport ownership for one worker.
struct WorkerLink {
    control_fd: RawFd,
    writer: OwnedWriteHalf,
    child: Child,
}

/// Callback invoked once the listener set is bound.
pub type BoundHook = Box<dyn FnOnce(&[SocketAddr]) + Send>;

pub(crate) async fn run(
    config: ServerConfig,
    table: Arc<EndpointTable>,
    on_bound: Option<BoundHook>,
) -> Result<(), ServerError> {
    let spawner = ProcessSpawner::new(&config)?;
    Daemon::new(config, table, SystemClock, spawner).run(on_bound).await
}

struct Daemon<C: Clock> {
    config: ServerConfig,
    table: Arc<EndpointTable>,
    clock: C,
    pool: WorkerPool<WorkerLink>,
    spawner: ProcessSpawner,
    events_tx: mpsc::Sender<DaemonEvent>,
    events_rx: mpsc::Receiver<DaemonEvent>,
    conn_counter: u64,
    /// Drain deadline once shutdown has begun.
    draining: Option<Instant>,
}

impl<C: Clock> Daemon<C> {
    fn new(
        config: ServerConfig,
        table: Arc<EndpointTable>,
        clock: C,
        spawner: ProcessSpawner,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(1024);
        let pool = WorkerPool::new(config.min_workers, config.max_workers);
        Self {
            config,
            table,
            clock,
            pool,
            spawner,
            events_tx,
            events_rx,
            conn_counter: 0,
            draining: None,
        }
    }

    async fn run(mut self, on_bound: Option<BoundHook>) -> Result<(), ServerError> {
        if self.config.min_workers == 0 {
            info!("lazy pool: workers spawn on the first connection");
        }

        // Warm-up: every permanent worker must be ready before we listen.
        for _ in 0..self.config.min_workers {
            self.spawn_worker().await?;
        }

        for hook in self.table.hooks(HookKind::DaemonStart) {
            hook();
        }

        let listener_set = ListenerSet::bind(&self.config, self.events_tx.clone())?;
        if let Some(hook) = on_bound {
            hook(listener_set.addrs());
        }
        info!(workers = self.pool.total(), addrs = ?listener_set.addrs(), "daemon ready");

        spawn_signal_watcher(self.events_tx.clone());
        spawn_ticker(self.events_tx.clone());

        self.event_loop(&listener_set).await;

        for hook in self.table.hooks(HookKind::DaemonStop) {
            hook();
        }
        info!("daemon shutdown complete");
        Ok(())
    }

    async fn event_loop(&mut self, listeners: &ListenerSet) {
        while let Some(event) = self.events_rx.recv().await {
            match event {
                DaemonEvent::Accepted(conn) => {
                    if self.draining.is_none() {
                        self.dispatch(conn).await;
                    }
                    // While draining the connection is simply dropped:
                    // closed without reading, backpressure to the client.
                }
                DaemonEvent::ListenerFailed { index, error } => {
                    error!(listener = index, error = %error, "listener went down");
                }
                DaemonEvent::WorkerStatus { worker, status } => {
                    self.on_status(worker, status).await;
                }
                DaemonEvent::WorkerClosed { worker } => {
                    self.on_closed(worker).await;
                }
                DaemonEvent::Tick => self.on_tick().await,
                DaemonEvent::Shutdown => self.begin_shutdown(listeners).await,
            }

            if self.draining.is_some() && self.pool.is_empty() {
                break;
            }
        }
    }

    /// C7: pair an accepted connection with an idle worker, growing the
    /// pool on demand up to `max_workers`; otherwise admission-reject.
    async fn dispatch(&mut self, conn: AcceptedConn) {
        let conn_id = self.conn_counter;
        self.conn_counter += 1;

        let worker_id = match self.pool.checkout_idle() {
            Some(id) => Some(id),
            None if self.pool.can_grow() => match self.spawn_worker().await {
                Ok(id) => Some(id),
                Err(err) => {
                    warn!(conn = conn_id, error = %err, "dynamic worker spawn failed");
                    None
                }
            },
            None => None,
        };

        let Some(worker_id) = worker_id else {
            warn!(conn = conn_id, peer = %conn.peer,
                  "admission reject: pool at capacity, closing connection unread");
            return;
        };

        let command = Command::Dispatch {
            listener_index: conn.listener_index,
            peer_addr: conn.peer,
            conn_id,
        };
        let std_stream = match conn.stream.into_std() {
            Ok(stream) => stream,
            Err(err) => {
                warn!(conn = conn_id, error = %err, "could not detach accepted connection");
                return;
            }
        };

        match self.send_dispatch(worker_id, &command, std_stream.as_raw_fd()).await {
            Ok(()) => {
                let now = self.clock.now();
                self.pool.mark_busy(worker_id, conn_id, now);
                // Worker owns the connection now; close the daemon copy.
                drop(std_stream);
                debug!(conn = conn_id, worker = worker_id, peer = %conn.peer, "dispatched");
            }
            Err(err) => {
                // The dispatch is aborted and the connection closed with no
                // response; the worker is desynchronized, so reap it.
                warn!(conn = conn_id, worker = worker_id, error = %err,
                      "dispatch send failed; reaping worker");
                drop(std_stream);
                self.remove_worker(worker_id, true).await;
            }
        }
    }

    async fn send_dispatch(
        &mut self,
        worker_id: u64,
        command: &Command,
        conn_fd: RawFd,
    ) -> Result<(), ProtocolError> {
        let Some(entry) = self.pool.get_mut(worker_id) else {
            return Err(ProtocolError::ConnectionClosed);
        };
        send_command(&mut entry.link.writer, command).await?;
        loop {
            match carrier::send_fd(entry.link.control_fd, conn_fd) {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    entry.link.writer.writable().await.map_err(ProtocolError::Io)?;
                }
                Err(err) => return Err(ProtocolError::Io(err)),
            }
        }
    }

    async fn on_status(&mut self, worker_id: u64, status: Status) {
        let now = self.clock.now();
        let Some((state, index)) = self.pool.get(worker_id).map(|e| (e.state, e.index)) else {
            return;
        };
        match status {
            Status::Ready => match state {
                WorkerState::Busy => {
                    debug!(worker = worker_id, index, "request complete");
                    self.pool.release(worker_id, now);
                    // Lifetime is re-checked on release so a long-serving
                    // worker recycles without waiting for the reaper tick.
                    let expired = self
                        .pool
                        .get(worker_id)
                        .map(|e| now.duration_since(e.birth) >= self.config.max_worker_lifetime)
                        .unwrap_or(false);
                    if expired && self.draining.is_none() {
                        info!(worker = worker_id, reason = "lifetime", "retiring worker");
                        self.shutdown_worker(worker_id).await;
                    }
                }
                WorkerState::Stopping => {}
                _ => {
                    // READY is only valid after a dispatch; anything else
                    // means the channel is desynchronized.
                    warn!(worker = worker_id, "unexpected READY; treating as desync");
                    self.remove_worker(worker_id, true).await;
                }
            },
            Status::RequestStart => self.pool.request_started(worker_id, now),
            Status::RequestEnd => self.pool.request_finished(worker_id, now),
            Status::Exiting => {
                debug!(worker = worker_id, index, "worker exiting");
                self.pool.mark_stopping(worker_id);
            }
        }
    }

    async fn on_closed(&mut self, worker_id: u64) {
        let Some((state, conn)) =
            self.pool.get(worker_id).map(|e| (e.state, e.busy.map(|b| b.conn_id)))
        else {
            return;
        };
        match state {
            WorkerState::Stopping => {
                debug!(worker = worker_id, "worker closed after graceful exit");
            }
            WorkerState::Busy => {
                warn!(worker = worker_id, conn, "worker died mid-request");
            }
            _ => {
                warn!(worker = worker_id, "worker control channel closed unexpectedly");
            }
        }
        self.remove_worker(worker_id, true).await;
    }

    async fn on_tick(&mut self) {
        let now = self.clock.now();

        // Request-time enforcement: always worker-fatal, so even an
        // unresponsive handler cannot stall its slot.
        for worker_id in self.pool.overdue(now, self.config.max_request_time) {
            if let Some(entry) = self.pool.get(worker_id) {
                error!(worker = worker_id, index = entry.index,
                       conn = entry.busy.map(|b| b.conn_id),
                       "request exceeded max_request_time; killing worker");
            }
            self.remove_worker(worker_id, true).await;
        }

        match self.draining {
            None => {
                for retirement in self.pool.reap_plan(
                    now,
                    self.config.max_worker_lifetime,
                    self.config.max_worker_idle,
                    self.config.max_dynamic_worker_idle,
                ) {
                    let reason = match retirement.reason {
                        RetireReason::Lifetime => "lifetime",
                        RetireReason::PermanentIdle => "idle",
                        RetireReason::DynamicIdle => "dynamic-idle",
                    };
                    info!(worker = retirement.id, reason, "retiring worker");
                    self.shutdown_worker(retirement.id).await;
                }
                self.ensure_min().await;
            }
            Some(deadline) if now >= deadline => {
                for worker_id in self.pool.ids() {
                    warn!(worker = worker_id, "drain deadline passed; force-killing");
                    self.remove_worker(worker_id, true).await;
                }
            }
            Some(_) => {}
        }
    }

    async fn begin_shutdown(&mut self, listeners: &ListenerSet) {
        if self.draining.is_some() {
            return;
        }
        info!(workers = self.pool.total(), "shutting down: draining workers");
        listeners.shutdown();
        self.draining = Some(self.clock.now() + self.config.shutdown_drain);
        for worker_id in self.pool.ids() {
            self.shutdown_worker(worker_id).await;
        }
    }

    /// Ask one worker to exit gracefully.
    async fn shutdown_worker(&mut self, worker_id: u64) {
        let Some(entry) = self.pool.get_mut(worker_id) else {
            return;
        };
        match send_command(&mut entry.link.writer, &Command::Shutdown).await {
            Ok(()) => self.pool.mark_stopping(worker_id),
            Err(err) => {
                warn!(worker = worker_id, error = %err, "shutdown send failed");
                self.remove_worker(worker_id, true).await;
            }
        }
    }

    /// Drop a worker from the pool, optionally SIGKILLing the process, and
    /// restore the minimum if we are not draining.
    async fn remove_worker(&mut self, worker_id: u64, kill: bool) {
        if let Some(entry) = self.pool.remove(worker_id) {
            let mut child = entry.link.child;
            if kill {
                let _ = child.start_kill();
            }
            // Reap the exit status off-loop.
            tokio::spawn(async move {
                let _ = child.wait().await;
            });
        }
        if self.draining.is_none() {
            self.ensure_min().await;
        }
    }

    /// Respawn permanent slots until `min_workers` is met again.
    async fn ensure_min(&mut self) {
        while self.pool.deficit() > 0 {
            if let Err(err) = self.spawn_worker().await {
                warn!(error = %err, "respawn failed; retrying on next tick");
                break;
            }
        }
    }

    async fn spawn_worker(&mut self) -> Result<u64, SpawnError> {
        let index = self.pool.next_index();
        let spawned = self.spawner.spawn(index).await?;
        let control_fd = spawned.control.as_raw_fd();
        let (reader, writer) = spawned.control.into_split();
        let link = WorkerLink { control_fd, writer, child: spawned.child };
        let id = self.pool.insert(spawned.pid, link, self.clock.now());
        spawn_status_reader(id, reader, self.events_tx.clone());
        info!(worker = id, index, pid = spawned.pid, "worker online");
        Ok(id)
    }
}

/// Forward statuses from one worker's control channel into the event loop.
/// EOF or a garbled frame surfaces as `WorkerClosed`.
fn spawn_status_reader(worker: u64, mut reader: OwnedReadHalf, tx: mpsc::Sender<DaemonEvent>) {
    tokio::spawn(async move {
        loop {
            match drover_wire::recv_status(&mut reader).await {
                Ok(status) => {
                    if tx.send(DaemonEvent::WorkerStatus { worker, status }).await.is_err() {
                        return;
                    }
                }
                Err(_) => {
                    let _ = tx.send(DaemonEvent::WorkerClosed { worker }).await;
                    return;
                }
            }
        }
    });
}

fn spawn_signal_watcher(tx: mpsc::Sender<DaemonEvent>) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let mut interrupt = match signal(SignalKind::interrupt()) {
            Ok(s) => s,
            Err(_) => return,
        };
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(_) => return,
        };
        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
        }
        let _ = tx.send(DaemonEvent::Shutdown).await;
    });
}

fn spawn_ticker(tx: mpsc::Sender<DaemonEvent>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(env::tick_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if tx.send(DaemonEvent::Tick).await.is_err() {
                return;
            }
        }
    });
}
