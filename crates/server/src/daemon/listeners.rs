// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener set: owns the listening sockets and runs the accept loops.
//!
//! Each configured address gets its own accept task feeding the daemon
//! event channel, so connections accepted on one listener are dispatched
//! in accept order. Transient accept errors back off exponentially; fatal
//! errors bring the one listener down and are reported as an event.

use super::DaemonEvent;
use crate::error::ServerError;
use drover_core::{IpFamily, ListenerSpec, ServerConfig};
use nix::errno::Errno;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const BACKOFF_INITIAL: Duration = Duration::from_millis(10);
const BACKOFF_CAP: Duration = Duration::from_secs(1);

/// An accepted connection annotated for dispatch.
#[derive(Debug)]
pub(crate) struct AcceptedConn {
    pub stream: tokio::net::TcpStream,
    pub listener_index: usize,
    pub peer: SocketAddr,
}

/// The bound listener sockets and their accept tasks.
pub(crate) struct ListenerSet {
    addrs: Vec<SocketAddr>,
    cancel: CancellationToken,
}

impl ListenerSet {
    /// Bind every configured listener and start its accept task. Any
    /// unbindable address fails startup.
    pub fn bind(
        config: &ServerConfig,
        events: mpsc::Sender<DaemonEvent>,
    ) -> Result<Self, ServerError> {
        let cancel = CancellationToken::new();
        let mut addrs = Vec::new();

        for (index, spec) in config.listeners.iter().enumerate() {
            for addr in resolve_addrs(spec).map_err(|source| ServerError::Bind {
                index,
                addr: format!("{}:{}", spec.host, spec.port),
                source,
            })? {
                let listener =
                    bind_socket(addr, config.listener_backlog).map_err(|source| {
                        ServerError::Bind { index, addr: addr.to_string(), source }
                    })?;
                let local = listener.local_addr().map_err(ServerError::Io)?;
                debug!(listener = index, addr = %local, "listener bound");
                addrs.push(local);

                tokio::spawn(accept_loop(
                    listener,
                    index,
                    events.clone(),
                    cancel.clone(),
                ));
            }
        }

        Ok(Self { addrs, cancel })
    }

    /// Actual bound addresses, in listener order (useful with port 0).
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Stop every accept task.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Map a listener spec to concrete socket addresses. `Both` yields two
/// sockets for the port; a host that parses in only one family leaves the
/// other unspecified.
fn resolve_addrs(spec: &ListenerSpec) -> io::Result<Vec<SocketAddr>> {
    let bad_host = || {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("listener host {:?} is not an IP address", spec.host),
        )
    };
    match spec.family {
        IpFamily::V4 => {
            let ip: Ipv4Addr = spec.host.parse().map_err(|_| bad_host())?;
            Ok(vec![SocketAddr::new(IpAddr::V4(ip), spec.port)])
        }
        IpFamily::V6 => {
            let ip: Ipv6Addr =
                spec.host.trim_matches(|c| c == '[' || c == ']').parse().map_err(|_| bad_host())?;
            Ok(vec![SocketAddr::new(IpAddr::V6(ip), spec.port)])
        }
        IpFamily::Both => {
            let v4 = spec.host.parse::<Ipv4Addr>().unwrap_or(Ipv4Addr::UNSPECIFIED);
            let v6 = spec.host.parse::<Ipv6Addr>().unwrap_or(Ipv6Addr::UNSPECIFIED);
            Ok(vec![
                SocketAddr::new(IpAddr::V4(v4), spec.port),
                SocketAddr::new(IpAddr::V6(v6), spec.port),
            ])
        }
    }
}

/// Build the listening socket with the configured backlog. The v6 socket
/// of a `Both` pair is bound v6-only so the v4 socket can coexist.
fn bind_socket(addr: SocketAddr, backlog: u32) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.bind(&addr.into())?;
    socket.listen(backlog.min(i32::MAX as u32) as i32)?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into())
}

async fn accept_loop(
    listener: TcpListener,
    listener_index: usize,
    events: mpsc::Sender<DaemonEvent>,
    cancel: CancellationToken,
) {
    let mut backoff = BACKOFF_INITIAL;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = listener.accept() => match result {
                Ok((stream, peer)) => {
                    backoff = BACKOFF_INITIAL;
                    let conn = AcceptedConn { stream, listener_index, peer };
                    if events.send(DaemonEvent::Accepted(conn)).await.is_err() {
                        break;
                    }
                }
                Err(err) if is_transient(&err) => {
                    warn!(listener = listener_index, error = %err,
                          backoff_ms = backoff.as_millis() as u64,
                          "transient accept error");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(BACKOFF_CAP);
                }
                Err(err) => {
                    error!(listener = listener_index, error = %err, "listener failed");
                    let _ = events
                        .send(DaemonEvent::ListenerFailed { index: listener_index, error: err })
                        .await;
                    break;
                }
            }
        }
    }
}

/// Resource exhaustion and aborted handshakes are retryable; anything else
/// means the socket itself is unusable.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    ) || matches!(
        err.raw_os_error(),
        Some(code)
            if code == Errno::EMFILE as i32
                || code == Errno::ENFILE as i32
                || code == Errno::ENOBUFS as i32
                || code == Errno::ENOMEM as i32
    )
}

#[cfg(test)]
#[path = "listeners_tests.rs"]
mod tests;
