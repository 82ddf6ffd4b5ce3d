// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-channel message set.
//!
//! The set is small and fixed: the channel is the sole signalling path
//! between the daemon and a worker, and no message is valid outside the
//! sender/state pairs described on the variants.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Daemon → worker commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// A connection follows out-of-band (SCM_RIGHTS) immediately after this
    /// frame. Valid only while the worker is idle.
    Dispatch {
        /// Index of the listener the connection was accepted on.
        listener_index: usize,
        /// Peer address as seen at accept time.
        peer_addr: SocketAddr,
        /// Daemon-wide connection id, for log correlation.
        conn_id: u64,
    },
    /// Finish the current request (if any), run worker-stop hooks, answer
    /// [`Status::Exiting`] and exit.
    Shutdown,
}

/// Worker → daemon statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Status {
    /// Sent once after startup and again after every completed dispatch.
    Ready,
    /// First byte of a request head arrived on the dispatched connection.
    /// Starts the daemon's request-time clock: the wait for a first byte
    /// is bounded only by the worker's own idle timeout.
    RequestStart,
    /// Response fully written, connection kept alive; stops the request
    /// clock while the worker waits for the next request.
    RequestEnd,
    /// Graceful exit acknowledged; the process terminates right after.
    Exiting,
}
