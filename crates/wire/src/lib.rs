// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-channel protocol between the daemon and its workers.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload. The
//! daemon side is async (tokio); workers read and write blocking, so both
//! codecs live here. Accepted connections travel out-of-band next to the
//! framed messages via SCM_RIGHTS ([`carrier`]).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod carrier;
mod message;
mod wire;

pub use message::{Command, Status};
pub use wire::{decode, encode, read_message, write_message, ProtocolError, MAX_FRAME};
pub use wire::{recv_command, recv_status, send_command, send_status};
pub use wire::blocking;
