// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection carrier: ships an accepted socket across the process
//! boundary.
//!
//! An open descriptor rides as SCM_RIGHTS ancillary data on the worker's
//! control stream, alongside a one-byte marker. The carrier is one-shot per
//! call: the daemon closes its copy after a successful send and the worker
//! owns the handle thereafter.

use nix::cmsg_space;
use nix::sys::socket::{
    recvmsg, sendmsg, ControlMessage, ControlMessageOwned, MsgFlags, UnixAddr,
};
use std::io::{self, IoSlice, IoSliceMut};
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

/// Marker byte accompanying the ancillary payload.
const MARKER: u8 = 0xF5;

/// Send `payload` over the control socket `control`.
///
/// Non-blocking control sockets surface `WouldBlock`; the caller retries
/// after the socket signals writability. The payload descriptor is not
/// consumed — the caller drops its copy after a successful send.
pub fn send_fd(control: RawFd, payload: RawFd) -> io::Result<()> {
    let iov = [IoSlice::new(&[MARKER])];
    let cmsgs = [ControlMessage::ScmRights(&[payload])];
    sendmsg::<UnixAddr>(control, &iov, &cmsgs, MsgFlags::empty(), None)
        .map_err(io::Error::from)?;
    Ok(())
}

/// Receive one carried descriptor from the control socket (blocking).
///
/// Returns `UnexpectedEof` if the daemon closed the channel, and
/// `InvalidData` if the message arrives without a descriptor.
pub fn recv_fd(control: RawFd) -> io::Result<OwnedFd> {
    let mut marker = [0u8; 1];
    let mut iov = [IoSliceMut::new(&mut marker)];
    let mut cmsg_buffer = cmsg_space!([RawFd; 1]);

    let msg = recvmsg::<UnixAddr>(
        control,
        &mut iov,
        Some(&mut cmsg_buffer),
        MsgFlags::MSG_CMSG_CLOEXEC,
    )
    .map_err(io::Error::from)?;

    if msg.bytes == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "control channel closed"));
    }

    let mut carried: Option<RawFd> = None;
    for cmsg in msg.cmsgs().map_err(io::Error::from)? {
        if let ControlMessageOwned::ScmRights(fds) = cmsg {
            carried = fds.first().copied();
        }
    }

    match carried {
        // SAFETY: the kernel just installed this descriptor into our fd
        // table via SCM_RIGHTS; nothing else owns it yet.
        #[allow(unsafe_code)]
        Some(fd) => Ok(unsafe { OwnedFd::from_raw_fd(fd) }),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "dispatch message carried no descriptor",
        )),
    }
}

#[cfg(test)]
#[path = "carrier_tests.rs"]
mod tests;
