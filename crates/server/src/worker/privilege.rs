// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! POSIX privilege drop for worker processes.
//!
//! The daemon may run privileged to bind low ports; each worker gives up
//! that identity before any handler code runs. Group first, then user:
//! `setgid` would fail after `setuid` has dropped root.

use crate::error::WorkerError;
use drover_core::ServerConfig;
use nix::unistd::{setgid, setuid, Group, User};

pub(crate) fn drop_privileges(config: &ServerConfig) -> Result<(), WorkerError> {
    if !config.worker_group.is_empty() {
        let group = Group::from_name(&config.worker_group)
            .map_err(|err| WorkerError::Privilege(err.into()))?
            .ok_or_else(|| WorkerError::UnknownGroup(config.worker_group.clone()))?;
        setgid(group.gid).map_err(|err| WorkerError::Privilege(err.into()))?;
    }
    if !config.worker_user.is_empty() {
        let user = User::from_name(&config.worker_user)
            .map_err(|err| WorkerError::Privilege(err.into()))?
            .ok_or_else(|| WorkerError::UnknownUser(config.worker_user.clone()))?;
        setuid(user.uid).map_err(|err| WorkerError::Privilege(err.into()))?;
    }
    Ok(())
}
