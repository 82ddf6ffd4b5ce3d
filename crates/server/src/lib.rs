// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-server: process-isolated HTTP/1.x application server.
//!
//! The embedding application registers endpoints, builds a configuration
//! and calls [`Server::run`]. The calling process becomes the daemon: it
//! owns the listening sockets and a pool of worker processes, hands each
//! accepted connection to a worker over a control channel, and reaps
//! workers that idle out, age out, or blow their request budget. Workers
//! are re-executions of the same binary; [`Server::run`] detects worker
//! mode from the environment and serves instead of listening, so a
//! crashing or hung handler can never corrupt the daemon or other
//! requests.

mod daemon;
mod env;
mod error;
mod worker;

pub use drover_core::{
    ConfigError, EndpointError, Endpoints, Filter, HeaderMap, HookKind, IpFamily, ListenerSpec,
    LogLevel, Method, Output, Request, ServerConfig, StatusCode, Version,
};
pub use error::{ServerError, SpawnError, WorkerError};

use drover_core::LogLevel as Level;
use std::net::SocketAddr;
use std::sync::Arc;

/// The application server. Consumes a validated configuration and the
/// registered endpoints; runs until graceful shutdown.
pub struct Server {
    config: ServerConfig,
    endpoints: Endpoints,
    on_bound: Option<daemon::BoundHook>,
}

impl Server {
    pub fn new(config: ServerConfig, endpoints: Endpoints) -> Self {
        Self { config, endpoints, on_bound: None }
    }

    /// Invoked once with the actual bound addresses (after warm-up, before
    /// the first accept). Useful with port 0.
    pub fn on_bound(mut self, hook: impl FnOnce(&[SocketAddr]) + Send + 'static) -> Self {
        self.on_bound = Some(Box::new(hook));
        self
    }

    /// Run to completion. In a process spawned as a worker this serves
    /// dispatches and returns on shutdown; otherwise it validates the
    /// configuration, becomes the daemon and returns after the pool has
    /// drained.
    pub fn run(self) -> Result<(), ServerError> {
        if env::is_worker() {
            return worker::main(self.endpoints).map_err(ServerError::Worker);
        }

        self.config.validate()?;
        if self.config.return_code != 0 {
            return Err(ServerError::StartupAborted(self.config.return_code));
        }
        init_tracing(self.config.log_level);

        let table = Arc::new(self.endpoints.build());
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(ServerError::Io)?;
        runtime.block_on(daemon::run(self.config, table, self.on_bound))
    }
}

/// Level filtering from the configuration; `RUST_LOG` wins when set.
pub(crate) fn init_tracing(level: Level) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
