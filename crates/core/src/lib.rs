// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover-core: data model for the drover application server.
//!
//! Configuration, clock abstraction, the HTTP request/response model and
//! the endpoint dispatch table. This crate does no I/O; the daemon and
//! worker runtimes live in `drover-server`.

pub mod clock;
pub mod config;
pub mod endpoint;
pub mod http;
pub mod time_fmt;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, IpFamily, ListenerSpec, LogLevel, ServerConfig};
pub use endpoint::{
    EndpointError, EndpointTable, Endpoints, Filter, FilterFn, Handler, HookFn, HookKind,
    Resolution,
};
pub use http::{HeaderMap, Method, Output, Request, StatusCode, Version};
