// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP/1.x data model shared by the daemon and the workers.

mod headers;
mod method;
mod output;
mod request;
mod status;

pub use headers::HeaderMap;
pub use method::Method;
pub use output::Output;
pub use request::Request;
pub use status::StatusCode;

use serde::{Deserialize, Serialize};

/// Protocol version of a parsed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}
