// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The request delivered to endpoint handlers.

use super::{HeaderMap, Method, Version};
use std::net::SocketAddr;
use std::time::SystemTime;

/// A fully-read request, handed read-only to handlers.
///
/// The target is kept in its percent-encoded form; route filters match
/// against the encoded path exactly.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    version: Version,
    headers: HeaderMap,
    body: Vec<u8>,
    peer: SocketAddr,
    received_at: SystemTime,
}

impl Request {
    pub fn new(
        method: Method,
        target: impl Into<String>,
        version: Version,
        headers: HeaderMap,
        body: Vec<u8>,
        peer: SocketAddr,
        received_at: SystemTime,
    ) -> Self {
        Self { method, target: target.into(), version, headers, body, peer, received_at }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full request target as received (percent-encoded, with query).
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Percent-encoded path component of the target (query stripped).
    pub fn path(&self) -> &str {
        match self.target.find('?') {
            Some(idx) => &self.target[..idx],
            None => &self.target,
        }
    }

    /// Raw query string after `?`, if any.
    pub fn query(&self) -> Option<&str> {
        self.target.find('?').map(|idx| &self.target[idx + 1..])
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// When the first byte of this request was seen.
    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }
}
