// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Endpoint registration and request dispatch table.
//!
//! Applications register handlers explicitly at startup; the built table is
//! immutable. Request entries are ordered by descending priority, stable on
//! declaration order, and resolution stops at the first handler that claims
//! the response (first writer wins).

use crate::http::{Output, Request};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// A request handler: reads the request, writes to the output sink.
pub type Handler = Arc<dyn Fn(&Request, &mut Output) + Send + Sync>;

/// An opaque filter predicate over a request.
pub type FilterFn = Arc<dyn Fn(&Request) -> bool + Send + Sync>;

/// A lifecycle hook. Hooks receive no arguments.
pub type HookFn = Arc<dyn Fn() + Send + Sync>;

/// Lifecycle hook kinds.
///
/// The WebSocket kinds are carried in the model for registration
/// completeness; this runtime never invokes them (the upgrade path is an
/// external collaborator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    DaemonStart,
    DaemonStop,
    WorkerStart,
    WorkerStop,
    WsStart,
    WsStop,
}

/// A filter gating a request entry. Multiple filters on one entry AND.
#[derive(Clone)]
pub enum Filter {
    /// Exact match on the percent-encoded request path.
    Route(String),
    /// Opaque predicate.
    Predicate(FilterFn),
}

impl Filter {
    pub fn matches(&self, request: &Request) -> bool {
        match self {
            Filter::Route(path) => request.path() == path,
            Filter::Predicate(pred) => pred(request),
        }
    }
}

impl std::fmt::Debug for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::Route(path) => f.debug_tuple("Route").field(path).finish(),
            Filter::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Errors raised at registration time.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("route {0:?} must begin with '/'")]
    RouteNotAbsolute(String),
}

struct RequestEntry {
    priority: i32,
    filters: Vec<Filter>,
    handler: Handler,
}

/// Registration builder.
#[derive(Default)]
pub struct Endpoints {
    requests: Vec<RequestEntry>,
    hooks: HashMap<HookKind, Vec<HookFn>>,
    upgrades: Vec<RequestEntry>,
}

impl std::fmt::Debug for Endpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoints")
            .field("requests", &self.requests.len())
            .field("hooks", &self.hooks.len())
            .field("upgrades", &self.upgrades.len())
            .finish()
    }
}

impl Endpoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler on a literal route at priority 0.
    ///
    /// The literal is percent-encoded at registration; matching happens
    /// against the encoded request path, so `route("/héllo")` matches
    /// `GET /h%C3%A9llo`.
    pub fn route(
        self,
        path: &str,
        handler: impl Fn(&Request, &mut Output) + Send + Sync + 'static,
    ) -> Result<Self, EndpointError> {
        self.route_priority(path, 0, handler)
    }

    /// Register a handler on a literal route with an explicit priority.
    pub fn route_priority(
        mut self,
        path: &str,
        priority: i32,
        handler: impl Fn(&Request, &mut Output) + Send + Sync + 'static,
    ) -> Result<Self, EndpointError> {
        if !path.starts_with('/') {
            return Err(EndpointError::RouteNotAbsolute(path.to_string()));
        }
        self.requests.push(RequestEntry {
            priority,
            filters: vec![Filter::Route(encode_path(path))],
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    /// Register a handler gated by an opaque predicate.
    pub fn when(
        mut self,
        priority: i32,
        filter: impl Fn(&Request) -> bool + Send + Sync + 'static,
        handler: impl Fn(&Request, &mut Output) + Send + Sync + 'static,
    ) -> Self {
        self.requests.push(RequestEntry {
            priority,
            filters: vec![Filter::Predicate(Arc::new(filter))],
            handler: Arc::new(handler),
        });
        self
    }

    /// Register a handler with an explicit filter list (filters AND).
    pub fn entry(
        mut self,
        priority: i32,
        filters: Vec<Filter>,
        handler: impl Fn(&Request, &mut Output) + Send + Sync + 'static,
    ) -> Self {
        self.requests.push(RequestEntry { priority, filters, handler: Arc::new(handler) });
        self
    }

    /// Register a lifecycle hook.
    pub fn on(mut self, kind: HookKind, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.hooks.entry(kind).or_default().push(Arc::new(hook));
        self
    }

    /// Register a WebSocket upgrade endpoint. Stored for completeness; this
    /// runtime does not drive the upgrade path.
    pub fn ws_upgrade(
        mut self,
        priority: i32,
        filters: Vec<Filter>,
        handler: impl Fn(&Request, &mut Output) + Send + Sync + 'static,
    ) -> Self {
        self.upgrades.push(RequestEntry { priority, filters, handler: Arc::new(handler) });
        self
    }

    /// Sort request entries (descending priority, stable on declaration
    /// order) and freeze the table.
    pub fn build(mut self) -> EndpointTable {
        self.requests.sort_by_key(|entry| std::cmp::Reverse(entry.priority));
        EndpointTable {
            requests: self.requests,
            hooks: self.hooks,
            upgrade_count: self.upgrades.len(),
        }
    }
}

/// Outcome of endpoint resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A handler claimed the response; its index in priority order.
    Responded(usize),
    /// No candidate matched or none wrote. The caller answers 404.
    NoMatch,
}

/// Immutable, priority-sorted dispatch table.
pub struct EndpointTable {
    requests: Vec<RequestEntry>,
    hooks: HashMap<HookKind, Vec<HookFn>>,
    upgrade_count: usize,
}

impl EndpointTable {
    /// Resolve a request: walk entries in priority order, invoke the first
    /// whose filters all pass, and stop as soon as a handler touches the
    /// output. Handler panics propagate to the caller.
    pub fn resolve(&self, request: &Request, out: &mut Output) -> Resolution {
        for (index, entry) in self.requests.iter().enumerate() {
            if !entry.filters.iter().all(|filter| filter.matches(request)) {
                continue;
            }
            (entry.handler)(request, out);
            if out.touched() {
                return Resolution::Responded(index);
            }
        }
        Resolution::NoMatch
    }

    /// Hooks registered for `kind`, in declaration order.
    pub fn hooks(&self, kind: HookKind) -> &[HookFn] {
        self.hooks.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Number of registered (inert) upgrade endpoints.
    pub fn upgrade_count(&self) -> usize {
        self.upgrade_count
    }
}

/// Percent-encode a route literal for matching against encoded targets.
///
/// Bytes outside the RFC 3986 path set are `%XX`-encoded. `%` passes
/// through so literals written pre-encoded keep working.
fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for &byte in path.as_bytes() {
        if is_path_byte(byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn is_path_byte(byte: u8) -> bool {
    matches!(byte,
        b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9'
        | b'-' | b'.' | b'_' | b'~'
        | b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'='
        | b':' | b'@' | b'/' | b'%')
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
