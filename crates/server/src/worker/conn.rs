// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection HTTP state machine.
//!
//! Runs synchronously inside a worker: one connection at a time, blocking
//! reads bounded by socket timeouts. `max_http_waiting` bounds the wait for
//! (and parsing of) a request head; `keep_alive_timeout` bounds the idle
//! gap between requests; `max_request_time` is enforced by the daemon, not
//! here. While idle at a request boundary the control channel is polled
//! alongside the socket so a shutdown closes the connection immediately.

use crate::worker::parse::{self, ParseError};
use drover_core::time_fmt;
use drover_core::{
    EndpointTable, HeaderMap, Method, Output, Request, Resolution, ServerConfig, StatusCode,
    Version,
};
use drover_wire::{blocking, Status};
use memchr::{memchr, memmem};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

/// Stream abstraction so the state machine is testable off-socket.
pub(crate) trait Transport: Read + Write {
    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()>;

    /// Descriptor for readiness polling, when the transport has one.
    fn poll_fd(&self) -> Option<RawFd> {
        None
    }
}

impl Transport for std::net::TcpStream {
    fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        std::net::TcpStream::set_read_timeout(self, dur)
    }

    fn poll_fd(&self) -> Option<RawFd> {
        Some(std::os::fd::AsRawFd::as_raw_fd(self))
    }
}

/// Why the connection loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServeOutcome {
    /// Connection closed (completed, timed out or errored); the worker
    /// reports ready again.
    Completed,
    /// The daemon signalled shutdown while the connection was idle; a
    /// `Shutdown` frame is waiting on the control channel.
    ShutdownRequested,
}

/// Immutable context for one connection.
pub(crate) struct ConnCtx<'a> {
    pub config: &'a ServerConfig,
    pub table: &'a EndpointTable,
    pub peer: SocketAddr,
    pub conn_id: u64,
    /// Control channel back to the daemon: polled for shutdown while
    /// idle, written for request progress statuses.
    pub control: Option<&'a UnixStream>,
}

/// Drive the HTTP loop on one accepted connection until it closes.
pub(crate) fn serve<S: Transport>(stream: S, ctx: ConnCtx<'_>) -> ServeOutcome {
    Conn { stream, ctx, buf: Vec::with_capacity(8 * 1024) }.run()
}

enum Wait {
    Data,
    Closed,
    Shutdown,
}

enum RequestOutcome {
    KeepAlive,
    Close,
}

enum HeadError {
    TooLarge,
    Closed,
}

enum BodyError {
    TooLarge,
    Malformed,
    Closed,
}

struct Conn<'a, S: Transport> {
    stream: S,
    ctx: ConnCtx<'a>,
    /// Unconsumed bytes read ahead of the parser (keep-alive pipelining).
    buf: Vec<u8>,
}

impl<S: Transport> Conn<'_, S> {
    fn run(&mut self) -> ServeOutcome {
        let mut first = true;
        loop {
            let wait = if first {
                self.ctx.config.max_http_waiting
            } else {
                self.ctx.config.keep_alive_timeout.min(self.ctx.config.max_http_waiting)
            };
            match self.wait_first_byte(wait) {
                Wait::Data => {}
                Wait::Closed => return ServeOutcome::Completed,
                Wait::Shutdown => return ServeOutcome::ShutdownRequested,
            }
            // First byte seen: the request-time budget starts now, not at
            // dispatch.
            self.send_progress(Status::RequestStart);
            match self.handle_request() {
                RequestOutcome::KeepAlive => {
                    self.send_progress(Status::RequestEnd);
                    first = false;
                }
                RequestOutcome::Close => return ServeOutcome::Completed,
            }
        }
    }

    /// Best-effort progress report to the daemon; a failed send means the
    /// daemon is gone, which the next control read surfaces.
    fn send_progress(&self, status: Status) {
        if let Some(mut control) = self.ctx.control {
            let _ = blocking::send_status(&mut control, &status);
        }
    }

    /// Block until the first byte of a (possibly next) request, the idle
    /// timeout, or a control-channel signal.
    fn wait_first_byte(&mut self, wait: Duration) -> Wait {
        if !self.buf.is_empty() {
            return Wait::Data;
        }
        let control_fd = self.ctx.control.map(|c| c.as_raw_fd());
        if let (Some(control), Some(socket)) = (control_fd, self.stream.poll_fd()) {
            match poll_pair(control, socket, wait) {
                Ok(PollOutcome::Control) => return Wait::Shutdown,
                Ok(PollOutcome::Socket) => {}
                Ok(PollOutcome::Timeout) | Err(_) => return Wait::Closed,
            }
        }
        if self.set_timeout(wait).is_err() {
            return Wait::Closed;
        }
        match self.fill() {
            Ok(0) => Wait::Closed,
            Ok(_) => Wait::Data,
            Err(_) => Wait::Closed,
        }
    }

    /// Read, parse, dispatch and answer one request. Returns whether the
    /// connection stays open.
    fn handle_request(&mut self) -> RequestOutcome {
        let received_at = SystemTime::now();
        let deadline = Instant::now() + self.ctx.config.max_http_waiting;

        let head_end = match self.read_head(deadline) {
            Ok(end) => end,
            Err(HeadError::TooLarge) => return self.fail(StatusCode::PAYLOAD_TOO_LARGE),
            Err(HeadError::Closed) => return RequestOutcome::Close,
        };
        let head_bytes: Vec<u8> = self.buf.drain(..head_end).collect();
        let head = match parse::parse_request_head(&head_bytes) {
            Ok(head) => head,
            Err(ParseError::UnsupportedVersion) => {
                return self.fail(StatusCode::HTTP_VERSION_NOT_SUPPORTED)
            }
            Err(err) => {
                debug!(conn = self.ctx.conn_id, error = %err, "malformed request");
                return self.fail(StatusCode::BAD_REQUEST);
            }
        };

        let codings: Vec<String> = head
            .headers
            .values("transfer-encoding")
            .flat_map(|value| value.split(','))
            .map(|token| token.trim().to_ascii_lowercase())
            .filter(|token| !token.is_empty())
            .collect();
        let chunked = codings.iter().any(|token| token == "chunked");
        if codings.iter().any(|token| token != "chunked") {
            return self.fail(StatusCode::NOT_IMPLEMENTED);
        }
        let content_length = match parse_content_length(&head.headers) {
            Ok(value) => value,
            Err(()) => return self.fail(StatusCode::BAD_REQUEST),
        };
        if chunked && content_length.is_some() {
            return self.fail(StatusCode::BAD_REQUEST);
        }

        let head_len = head_bytes.len();
        let cap = self.ctx.config.max_request_size;
        if let Some(declared) = content_length {
            if head_len.saturating_add(declared) > cap {
                return self.fail(StatusCode::PAYLOAD_TOO_LARGE);
            }
        }

        if let Some(expect) = head.headers.get("expect") {
            if !expect.eq_ignore_ascii_case("100-continue") {
                return self.fail(StatusCode::EXPECTATION_FAILED);
            }
            let has_body = chunked || content_length.unwrap_or(0) > 0;
            if head.version == Version::Http11
                && has_body
                && self.stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").is_err()
            {
                return RequestOutcome::Close;
            }
        }

        let body = if chunked {
            match self.read_chunked_body(head_len) {
                Ok(body) => body,
                Err(BodyError::TooLarge) => return self.fail(StatusCode::PAYLOAD_TOO_LARGE),
                Err(BodyError::Malformed) => return self.fail(StatusCode::BAD_REQUEST),
                Err(BodyError::Closed) => return RequestOutcome::Close,
            }
        } else if let Some(declared) = content_length {
            match self.take_exact(declared) {
                Ok(body) => body,
                Err(_) => return RequestOutcome::Close,
            }
        } else {
            Vec::new()
        };

        let mut headers = head.headers;
        if self.ctx.config.with_remote_ip {
            // Never inherit a client-sent value.
            headers.set("X-Remote-IP", self.ctx.peer.ip().to_string());
        }

        let is_head = head.method == Method::Head;
        let version = head.version;
        let request = Request::new(
            head.method,
            head.target,
            version,
            headers,
            body,
            self.ctx.peer,
            received_at,
        );
        let keep_alive_client = self.client_keep_alive(version, request.headers());

        let table = self.ctx.table;
        let mut out = Output::new();
        let resolved = catch_unwind(AssertUnwindSafe(|| table.resolve(&request, &mut out)));

        match resolved {
            Err(_) => {
                warn!(conn = self.ctx.conn_id, "handler panicked; responding 500");
                self.fail(StatusCode::INTERNAL_SERVER_ERROR)
            }
            Ok(Resolution::NoMatch) => {
                self.write_simple(version, StatusCode::NOT_FOUND, keep_alive_client, is_head)
            }
            Ok(Resolution::Responded(_)) => {
                let handler_close = out
                    .header_value("connection")
                    .map(|value| value.eq_ignore_ascii_case("close"))
                    .unwrap_or(false);
                let keep = keep_alive_client && !handler_close;
                match self.write_response(version, &out, is_head, keep) {
                    Ok(()) if keep => RequestOutcome::KeepAlive,
                    _ => RequestOutcome::Close,
                }
            }
        }
    }

    /// Keep-alive as requested by the client and allowed by configuration.
    fn client_keep_alive(&self, version: Version, headers: &HeaderMap) -> bool {
        if !self.ctx.config.keep_alive_enabled {
            return false;
        }
        match version {
            Version::Http11 => !headers.has_token("connection", "close"),
            Version::Http10 => headers.has_token("connection", "keep-alive"),
        }
    }

    // ---- buffered reads ----------------------------------------------

    fn fill(&mut self) -> io::Result<usize> {
        let mut chunk = [0u8; 8 * 1024];
        let n = self.stream.read(&mut chunk)?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    fn set_timeout(&self, wait: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(wait.max(Duration::from_millis(1))))
    }

    /// Read until the head terminator, bounded by `deadline` and the
    /// request size cap (head bytes count toward it).
    fn read_head(&mut self, deadline: Instant) -> Result<usize, HeadError> {
        loop {
            if let Some(pos) = memmem::find(&self.buf, b"\r\n\r\n") {
                return Ok(pos + 4);
            }
            if self.buf.len() > self.ctx.config.max_request_size {
                return Err(HeadError::TooLarge);
            }
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or(HeadError::Closed)?;
            if self.set_timeout(remaining).is_err() {
                return Err(HeadError::Closed);
            }
            match self.fill() {
                Ok(0) | Err(_) => return Err(HeadError::Closed),
                Ok(_) => {}
            }
        }
    }

    /// Take exactly `n` body bytes off the connection.
    fn take_exact(&mut self, n: usize) -> Result<Vec<u8>, BodyError> {
        while self.buf.len() < n {
            if self.set_timeout(self.ctx.config.max_http_waiting).is_err() {
                return Err(BodyError::Closed);
            }
            match self.fill() {
                Ok(0) | Err(_) => return Err(BodyError::Closed),
                Ok(_) => {}
            }
        }
        Ok(self.buf.drain(..n).collect())
    }

    /// One CRLF-terminated line (without the terminator).
    fn read_line(&mut self) -> Result<String, BodyError> {
        loop {
            if let Some(pos) = memchr(b'\n', &self.buf) {
                let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return String::from_utf8(line).map_err(|_| BodyError::Malformed);
            }
            if self.buf.len() > self.ctx.config.max_request_size {
                return Err(BodyError::TooLarge);
            }
            if self.set_timeout(self.ctx.config.max_http_waiting).is_err() {
                return Err(BodyError::Closed);
            }
            match self.fill() {
                Ok(0) | Err(_) => return Err(BodyError::Closed),
                Ok(_) => {}
            }
        }
    }

    /// Decode a chunked body; chunk extensions are ignored and trailers
    /// are read and discarded. The observed total is capped.
    fn read_chunked_body(&mut self, head_len: usize) -> Result<Vec<u8>, BodyError> {
        let cap = self.ctx.config.max_request_size;
        let mut body = Vec::new();
        loop {
            let size_line = self.read_line()?;
            let size_token = size_line.split(';').next().unwrap_or("").trim();
            let size =
                usize::from_str_radix(size_token, 16).map_err(|_| BodyError::Malformed)?;
            if size == 0 {
                break;
            }
            if head_len + body.len() + size > cap {
                return Err(BodyError::TooLarge);
            }
            let chunk = self.take_exact(size)?;
            body.extend_from_slice(&chunk);
            if self.take_exact(2)? != b"\r\n" {
                return Err(BodyError::Malformed);
            }
        }
        loop {
            if self.read_line()?.is_empty() {
                break;
            }
        }
        Ok(body)
    }

    // ---- responses ---------------------------------------------------

    /// Frame and flush the winning handler's output.
    fn write_response(
        &mut self,
        version: Version,
        out: &Output,
        is_head: bool,
        keep_alive: bool,
    ) -> io::Result<()> {
        let status = out.status_or_default();
        let body = out.body();

        let mut head = Vec::with_capacity(256 + out.headers().len() * 32);
        head.extend_from_slice(version.as_str().as_bytes());
        head.push(b' ');
        head.extend_from_slice(status.to_string().as_bytes());
        head.extend_from_slice(b"\r\n");

        let mut has_date = false;
        let mut has_server = false;
        let mut has_length = false;
        let mut has_connection = false;
        for (name, value) in out.headers() {
            if name.eq_ignore_ascii_case("date") {
                has_date = true;
            } else if name.eq_ignore_ascii_case("server") {
                has_server = true;
            } else if name.eq_ignore_ascii_case("content-length")
                || name.eq_ignore_ascii_case("transfer-encoding")
            {
                has_length = true;
            } else if name.eq_ignore_ascii_case("connection") {
                has_connection = true;
            }
            head.extend_from_slice(name.as_bytes());
            head.extend_from_slice(b": ");
            head.extend_from_slice(value.as_bytes());
            head.extend_from_slice(b"\r\n");
        }
        if !has_date {
            head.extend_from_slice(b"Date: ");
            head.extend_from_slice(time_fmt::imf_fixdate(SystemTime::now()).as_bytes());
            head.extend_from_slice(b"\r\n");
        }
        if !has_server {
            head.extend_from_slice(
                concat!("Server: drover/", env!("CARGO_PKG_VERSION"), "\r\n").as_bytes(),
            );
        }
        if !has_length {
            head.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        }
        if !has_connection {
            head.extend_from_slice(if keep_alive {
                b"Connection: keep-alive\r\n".as_slice()
            } else {
                b"Connection: close\r\n".as_slice()
            });
        }
        head.extend_from_slice(b"\r\n");

        self.stream.write_all(&head)?;
        if !is_head {
            self.stream.write_all(body)?;
        }
        self.stream.flush()
    }

    /// Minimal status response with the reason phrase as the body.
    fn write_simple(
        &mut self,
        version: Version,
        status: StatusCode,
        keep_alive: bool,
        is_head: bool,
    ) -> RequestOutcome {
        let mut out = Output::new();
        out.status(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .write_str(status.reason());
        match self.write_response(version, &out, is_head, keep_alive) {
            Ok(()) if keep_alive => RequestOutcome::KeepAlive,
            _ => RequestOutcome::Close,
        }
    }

    /// Protocol-error response: always closes the connection.
    fn fail(&mut self, status: StatusCode) -> RequestOutcome {
        self.write_simple(Version::Http11, status, false, false)
    }
}

/// A duplicated or list-valued `Content-Length` must agree with itself;
/// anything non-numeric is malformed.
fn parse_content_length(headers: &HeaderMap) -> Result<Option<usize>, ()> {
    let mut result = None;
    for value in headers.values("content-length") {
        let value = value.trim();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        let parsed: usize = value.parse().map_err(|_| ())?;
        match result {
            None => result = Some(parsed),
            Some(previous) if previous == parsed => {}
            Some(_) => return Err(()),
        }
    }
    Ok(result)
}

enum PollOutcome {
    Control,
    Socket,
    Timeout,
}

/// Wait for readability on the control channel or the connection. The
/// control channel wins ties so an idle worker reacts to shutdown first.
fn poll_pair(control: RawFd, socket: RawFd, wait: Duration) -> io::Result<PollOutcome> {
    use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
    use std::os::fd::BorrowedFd;

    // SAFETY: both descriptors are owned by the caller and outlive this
    // call; no ownership is taken.
    #[allow(unsafe_code)]
    let (control_fd, socket_fd) =
        unsafe { (BorrowedFd::borrow_raw(control), BorrowedFd::borrow_raw(socket)) };

    let mut fds = [
        PollFd::new(control_fd, PollFlags::POLLIN),
        PollFd::new(socket_fd, PollFlags::POLLIN),
    ];
    let timeout = PollTimeout::try_from(wait).unwrap_or(PollTimeout::MAX);
    let ready = poll(&mut fds, timeout).map_err(io::Error::from)?;
    if ready == 0 {
        return Ok(PollOutcome::Timeout);
    }
    let signalled = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
    let control_ready =
        fds[0].revents().map(|flags| flags.intersects(signalled)).unwrap_or(false);
    if control_ready {
        return Ok(PollOutcome::Control);
    }
    Ok(PollOutcome::Socket)
}

#[cfg(test)]
#[path = "conn_tests.rs"]
mod tests;
