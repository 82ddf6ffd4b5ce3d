// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for the end-to-end specs.

use drover_core::{IpFamily, ListenerSpec, ServerConfig};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

pub use drover_core::ServerConfig as Config;

/// Generous bound for anything that should happen "promptly".
pub const SPEC_WAIT_MAX: Duration = Duration::from_secs(10);

/// Base configuration for specs: one ephemeral local listener, snappy
/// timeouts so the suite stays fast.
pub fn demo_config() -> ServerConfig {
    ServerConfig {
        min_workers: 1,
        max_workers: 2,
        listeners: vec![ListenerSpec::new("127.0.0.1", 0, IpFamily::V4)],
        ..Default::default()
    }
}

/// A running `drover-demo` daemon. Killed on drop; orphaned workers exit
/// on their own when the control channel closes.
pub struct DemoServer {
    child: Child,
    pub addr: SocketAddr,
}

impl DemoServer {
    pub fn start(config: &ServerConfig) -> Self {
        let config_json =
            serde_json::to_string(config).expect("config serializes");
        let mut child = Command::new(env!("CARGO_BIN_EXE_drover-demo"))
            .env("DROVER_DEMO_CONFIG", config_json)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .expect("demo binary starts");

        let stdout = child.stdout.take().expect("stdout piped");
        let mut lines = BufReader::new(stdout).lines();
        let ready = lines
            .next()
            .expect("demo printed a line before exiting")
            .expect("readable stdout");
        let addr = ready
            .strip_prefix("READY ")
            .unwrap_or_else(|| panic!("unexpected startup line: {ready}"))
            .parse()
            .expect("valid READY address");

        Self { child, addr }
    }

    pub fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).expect("connect to demo");
        stream
            .set_read_timeout(Some(SPEC_WAIT_MAX))
            .expect("read timeout");
        stream
    }

    /// One-shot request on a fresh connection; returns the first response.
    pub fn request(&self, raw: &str) -> Response {
        let mut stream = self.connect();
        stream.write_all(raw.as_bytes()).expect("request written");
        read_response(&mut stream)
    }
}

impl Drop for DemoServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A parsed HTTP response.
#[derive(Debug)]
pub struct Response {
    pub status: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn code(&self) -> u16 {
        self.status
            .split(' ')
            .nth(1)
            .and_then(|c| c.parse().ok())
            .unwrap_or_else(|| panic!("unparseable status line: {}", self.status))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).expect("UTF-8 body")
    }
}

/// Read exactly one framed response off the stream (keep-alive safe).
pub fn read_response(stream: &mut TcpStream) -> Response {
    let mut reader = BufReader::new(stream);

    let mut status = String::new();
    reader.read_line(&mut status).expect("status line");
    let status = status.trim_end().to_string();
    assert!(!status.is_empty(), "connection closed before a status line");

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("header line");
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(": ").expect("well-formed header");
        headers.push((name.to_string(), value.to_string()));
    }

    let length: usize = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .map(|(_, v)| v.parse().expect("numeric content-length"))
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).expect("body");

    Response { status, headers, body }
}

/// Poll `predicate` until it holds or `max` elapses.
pub fn wait_for(max: Duration, predicate: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + max;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    false
}
