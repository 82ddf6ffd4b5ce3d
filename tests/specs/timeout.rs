// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request-time enforcement: a hung handler is fatal to its worker and the
//! pool recovers.

use super::prelude::*;
use serial_test::serial;
use std::io::{Read, Write};
use std::time::Duration;

#[test]
#[serial]
fn idle_connection_is_not_killed_by_the_request_clock() {
    let config = Config {
        min_workers: 1,
        max_workers: 1,
        max_request_time: Duration::from_millis(500),
        max_http_waiting: Duration::from_secs(5),
        ..demo_config()
    };
    let server = DemoServer::start(&config);

    // Connect but withhold the first byte well past max_request_time. The
    // worker is merely waiting (bounded by max_http_waiting) and must not
    // be killed.
    let mut stream = server.connect();
    std::thread::sleep(Duration::from_millis(1500));

    stream.write_all(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n").expect("request written");
    let resp = read_response(&mut stream);
    assert_eq!(resp.code(), 200);
    assert_eq!(resp.body_str(), "hi");

    // Keep-alive idle time between requests must not count either.
    std::thread::sleep(Duration::from_millis(800));
    stream.write_all(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n").expect("second request");
    let resp = read_response(&mut stream);
    assert_eq!(resp.code(), 200);
}

#[test]
#[serial]
fn hung_handler_is_killed_and_the_pool_respawns() {
    let config = Config {
        min_workers: 1,
        max_workers: 1,
        max_request_time: Duration::from_secs(1),
        ..demo_config()
    };
    let server = DemoServer::start(&config);

    // The handler sleeps for 10 s against a 1 s budget; the daemon kills
    // the worker and the client sees a transport-level failure.
    let mut stream = server.connect();
    stream
        .write_all(b"GET /sleep?ms=10000 HTTP/1.1\r\nHost: x\r\n\r\n")
        .expect("request written");
    let mut buf = Vec::new();
    let died_unanswered = match stream.read_to_end(&mut buf) {
        Ok(_) => buf.is_empty(),
        Err(_) => true,
    };
    assert!(died_unanswered, "hung request must not produce a response");

    // The permanent slot respawns; a fresh connection succeeds promptly.
    let recovered = wait_for(SPEC_WAIT_MAX, || {
        let mut probe = match std::net::TcpStream::connect(server.addr) {
            Ok(stream) => stream,
            Err(_) => return false,
        };
        probe.set_read_timeout(Some(Duration::from_secs(2))).expect("timeout");
        if probe.write_all(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n").is_err() {
            return false;
        }
        let mut first = [0u8; 12];
        match probe.read_exact(&mut first) {
            Ok(()) => &first == b"HTTP/1.1 200",
            Err(_) => false,
        }
    });
    assert!(recovered, "a new worker must serve requests after the kill");
}
