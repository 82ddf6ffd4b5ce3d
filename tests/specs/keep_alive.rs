// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keep-alive reuse and expiry specs.

use super::prelude::*;
use serial_test::serial;
use std::io::{Read, Write};
use std::time::Duration;

#[test]
#[serial]
fn one_connection_serves_sequential_requests_in_order() {
    let config = Config { min_workers: 1, max_workers: 1, ..demo_config() };
    let server = DemoServer::start(&config);

    let mut stream = server.connect();

    stream.write_all(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n").expect("first request");
    let first = read_response(&mut stream);
    assert_eq!(first.code(), 200);
    assert_eq!(first.body_str(), "hi");

    stream.write_all(b"GET /x HTTP/1.1\r\nHost: x\r\n\r\n").expect("second request");
    let second = read_response(&mut stream);
    assert_eq!(second.code(), 200);
    assert_eq!(second.body_str(), "A");
}

#[test]
#[serial]
fn idle_kept_alive_connection_is_closed_after_the_timeout() {
    let config = Config {
        keep_alive_timeout: Duration::from_millis(300),
        ..demo_config()
    };
    let server = DemoServer::start(&config);

    let mut stream = server.connect();
    stream.write_all(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n").expect("request");
    let resp = read_response(&mut stream);
    assert_eq!(resp.header("connection"), Some("keep-alive"));

    // Outlive the keep-alive window; the worker closes from its side.
    std::thread::sleep(Duration::from_millis(800));
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).expect("connection closed by server");
    assert!(rest.is_empty());
}

#[test]
#[serial]
fn connection_close_requests_are_honored() {
    let server = DemoServer::start(&demo_config());

    let mut stream = server.connect();
    stream
        .write_all(b"GET /hello HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
        .expect("request");
    let resp = read_response(&mut stream);
    assert_eq!(resp.header("connection"), Some("close"));

    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).expect("clean close");
    assert!(rest.is_empty());
}
