// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request size enforcement specs.

use super::prelude::*;
use serial_test::serial;
use std::io::Read;

#[test]
#[serial]
fn oversized_declared_body_gets_413_and_a_closed_connection() {
    let config = Config { max_request_size: 1024, ..demo_config() };
    let server = DemoServer::start(&config);

    let mut stream = server.connect();
    std::io::Write::write_all(
        &mut stream,
        b"POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 2048\r\n\r\n",
    )
    .expect("request written");

    let resp = read_response(&mut stream);
    assert_eq!(resp.code(), 413);
    assert_eq!(resp.header("connection"), Some("close"));

    // The server closes after a 413; the next read sees EOF.
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).expect("clean close");
    assert!(rest.is_empty());
}

#[test]
#[serial]
fn within_limit_bodies_still_pass() {
    let config = Config { max_request_size: 1024, ..demo_config() };
    let server = DemoServer::start(&config);

    let resp =
        server.request("POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 3\r\n\r\nabc");
    assert_eq!(resp.code(), 200);
    assert_eq!(resp.body_str(), "abc");
}
