// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Basic request/response and endpoint-priority specs.

use super::prelude::*;
use serial_test::serial;

#[test]
#[serial]
fn single_worker_serves_a_request() {
    let config = Config { min_workers: 1, max_workers: 1, ..demo_config() };
    let server = DemoServer::start(&config);

    let resp = server.request("GET /hello HTTP/1.1\r\nHost: x\r\n\r\n");
    assert_eq!(resp.code(), 200);
    assert_eq!(resp.body_str(), "hi");
    assert_eq!(resp.header("content-length"), Some("2"));
    assert_eq!(resp.header("connection"), Some("keep-alive"));
}

#[test]
#[serial]
fn higher_priority_endpoint_wins() {
    let server = DemoServer::start(&demo_config());

    // /x is registered twice: priority 5 writes "A", priority 1 writes "B".
    let resp = server.request("GET /x HTTP/1.1\r\nHost: x\r\n\r\n");
    assert_eq!(resp.code(), 200);
    assert_eq!(resp.body_str(), "A");
}

#[test]
#[serial]
fn unknown_route_is_404() {
    let server = DemoServer::start(&demo_config());
    let resp = server.request("GET /missing HTTP/1.1\r\nHost: x\r\n\r\n");
    assert_eq!(resp.code(), 404);
}

#[test]
#[serial]
fn request_bodies_reach_handlers() {
    let server = DemoServer::start(&demo_config());
    let resp = server
        .request("POST /echo HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello");
    assert_eq!(resp.code(), 200);
    assert_eq!(resp.body_str(), "hello");
}
