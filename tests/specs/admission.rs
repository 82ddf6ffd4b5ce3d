// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission rejection at the worker cap.

use super::prelude::*;
use serial_test::serial;
use std::io::{Read, Write};
use std::time::Duration;

#[test]
#[serial]
fn connection_beyond_the_cap_is_closed_unread_then_service_resumes() {
    let config = Config { min_workers: 1, max_workers: 1, ..demo_config() };
    let server = DemoServer::start(&config);

    // Occupy the only worker.
    let mut holder = server.connect();
    holder
        .write_all(b"GET /sleep?ms=1500 HTTP/1.1\r\nHost: x\r\n\r\n")
        .expect("holder request");
    std::thread::sleep(Duration::from_millis(300));

    // A second concurrent connection finds no worker and no room to grow:
    // it is closed with no bytes written.
    let mut rejected = server.connect();
    let _ = rejected.write_all(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n");
    let mut buf = Vec::new();
    let n = rejected.read_to_end(&mut buf).unwrap_or(0);
    assert_eq!(n, 0, "admission reject must write nothing");

    // The holder eventually completes normally.
    let resp = read_response(&mut holder);
    assert_eq!(resp.code(), 200);
    assert_eq!(resp.body_str(), "late");
    // Close the kept-alive connection so the worker frees up.
    drop(holder);

    // Once the daemon has seen the worker report ready, a third
    // connection is served.
    let served = wait_for(SPEC_WAIT_MAX, || {
        let mut probe = match std::net::TcpStream::connect(server.addr) {
            Ok(stream) => stream,
            Err(_) => return false,
        };
        probe
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("timeout");
        if probe.write_all(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n").is_err() {
            return false;
        }
        let mut first = [0u8; 12];
        match probe.read_exact(&mut first) {
            Ok(()) => &first == b"HTTP/1.1 200",
            Err(_) => false,
        }
    });
    assert!(served, "service resumes after the holder completes");
}
