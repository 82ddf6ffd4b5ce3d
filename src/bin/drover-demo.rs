// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Demo application for the workspace end-to-end specs.
//!
//! Configuration comes JSON-encoded in `DROVER_DEMO_CONFIG` (the specs
//! construct it); without it the demo listens on an ephemeral local port
//! with defaults. Prints `READY <addr>` on stdout once bound so a driver
//! can connect.

use drover_server::{
    Endpoints, EndpointError, IpFamily, ListenerSpec, Server, ServerConfig, ServerError,
};
use std::io::Write;

fn endpoints() -> Result<Endpoints, EndpointError> {
    Endpoints::new()
        .route("/hello", |_, out| {
            out.write(b"hi");
        })?
        .route_priority("/x", 5, |_, out| {
            out.write(b"A");
        })?
        .route_priority("/x", 1, |_, out| {
            out.write(b"B");
        })?
        .route("/echo", |req, out| {
            out.write(req.body());
        })?
        .route("/sleep", |req, out| {
            let ms: u64 = req
                .query()
                .and_then(|q| {
                    q.split('&')
                        .find_map(|pair| pair.strip_prefix("ms="))
                        .and_then(|v| v.parse().ok())
                })
                .unwrap_or(10_000);
            std::thread::sleep(std::time::Duration::from_millis(ms));
            out.write(b"late");
        })
}

fn main() {
    let config: ServerConfig = match std::env::var("DROVER_DEMO_CONFIG") {
        Ok(json) => match serde_json::from_str(&json) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("drover-demo: bad DROVER_DEMO_CONFIG: {err}");
                std::process::exit(2);
            }
        },
        Err(_) => ServerConfig {
            listeners: vec![ListenerSpec::new("127.0.0.1", 0, IpFamily::V4)],
            ..Default::default()
        },
    };

    let endpoints = match endpoints() {
        Ok(endpoints) => endpoints,
        Err(err) => {
            eprintln!("drover-demo: {err}");
            std::process::exit(2);
        }
    };

    let result = Server::new(config, endpoints)
        .on_bound(|addrs| {
            println!("READY {}", addrs[0]);
            let _ = std::io::stdout().flush();
        })
        .run();

    match result {
        Ok(()) => {}
        Err(ServerError::StartupAborted(code)) => std::process::exit(code),
        Err(err) => {
            eprintln!("drover-demo: {err}");
            std::process::exit(1);
        }
    }
}
