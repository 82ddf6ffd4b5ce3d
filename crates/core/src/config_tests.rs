// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn default_config_is_valid() {
    let config = ServerConfig::default();
    assert_eq!(config.validate(), Ok(()));
    assert_eq!(config.min_workers, 3);
    assert_eq!(config.max_workers, 5);
    assert_eq!(config.listeners.len(), 1);
    assert_eq!(config.listeners[0].port, 8080);
}

#[test]
fn min_above_max_is_rejected() {
    let config = ServerConfig { min_workers: 6, max_workers: 5, ..Default::default() };
    assert_eq!(config.validate(), Err(ConfigError::WorkerBounds { min: 6, max: 5 }));
}

#[test]
fn zero_max_workers_is_rejected() {
    let config = ServerConfig { min_workers: 0, max_workers: 0, ..Default::default() };
    assert_eq!(config.validate(), Err(ConfigError::NoWorkers));
}

#[test]
fn lazy_pool_is_permitted() {
    let config = ServerConfig { min_workers: 0, max_workers: 2, ..Default::default() };
    assert_eq!(config.validate(), Ok(()));
}

#[test]
fn worker_cap_is_enforced() {
    let config = ServerConfig { max_workers: WORKER_CAP + 1, ..Default::default() };
    assert_eq!(config.validate(), Err(ConfigError::WorkerCap(WORKER_CAP + 1)));
}

#[test]
fn empty_listener_set_is_rejected() {
    let config = ServerConfig { listeners: vec![], ..Default::default() };
    assert_eq!(config.validate(), Err(ConfigError::NoListeners));
}

#[test]
fn zero_request_time_is_rejected() {
    let config =
        ServerConfig { max_request_time: Duration::from_secs(0), ..Default::default() };
    assert_eq!(
        config.validate(),
        Err(ConfigError::ZeroDuration { field: "max_request_time" })
    );
}

#[test]
fn permanence_follows_min_workers() {
    let config = ServerConfig { min_workers: 2, max_workers: 4, ..Default::default() };
    assert!(config.is_permanent(0));
    assert!(config.is_permanent(1));
    assert!(!config.is_permanent(2));
    assert!(!config.is_permanent(3));
}

#[test]
fn config_round_trips_through_json() {
    let config = ServerConfig {
        min_workers: 1,
        max_workers: 2,
        worker_user: "www-data".to_string(),
        listeners: vec![ListenerSpec::new("::1", 9090, IpFamily::V6)],
        ..Default::default()
    };
    let encoded = serde_json::to_string(&config).unwrap();
    let decoded: ServerConfig = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded, config);
}
