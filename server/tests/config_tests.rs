//! Server configuration tests

use parley_server::config::ServerConfig;

#[test]
fn test_defaults_are_valid() {
    let config = ServerConfig::default();
    assert!(config.validate().is_ok());

    assert_eq!(config.port, 8080);
    assert_eq!(config.max_clients, 1024);
    assert_eq!(config.max_rooms, 256);
    assert_eq!(config.client_timeout_secs, 300);
    assert_eq!(config.queue_capacity, 1024);
    assert_eq!(config.max_message_size, 65536);
}

#[test]
fn test_port_must_be_nonzero() {
    let config = ServerConfig {
        port: 0,
        ..ServerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_client_limit_range() {
    let low = ServerConfig {
        max_clients: 0,
        ..ServerConfig::default()
    };
    assert!(low.validate().is_err());

    let top = ServerConfig {
        max_clients: 65536,
        ..ServerConfig::default()
    };
    assert!(top.validate().is_ok());

    let high = ServerConfig {
        max_clients: 65537,
        ..ServerConfig::default()
    };
    assert!(high.validate().is_err());
}

#[test]
fn test_room_limit_range() {
    let low = ServerConfig {
        max_rooms: 0,
        ..ServerConfig::default()
    };
    assert!(low.validate().is_err());

    let top = ServerConfig {
        max_rooms: 10000,
        ..ServerConfig::default()
    };
    assert!(top.validate().is_ok());

    let high = ServerConfig {
        max_rooms: 10001,
        ..ServerConfig::default()
    };
    assert!(high.validate().is_err());
}

#[test]
fn test_timeout_floor_is_thirty_seconds() {
    let short = ServerConfig {
        client_timeout_secs: 29,
        ..ServerConfig::default()
    };
    assert!(short.validate().is_err());

    let floor = ServerConfig {
        client_timeout_secs: 30,
        ..ServerConfig::default()
    };
    assert!(floor.validate().is_ok());
}

#[test]
fn test_queue_capacity_floor() {
    let empty = ServerConfig {
        queue_capacity: 0,
        ..ServerConfig::default()
    };
    assert!(empty.validate().is_err());
}
