//! Server configuration

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Maximum concurrent WebSocket clients (1–65536)
    pub max_clients: usize,
    /// Maximum concurrently allocated rooms (1–10000)
    pub max_rooms: usize,
    /// Seconds of signaling inactivity before a client is reaped (at least 30)
    pub client_timeout_secs: u64,
    /// Capacity of the ingress queue between socket tasks and the dispatcher
    pub queue_capacity: usize,
    /// Maximum inbound frame size in bytes
    pub max_message_size: usize,
    /// WebSocket ping interval in seconds
    pub ws_ping_interval: u64,
    /// Comma-separated list of allowed CORS origins (empty = permissive)
    pub cors_origins: Option<String>,
    /// Bearer token for /admin/* endpoints (None = endpoints hidden)
    pub admin_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_clients: 1024,
            max_rooms: 256,
            client_timeout_secs: 300,
            queue_capacity: 1024,
            max_message_size: 65536,
            ws_ping_interval: 30,
            cors_origins: None,
            admin_token: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = ServerConfig {
            host: env::var("PARLEY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PARLEY_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid PARLEY_PORT")?,
            max_clients: env::var("PARLEY_MAX_CLIENTS")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .context("Invalid PARLEY_MAX_CLIENTS")?,
            max_rooms: env::var("PARLEY_MAX_ROOMS")
                .unwrap_or_else(|_| "256".to_string())
                .parse()
                .context("Invalid PARLEY_MAX_ROOMS")?,
            client_timeout_secs: env::var("PARLEY_CLIENT_TIMEOUT")
                .unwrap_or_else(|_| "300".to_string()) // 5 minutes
                .parse()
                .context("Invalid PARLEY_CLIENT_TIMEOUT")?,
            queue_capacity: env::var("PARLEY_QUEUE_CAPACITY")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .context("Invalid PARLEY_QUEUE_CAPACITY")?,
            max_message_size: env::var("PARLEY_MAX_MESSAGE_SIZE")
                .unwrap_or_else(|_| "65536".to_string()) // 64KB
                .parse()
                .context("Invalid PARLEY_MAX_MESSAGE_SIZE")?,
            ws_ping_interval: env::var("PARLEY_WS_PING_INTERVAL")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid PARLEY_WS_PING_INTERVAL")?,
            cors_origins: env::var("PARLEY_CORS_ORIGINS").ok(),
            admin_token: env::var("PARLEY_ADMIN_TOKEN").ok(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Enforce the documented limits on every knob
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            bail!("Port must be between 1 and 65535");
        }
        if self.max_clients < 1 || self.max_clients > 65536 {
            bail!("Max clients must be between 1 and 65536");
        }
        if self.max_rooms < 1 || self.max_rooms > 10000 {
            bail!("Max rooms must be between 1 and 10000");
        }
        if self.client_timeout_secs < 30 {
            bail!("Client timeout must be at least 30 seconds");
        }
        if self.queue_capacity == 0 {
            bail!("Queue capacity must be at least 1");
        }
        Ok(())
    }
}
