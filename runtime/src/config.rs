//! Configuration management for the seat lease server.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seat pool configuration
    pub seats: SeatConfig,
    /// Expiry sweeper configuration
    pub sweeper: SweeperConfig,
    /// Process-level configuration
    pub server: ServerConfig,
    /// Member registered at startup, if configured
    pub admin: Option<AdminConfig>,
}

/// Seat pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatConfig {
    /// Seats provisioned at startup, numbered from 1
    pub count: u32,
}

/// Expiry sweeper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// Seconds between sweeps
    pub interval_secs: u64,
}

impl SweeperConfig {
    /// Sweep period, never shorter than one second
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Administrator account seeded at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            seats: SeatConfig {
                count: parsed("SEAT_COUNT", 30),
            },
            sweeper: SweeperConfig {
                interval_secs: parsed("SWEEP_INTERVAL_SECS", 60),
            },
            server: ServerConfig {
                log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
                metrics_host: env::var("METRICS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                metrics_port: parsed("METRICS_PORT", 9090),
                shutdown_timeout: parsed("SHUTDOWN_TIMEOUT", 10),
            },
            admin: env::var("ADMIN_EMAIL").ok().map(|email| AdminConfig {
                name: env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string()),
                email,
            }),
        }
    }

    /// Address the metrics exporter binds to
    #[must_use]
    pub fn metrics_addr(&self) -> String {
        format!("{}:{}", self.server.metrics_host, self.server.metrics_port)
    }
}
