//! Prometheus metrics for the reservation engine.
//!
//! Counters and gauges are recorded through the `metrics` facade; nothing is
//! exported until [`MetricsServer::start`] installs the Prometheus recorder.
//!
//! # Example
//!
//! ```rust,no_run
//! use seat_lease_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use thiserror::Error;

/// Successful reservations
pub const RESERVATIONS_TOTAL: &str = "seat_lease_reservations_total";
/// Seats released, labelled by `kind` (`member`, `admin`, `expiry`)
pub const RELEASES_TOTAL: &str = "seat_lease_releases_total";
/// Rejected operations, labelled by `reason`
pub const REJECTIONS_TOTAL: &str = "seat_lease_rejections_total";
/// Minutes credited back on early release
pub const MINUTES_REFUNDED_TOTAL: &str = "seat_lease_minutes_refunded_total";
/// Minutes added through top-ups
pub const MINUTES_CHARGED_TOTAL: &str = "seat_lease_minutes_charged_total";
/// Activity log appends that failed
pub const ACTIVITY_LOG_FAILURES_TOTAL: &str = "seat_lease_activity_log_failures_total";
/// Seats currently occupied
pub const SEATS_OCCUPIED: &str = "seat_lease_seats_occupied";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build or install the Prometheus exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    started: bool,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            started: false,
        }
    }

    /// Register metric descriptions and start the HTTP exporter.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Install`] if the exporter cannot bind or a
    /// different recorder is already installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        if self.started {
            return Ok(());
        }

        PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .install()
            .map_err(|e| MetricsError::Install(e.to_string()))?;
        register_metrics();
        self.started = true;

        tracing::info!(
            addr = %self.addr,
            "Metrics server started - available at http://{}/metrics",
            self.addr
        );
        Ok(())
    }

    /// Address the exporter listens on
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Describe every metric the engine records
pub fn register_metrics() {
    describe_counter!(RESERVATIONS_TOTAL, "Seats successfully reserved");
    describe_counter!(RELEASES_TOTAL, "Seats released by member, admin or expiry");
    describe_counter!(REJECTIONS_TOTAL, "Engine operations rejected, by reason");
    describe_counter!(
        MINUTES_REFUNDED_TOTAL,
        "Unused minutes credited back on early release"
    );
    describe_counter!(MINUTES_CHARGED_TOTAL, "Minutes added to wallets by top-ups");
    describe_counter!(
        ACTIVITY_LOG_FAILURES_TOTAL,
        "Activity log appends that failed and were dropped"
    );
    describe_gauge!(SEATS_OCCUPIED, "Seats currently occupied");
}
