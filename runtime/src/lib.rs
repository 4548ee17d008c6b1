//! # Seat Lease Runtime
//!
//! The reservation engine and its moving parts:
//!
//! - [`TimeLedger`]: per-member prepaid minutes
//! - [`SeatRegistry`]: seat occupancy and release times
//! - [`ReservationEngine`]: reserve, cancel, force-cancel, charge
//! - [`ExpirySweeper`]: periodic reclaim of elapsed sessions
//!
//! # Quick Start
//!
//! ```no_run
//! use seat_lease_core::{environment::SystemClock, InMemoryActivityLog, Minutes};
//! use seat_lease_runtime::{EngineEnvironment, ReservationEngine, ReserveDuration};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let env = EngineEnvironment::new(Arc::new(SystemClock), Arc::new(InMemoryActivityLog::new()));
//! let engine = ReservationEngine::new(env);
//! let seats = engine.provision_seats(30).await;
//!
//! let member = engine.register_member("Mina", "mina@example.com").await?;
//! engine.charge_time(member.id, 2).await?;
//! engine
//!     .reserve(seats[0], member.id, ReserveDuration::Minutes(Minutes::new(90)))
//!     .await?;
//!
//! let release = engine.cancel(member.id).await?;
//! println!("refunded {}", release.refunded);
//! # Ok(())
//! # }
//! ```

/// Environment-driven configuration
pub mod config;

/// Member directory
pub mod directory;

/// Reservation engine
pub mod engine;

/// Time ledger
pub mod ledger;

/// Prometheus metrics for observability
pub mod metrics;

/// Seat registry
pub mod registry;

/// Expiry sweeper
pub mod sweeper;

pub use config::Config;
pub use directory::MemberDirectory;
pub use engine::{
    Charge, EngineEnvironment, Release, Reservation, ReservationEngine, ReserveDuration, SeatView,
};
pub use ledger::{TimeLedger, WalletGuard};
pub use registry::{OccupancySummary, SeatGuard, SeatRegistry};
pub use sweeper::{DEFAULT_SWEEP_INTERVAL, ExpirySweeper, SweepReport};
