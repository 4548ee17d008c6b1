//! # Seat Lease Core
//!
//! Core types and traits for the seat lease engine.
//!
//! A fixed pool of seats is leased to members who pre-pay for time in minutes.
//! This crate holds the vocabulary shared by the engine and its collaborators:
//!
//! - **Identifiers**: [`MemberId`], [`SeatId`]
//! - **Wallet unit**: [`Minutes`], always non-negative
//! - **Entities**: [`Member`], [`Seat`] and its [`Occupancy`]
//! - **Audit trail**: [`ActivityKind`], [`HistoryEntry`], the [`ActivityLog`] trait
//! - **Errors**: [`ReservationError`], the caller-visible failure kinds
//! - **Environment**: the [`Clock`](environment::Clock) trait for injected time
//!
//! ## Example
//!
//! ```
//! use seat_lease_core::{Minutes, Seat};
//! use chrono::{Duration, Utc};
//!
//! let now = Utc::now();
//! let mut seat = Seat::new(7);
//! assert!(!seat.is_occupied());
//!
//! seat.occupancy = Some(seat_lease_core::Occupancy {
//!     member: seat_lease_core::MemberId::new(),
//!     release_at: now + Duration::minutes(90),
//! });
//! assert_eq!(seat.remaining(now), Minutes::new(90));
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Activity log trait and the in-memory implementation
pub mod activity;

/// Caller-visible error kinds
pub mod error;

/// Domain types (identifiers, minutes, members, seats, history)
pub mod types;

/// Environment module - Dependency injection traits
///
/// All external dependencies of the engine that are not state (time, for now)
/// are abstracted behind traits and injected at construction.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use seat_lease_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let first = clock.now();
    /// assert!(clock.now() >= first);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system wall clock
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use activity::{ActivityLog, ActivityLogError, InMemoryActivityLog};
pub use error::ReservationError;
pub use types::{
    ActivityKind, HistoryEntry, Member, MemberId, Minutes, Occupancy, Seat, SeatId,
};
