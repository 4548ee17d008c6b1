//! # Seat Lease Testing
//!
//! Testing utilities and helpers for the seat lease engine.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`], [`SteppingClock`])
//! - A failing activity log for best-effort logging tests
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```
//! use seat_lease_testing::ManualClock;
//! use seat_lease_core::environment::Clock;
//! use chrono::Duration;
//!
//! let clock = ManualClock::starting_at_test_epoch();
//! let before = clock.now();
//! clock.advance(Duration::minutes(30));
//! assert_eq!(clock.now() - before, Duration::minutes(30));
//! ```

use chrono::{DateTime, Utc};
use seat_lease_core::environment::Clock;

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::TimeDelta;
    use futures::future::BoxFuture;
    use seat_lease_core::{ActivityLog, ActivityLogError, HistoryEntry};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use seat_lease_testing::mocks::FixedClock;
    /// use seat_lease_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Lets tests step over session boundaries without sleeping.
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Create a clock stopped at `time`
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Create a clock stopped at the test epoch (2025-01-01 00:00:00 UTC)
        #[must_use]
        pub fn starting_at_test_epoch() -> Self {
            Self::new(test_epoch())
        }

        /// Move the clock forward (or backward, for a negative delta)
        pub fn advance(&self, delta: TimeDelta) {
            let mut time = self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *time += delta;
        }

        /// Jump to an absolute instant
        pub fn set(&self, instant: DateTime<Utc>) {
            let mut time = self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            *time = instant;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
        }
    }

    /// Clock that moves forward by a fixed step every time it is read.
    ///
    /// Any operation that reads the time twice sees two different instants,
    /// which makes inconsistent timestamps visible in tests.
    #[derive(Debug)]
    pub struct SteppingClock {
        next: Mutex<DateTime<Utc>>,
        step: TimeDelta,
    }

    impl SteppingClock {
        /// Create a clock whose first reading is `start`
        #[must_use]
        pub const fn new(start: DateTime<Utc>, step: TimeDelta) -> Self {
            Self {
                next: Mutex::new(start),
                step,
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let mut next = self.next.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let current = *next;
            *next += self.step;
            current
        }
    }

    /// The fixed instant all test clocks start from: 2025-01-01 00:00:00 UTC
    #[must_use]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// Activity log that rejects every append.
    ///
    /// Counts attempts so tests can assert the engine tried to log.
    #[derive(Debug, Default)]
    pub struct FailingActivityLog {
        attempts: AtomicUsize,
    }

    impl FailingActivityLog {
        /// Create a new failing log
        #[must_use]
        pub const fn new() -> Self {
            Self {
                attempts: AtomicUsize::new(0),
            }
        }

        /// How many appends were attempted
        #[must_use]
        pub fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl ActivityLog for FailingActivityLog {
        fn append(&self, _entry: HistoryEntry) -> BoxFuture<'_, Result<(), ActivityLogError>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Err(ActivityLogError::Unavailable(
                    "activity log offline".to_string(),
                ))
            })
        }
    }
}

/// Property-based testing strategies for domain types.
pub mod properties {
    use proptest::prelude::*;
    use seat_lease_core::Minutes;

    /// One step of a randomly generated member workload.
    #[derive(Debug, Clone)]
    pub enum WorkloadStep {
        /// Reserve seat `seat` (index into the pool) for `minutes`
        Reserve {
            /// Member index
            member: usize,
            /// Seat index
            seat: usize,
            /// Requested duration
            minutes: u64,
        },
        /// Release whatever the member holds
        Cancel {
            /// Member index
            member: usize,
        },
        /// Top up by `hours`
        Charge {
            /// Member index
            member: usize,
            /// Purchased hours
            hours: u32,
        },
        /// Administrative release of a seat
        ForceCancel {
            /// Seat index
            seat: usize,
        },
        /// Let time pass, then sweep
        Elapse {
            /// Minutes to advance the clock
            minutes: i64,
        },
    }

    /// Strategy for wallet-sized amounts
    pub fn minutes() -> impl Strategy<Value = Minutes> {
        (0u64..=600).prop_map(Minutes::new)
    }

    /// Strategy for one workload step over `members` members and `seats` seats
    pub fn workload_step(members: usize, seats: usize) -> impl Strategy<Value = WorkloadStep> {
        prop_oneof![
            (0..members, 0..seats, 0u64..=180).prop_map(|(member, seat, minutes)| {
                WorkloadStep::Reserve {
                    member,
                    seat,
                    minutes,
                }
            }),
            (0..members).prop_map(|member| WorkloadStep::Cancel { member }),
            (0..members, 0u32..=3).prop_map(|(member, hours)| WorkloadStep::Charge { member, hours }),
            (0..seats).prop_map(|seat| WorkloadStep::ForceCancel { seat }),
            (0i64..=120).prop_map(|minutes| WorkloadStep::Elapse { minutes }),
        ]
    }

    /// Strategy for a workload of up to `len` steps
    pub fn workload(
        members: usize,
        seats: usize,
        len: usize,
    ) -> impl Strategy<Value = Vec<WorkloadStep>> {
        prop::collection::vec(workload_step(members, seats), 0..len)
    }
}

// Re-export commonly used items
pub use mocks::{
    FailingActivityLog, FixedClock, ManualClock, SteppingClock, test_clock, test_epoch,
};
