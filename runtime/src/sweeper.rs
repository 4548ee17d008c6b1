//! Expiry sweeper: reclaims seats whose paid time has run out.
//!
//! [`ReservationEngine::run_expiry_sweep`] is a plain async function of the
//! current time, so tests drive it directly. [`ExpirySweeper`] is the timer
//! that calls it on a fixed period until shutdown is signalled.
//!
//! Expired sessions are fully consumed: the seat is freed with no refund.

use crate::engine::{Refund, Release, ReservationEngine};
use chrono::{DateTime, Utc};
use seat_lease_core::{ActivityKind, HistoryEntry, MemberId, ReservationError, SeatId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default sweep period
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// What one sweep did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// The cutoff the sweep ran against
    pub swept_at: DateTime<Utc>,
    /// Seats reclaimed, in seat-number order
    pub released: Vec<Release>,
}

impl SweepReport {
    /// Whether nothing was reclaimed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.released.is_empty()
    }
}

impl ReservationEngine {
    /// Free every occupied seat whose release time is at or before `now`.
    ///
    /// Each seat is re-checked under its occupant's wallet lock and its own
    /// lock, so a seat cancelled or extended after the scan is skipped.
    /// Running the sweep twice for the same `now` releases nothing the second time.
    #[tracing::instrument(skip(self))]
    pub async fn run_expiry_sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let candidates = self.registry.find_expired_before(now).await;
        debug!(candidates = candidates.len(), "Expiry sweep scanned seats");

        let mut released = Vec::new();
        for candidate in candidates {
            let Some(member) = candidate.occupant() else {
                continue;
            };
            match self.expire_seat(candidate.id, member, now).await {
                Ok(Some(release)) => {
                    Self::released("expiry", &release);
                    self.record(HistoryEntry::new(
                        release.member,
                        ActivityKind::ForceCancel,
                        format!("Seat {} released: session time elapsed", release.seat_number),
                        now,
                    ))
                    .await;
                    released.push(release);
                }
                Ok(None) => {
                    debug!(seat_number = candidate.seat_number, "Seat no longer expired, skipping");
                }
                Err(error) => {
                    warn!(
                        seat_number = candidate.seat_number,
                        error = %error,
                        "Failed to reclaim expired seat"
                    );
                }
            }
        }

        if !released.is_empty() {
            info!(released = released.len(), "Expired seats reclaimed");
        }
        SweepReport {
            swept_at: now,
            released,
        }
    }

    async fn expire_seat(
        &self,
        seat_id: SeatId,
        member: MemberId,
        now: DateTime<Utc>,
    ) -> Result<Option<Release>, ReservationError> {
        let mut wallet = self.ledger.lock(&member).await?;
        let mut seat = self.registry.lock(seat_id).await?;
        if seat.occupant() != Some(member) || !seat.is_expired(now) {
            return Ok(None);
        }
        Ok(self.settle(&mut wallet, &mut seat, now, Refund::Forfeit).await)
    }
}

/// Background task that sweeps on a fixed period
pub struct ExpirySweeper {
    engine: Arc<ReservationEngine>,
    period: Duration,
}

impl ExpirySweeper {
    /// Create a sweeper; a zero period is raised to one millisecond
    #[must_use]
    pub fn new(engine: Arc<ReservationEngine>, period: Duration) -> Self {
        Self {
            engine,
            period: period.max(Duration::from_millis(1)),
        }
    }

    /// Sweep period
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Run until a value arrives on `shutdown` or its sender is dropped.
    ///
    /// The first sweep runs immediately.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_secs = self.period.as_secs_f64(), "Expiry sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = self.engine.now();
                        self.engine.run_expiry_sweep(now).await;
                    }
                    _ = shutdown.recv() => {
                        info!("Expiry sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}
