//! Reservation engine: reserve, cancel, force-cancel and charge.
//!
//! Each operation runs as one atomic unit over the wallet and seat it touches:
//!
//! 1. Lock the member's wallet (serializes everything for that member)
//! 2. Lock the seat (serializes everything for that seat)
//! 3. Validate every precondition
//! 4. Mutate ledger and registry
//! 5. Drop both locks, then append to the activity log
//!
//! Locks are always taken wallet first, seat second, and the registry's
//! occupant index last. Operations that start from a seat (force-cancel,
//! expiry) read the occupant, drop the seat, then lock wallet and seat in that
//! order and re-check that the occupant has not changed.
//!
//! Operations on disjoint members and seats share no lock and run in parallel.

use crate::directory::MemberDirectory;
use crate::ledger::{TimeLedger, WalletGuard};
use crate::metrics::{
    ACTIVITY_LOG_FAILURES_TOTAL, MINUTES_CHARGED_TOTAL, MINUTES_REFUNDED_TOTAL, REJECTIONS_TOTAL,
    RELEASES_TOTAL, RESERVATIONS_TOTAL, SEATS_OCCUPIED,
};
use crate::registry::{OccupancySummary, SeatGuard, SeatRegistry};
use chrono::{DateTime, Utc};
use seat_lease_core::environment::Clock;
use seat_lease_core::{
    ActivityKind, ActivityLog, HistoryEntry, Member, MemberId, Minutes, ReservationError, SeatId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Environment dependencies for the reservation engine
#[derive(Clone)]
pub struct EngineEnvironment {
    /// Clock for session start and refund computation
    pub clock: Arc<dyn Clock>,
    /// Sink for history entries
    pub activity: Arc<dyn ActivityLog>,
}

impl EngineEnvironment {
    /// Creates a new `EngineEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, activity: Arc<dyn ActivityLog>) -> Self {
        Self { clock, activity }
    }
}

/// How long a reservation should last
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveDuration {
    /// A fixed number of minutes
    Minutes(Minutes),
    /// Everything in the member's wallet
    AllBalance,
}

impl From<Minutes> for ReserveDuration {
    fn from(minutes: Minutes) -> Self {
        Self::Minutes(minutes)
    }
}

/// Receipt for a successful reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reserved seat
    pub seat_id: SeatId,
    /// Floor number of the reserved seat
    pub seat_number: u32,
    /// Occupant
    pub member: MemberId,
    /// Minutes debited
    pub reserved: Minutes,
    /// When the session ends
    pub release_at: DateTime<Utc>,
    /// Wallet balance after the debit
    pub balance_after: Minutes,
}

/// Receipt for a released seat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Released seat
    pub seat_id: SeatId,
    /// Floor number of the released seat
    pub seat_number: u32,
    /// Former occupant
    pub member: MemberId,
    /// Whole unused minutes credited back
    pub refunded: Minutes,
    /// Wallet balance after the refund
    pub balance_after: Minutes,
}

/// Receipt for a top-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Charge {
    /// Member topped up
    pub member: MemberId,
    /// Minutes purchased
    pub charged: Minutes,
    /// New release time, if the charge went into a running session
    pub extended_until: Option<DateTime<Utc>>,
    /// Wallet balance after the charge
    pub balance_after: Minutes,
}

/// Read-only view of a seat for the seat board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatView {
    /// Seat identifier
    pub id: SeatId,
    /// Floor number
    pub seat_number: u32,
    /// Whether the seat is held
    pub occupied: bool,
    /// Current occupant
    pub occupant: Option<MemberId>,
    /// When the session ends
    pub release_at: Option<DateTime<Utc>>,
    /// Whole minutes left, `None` for a free seat
    pub remaining: Option<Minutes>,
}

impl SeatView {
    /// Remaining time as `HH:MM`.
    ///
    /// Empty for a free seat and `00:00` once the session has elapsed.
    #[must_use]
    pub fn remaining_label(&self) -> String {
        self.remaining.map_or_else(String::new, |remaining| {
            let minutes = remaining.get();
            format!("{:02}:{:02}", minutes / 60, minutes % 60)
        })
    }
}

/// Whether a release credits unused time back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Refund {
    /// Credit whole unused minutes
    Unused,
    /// Elapsed sessions are fully consumed
    Forfeit,
}

/// The reservation engine
pub struct ReservationEngine {
    pub(crate) ledger: TimeLedger,
    pub(crate) registry: SeatRegistry,
    directory: MemberDirectory,
    pub(crate) env: EngineEnvironment,
}

impl ReservationEngine {
    /// Create an engine with an empty seat pool and no members
    #[must_use]
    pub fn new(env: EngineEnvironment) -> Self {
        Self {
            ledger: TimeLedger::new(),
            registry: SeatRegistry::new(),
            directory: MemberDirectory::new(),
            env,
        }
    }

    /// The time ledger
    #[must_use]
    pub const fn ledger(&self) -> &TimeLedger {
        &self.ledger
    }

    /// The seat registry
    #[must_use]
    pub const fn registry(&self) -> &SeatRegistry {
        &self.registry
    }

    /// The member directory
    #[must_use]
    pub const fn directory(&self) -> &MemberDirectory {
        &self.directory
    }

    /// Current time according to the injected clock
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.env.clock.now()
    }

    /// Add `count` free seats to the pool
    pub async fn provision_seats(&self, count: u32) -> Vec<SeatId> {
        let seats = self.registry.provision(count).await;
        tracing::info!(added = seats.len(), "Seats provisioned");
        seats
    }

    /// Register a member with an empty wallet.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::DuplicateMember`] if the email is taken.
    #[tracing::instrument(skip(self, name))]
    pub async fn register_member(
        &self,
        name: &str,
        email: &str,
    ) -> Result<Member, ReservationError> {
        let now = self.now();
        let member = self
            .directory
            .register(name, email, now)
            .await
            .inspect_err(|error| Self::rejected("register_member", error))?;
        self.ledger.open(member.id).await;

        tracing::info!(member = %member.id, "Member registered");
        self.record(HistoryEntry::new(
            member.id,
            ActivityKind::Signup,
            "Signed up",
            now,
        ))
        .await;
        Ok(member)
    }

    /// Current wallet balance.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::MemberNotFound`].
    pub async fn balance_of(&self, member: &MemberId) -> Result<Minutes, ReservationError> {
        self.ledger.balance_of(member).await
    }

    /// Every seat, ordered by seat number
    pub async fn seats(&self) -> Vec<SeatView> {
        let now = self.now();
        self.registry
            .snapshot()
            .await
            .into_iter()
            .map(|seat| SeatView {
                id: seat.id,
                seat_number: seat.seat_number,
                occupied: seat.is_occupied(),
                occupant: seat.occupant(),
                release_at: seat.release_at(),
                remaining: seat.is_occupied().then(|| seat.remaining(now)),
            })
            .collect()
    }

    /// Occupied and total seat counts
    pub async fn occupancy(&self) -> OccupancySummary {
        self.registry.occupancy().await
    }

    /// Reserve `seat_id` for `member`.
    ///
    /// Checks, in order: the member exists, holds no seat, asks for at least one
    /// minute, can pay for it, the seat exists and is free. Only then is the
    /// wallet debited and the seat occupied until `now + duration`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::MemberNotFound`],
    /// [`ReservationError::AlreadyReserved`], [`ReservationError::InvalidDuration`],
    /// [`ReservationError::InsufficientBalance`], [`ReservationError::SeatNotFound`]
    /// or [`ReservationError::SeatAlreadyOccupied`]. Nothing changes on error.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(
        &self,
        seat_id: SeatId,
        member: MemberId,
        duration: ReserveDuration,
    ) -> Result<Reservation, ReservationError> {
        let now = self.now();
        let reservation = self
            .try_reserve(seat_id, member, duration, now)
            .await
            .inspect_err(|error| Self::rejected("reserve", error))?;

        tracing::info!(
            seat_number = reservation.seat_number,
            minutes = reservation.reserved.get(),
            balance = reservation.balance_after.get(),
            "Seat reserved"
        );
        metrics::counter!(RESERVATIONS_TOTAL).increment(1);
        metrics::gauge!(SEATS_OCCUPIED).increment(1.0);
        self.record(HistoryEntry::new(
            member,
            ActivityKind::Reserve,
            format!(
                "Seat {} reserved ({} min)",
                reservation.seat_number,
                reservation.reserved.get()
            ),
            now,
        ))
        .await;
        Ok(reservation)
    }

    async fn try_reserve(
        &self,
        seat_id: SeatId,
        member: MemberId,
        duration: ReserveDuration,
        now: DateTime<Utc>,
    ) -> Result<Reservation, ReservationError> {
        let mut wallet = self.ledger.lock(&member).await?;
        if let Some(held) = self.registry.occupied_seat_of(&member).await {
            return Err(ReservationError::AlreadyReserved { member, seat: held });
        }

        let available = wallet.balance();
        let minutes = match duration {
            ReserveDuration::Minutes(minutes) if minutes.is_zero() => {
                return Err(ReservationError::InvalidDuration);
            }
            ReserveDuration::Minutes(minutes) => minutes,
            ReserveDuration::AllBalance => available,
        };
        if available < minutes || available.is_zero() {
            return Err(ReservationError::InsufficientBalance {
                required: minutes.max(Minutes::new(1)),
                available,
            });
        }

        let mut seat = self.registry.lock(seat_id).await?;
        if seat.is_occupied() {
            return Err(ReservationError::SeatAlreadyOccupied(seat_id));
        }

        let release_at = minutes.after(now);
        let balance_after = wallet.debit(minutes)?;
        self.registry.occupy(&mut seat, member, release_at).await?;

        Ok(Reservation {
            seat_id,
            seat_number: seat.seat_number,
            member,
            reserved: minutes,
            release_at,
            balance_after,
        })
    }

    /// Release the seat `member` holds, refunding whole unused minutes.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::MemberNotFound`] or
    /// [`ReservationError::NoActiveReservation`].
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, member: MemberId) -> Result<Release, ReservationError> {
        let now = self.now();
        let release = self
            .try_cancel(member, now)
            .await
            .inspect_err(|error| Self::rejected("cancel", error))?;

        Self::released("member", &release);
        self.record(HistoryEntry::new(
            member,
            ActivityKind::Cancel,
            format!(
                "Seat {} released ({} min refunded)",
                release.seat_number,
                release.refunded.get()
            ),
            now,
        ))
        .await;
        Ok(release)
    }

    async fn try_cancel(
        &self,
        member: MemberId,
        now: DateTime<Utc>,
    ) -> Result<Release, ReservationError> {
        let mut wallet = self.ledger.lock(&member).await?;
        let seat_id = self
            .registry
            .occupied_seat_of(&member)
            .await
            .ok_or(ReservationError::NoActiveReservation(member))?;
        let mut seat = self.registry.lock(seat_id).await?;
        self.settle(&mut wallet, &mut seat, now, Refund::Unused)
            .await
            .ok_or(ReservationError::NoActiveReservation(member))
    }

    /// Administratively release a seat, whoever holds it.
    ///
    /// Unused whole minutes go back to the former occupant. Returns `Ok(None)`
    /// for a seat that is already free.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::SeatNotFound`].
    #[tracing::instrument(skip(self))]
    pub async fn force_cancel(&self, seat_id: SeatId) -> Result<Option<Release>, ReservationError> {
        let now = self.now();
        let release = self
            .try_force_cancel(seat_id, now)
            .await
            .inspect_err(|error| Self::rejected("force_cancel", error))?;

        let Some(release) = release else {
            tracing::info!("Seat already free, nothing to cancel");
            return Ok(None);
        };

        Self::released("admin", &release);
        self.record(HistoryEntry::new(
            release.member,
            ActivityKind::ForceCancel,
            format!(
                "Seat {} released by administrator ({} min refunded)",
                release.seat_number,
                release.refunded.get()
            ),
            now,
        ))
        .await;
        Ok(Some(release))
    }

    async fn try_force_cancel(
        &self,
        seat_id: SeatId,
        now: DateTime<Utc>,
    ) -> Result<Option<Release>, ReservationError> {
        loop {
            let Some(member) = self.registry.lock(seat_id).await?.occupant() else {
                return Ok(None);
            };

            let mut wallet = self.ledger.lock(&member).await?;
            let mut seat = self.registry.lock(seat_id).await?;
            if seat.occupant() != Some(member) {
                tracing::debug!("Occupant changed while acquiring locks, retrying");
                continue;
            }
            return Ok(self
                .settle(&mut wallet, &mut seat, now, Refund::Unused)
                .await);
        }
    }

    /// Top up `member` by `hours`.
    ///
    /// A member who is not seated simply gets the minutes in their wallet. A
    /// seated member has the whole charge converted into session time: the
    /// wallet is credited and immediately debited again, and the seat's release
    /// time moves out by the same amount.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::MemberNotFound`].
    #[tracing::instrument(skip(self))]
    pub async fn charge_time(&self, member: MemberId, hours: u32) -> Result<Charge, ReservationError> {
        let now = self.now();
        let charge = self
            .try_charge_time(member, hours, now)
            .await
            .inspect_err(|error| Self::rejected("charge_time", error))?;

        tracing::info!(
            minutes = charge.charged.get(),
            extended = charge.extended_until.is_some(),
            balance = charge.balance_after.get(),
            "Time charged"
        );
        metrics::counter!(MINUTES_CHARGED_TOTAL).increment(charge.charged.get());
        let suffix = if charge.extended_until.is_some() {
            " (session extended)"
        } else {
            ""
        };
        self.record(HistoryEntry::new(
            member,
            ActivityKind::Reserve,
            format!("Charged {hours} h{suffix}"),
            now,
        ))
        .await;
        Ok(charge)
    }

    async fn try_charge_time(
        &self,
        member: MemberId,
        hours: u32,
        now: DateTime<Utc>,
    ) -> Result<Charge, ReservationError> {
        let mut wallet = self.ledger.lock(&member).await?;
        let mut seat = match self.registry.occupied_seat_of(&member).await {
            Some(seat_id) => Some(self.registry.lock(seat_id).await?),
            None => None,
        };

        let charged = Minutes::from_hours(hours);
        let mut balance_after = wallet.credit(charged);
        let extended_until = match seat.as_mut() {
            Some(seat) => {
                balance_after = wallet.debit(charged)?;
                seat.extend(charged, now)
            }
            None => None,
        };

        Ok(Charge {
            member,
            charged,
            extended_until,
            balance_after,
        })
    }

    /// Release a locked seat on behalf of its locked occupant.
    ///
    /// Returns `None` if the seat is already free.
    pub(crate) async fn settle(
        &self,
        wallet: &mut WalletGuard,
        seat: &mut SeatGuard,
        now: DateTime<Utc>,
        refund: Refund,
    ) -> Option<Release> {
        let release_at = seat.release_at()?;
        let refunded = match refund {
            Refund::Unused => Minutes::between(now, release_at),
            Refund::Forfeit => Minutes::ZERO,
        };
        let balance_after = if refunded.is_zero() {
            wallet.balance()
        } else {
            wallet.credit(refunded)
        };
        self.registry.release(seat).await;

        Some(Release {
            seat_id: seat.id,
            seat_number: seat.seat_number,
            member: wallet.member(),
            refunded,
            balance_after,
        })
    }

    /// Append to the activity log; failures are logged and dropped.
    pub(crate) async fn record(&self, entry: HistoryEntry) {
        let kind = entry.kind;
        let member = entry.member;
        if let Err(error) = self.env.activity.append(entry).await {
            metrics::counter!(ACTIVITY_LOG_FAILURES_TOTAL).increment(1);
            tracing::warn!(
                error = %error,
                kind = %kind,
                member = %member,
                "Failed to append activity log entry"
            );
        }
    }

    pub(crate) fn released(kind: &'static str, release: &Release) {
        tracing::info!(
            seat_number = release.seat_number,
            member = %release.member,
            refunded = release.refunded.get(),
            kind,
            "Seat released"
        );
        metrics::counter!(RELEASES_TOTAL, "kind" => kind).increment(1);
        metrics::counter!(MINUTES_REFUNDED_TOTAL).increment(release.refunded.get());
        metrics::gauge!(SEATS_OCCUPIED).decrement(1.0);
    }

    fn rejected(operation: &'static str, error: &ReservationError) {
        tracing::warn!(operation, reason = error.reason(), error = %error, "Operation rejected");
        metrics::counter!(REJECTIONS_TOTAL, "reason" => error.reason()).increment(1);
    }
}
