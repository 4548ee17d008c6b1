//! Domain types for the seat lease engine.
//!
//! - Members hold a prepaid wallet of [`Minutes`]
//! - Seats are either free or held by exactly one member until a release time
//! - Every state-changing operation leaves a [`HistoryEntry`] behind

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a member
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(Uuid);

impl MemberId {
    /// Creates a new random `MemberId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `MemberId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a seat
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatId(Uuid);

impl SeatId {
    /// Creates a new random `SeatId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `SeatId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SeatId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SeatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A whole number of minutes.
///
/// Unsigned, so a wallet can never hold a negative balance. Arithmetic that
/// could go below zero is only exposed through [`Minutes::checked_sub`].
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Minutes(u64);

impl Minutes {
    /// Zero minutes
    pub const ZERO: Self = Self(0);

    /// Creates a `Minutes` amount
    #[must_use]
    pub const fn new(minutes: u64) -> Self {
        Self(minutes)
    }

    /// Converts purchased hours into minutes
    #[must_use]
    pub fn from_hours(hours: u32) -> Self {
        Self(u64::from(hours) * 60)
    }

    /// Returns the raw number of minutes
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Checks if this amount is zero
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtracts, returning `None` instead of going below zero
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Adds, clamping at `u64::MAX`
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Whole minutes left from `now` until `until`, floored.
    ///
    /// Partial minutes are dropped and an instant in the past yields zero.
    #[must_use]
    pub fn between(now: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        if until <= now {
            return Self::ZERO;
        }
        let whole = (until - now).num_minutes();
        Self(u64::try_from(whole).unwrap_or(0))
    }

    /// The instant this many minutes after `start`.
    ///
    /// Saturates at the largest representable timestamp.
    #[must_use]
    pub fn after(self, start: DateTime<Utc>) -> DateTime<Utc> {
        i64::try_from(self.0)
            .ok()
            .and_then(TimeDelta::try_minutes)
            .and_then(|delta| start.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl std::fmt::Display for Minutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} min", self.0)
    }
}

/// A registered member
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member identifier
    pub id: MemberId,
    /// Display name
    pub name: String,
    /// Unique login email
    pub email: String,
    /// When the member signed up
    pub joined_at: DateTime<Utc>,
}

impl Member {
    /// Creates a new member with a fresh identifier
    #[must_use]
    pub fn new(name: String, email: String, joined_at: DateTime<Utc>) -> Self {
        Self {
            id: MemberId::new(),
            name,
            email,
            joined_at,
        }
    }
}

/// Who holds an occupied seat and until when.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    /// The occupying member
    pub member: MemberId,
    /// When the paid session ends
    pub release_at: DateTime<Utc>,
}

/// A leasable seat.
///
/// `occupancy` carries occupant and release time together, so a seat is
/// either fully free or fully occupied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Seat identifier
    pub id: SeatId,
    /// Number shown on the floor plan
    pub seat_number: u32,
    /// Current occupancy, `None` when free
    pub occupancy: Option<Occupancy>,
}

impl Seat {
    /// Creates a free seat with a fresh identifier
    #[must_use]
    pub fn new(seat_number: u32) -> Self {
        Self {
            id: SeatId::new(),
            seat_number,
            occupancy: None,
        }
    }

    /// Whether the seat is held by a member
    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        self.occupancy.is_some()
    }

    /// The occupying member, if any
    #[must_use]
    pub fn occupant(&self) -> Option<MemberId> {
        self.occupancy.map(|o| o.member)
    }

    /// The scheduled release time, if occupied
    #[must_use]
    pub fn release_at(&self) -> Option<DateTime<Utc>> {
        self.occupancy.map(|o| o.release_at)
    }

    /// Whole minutes of paid time left at `now`
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Minutes {
        self.release_at()
            .map_or(Minutes::ZERO, |release_at| Minutes::between(now, release_at))
    }

    /// Occupied with a release time at or before `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.release_at().is_some_and(|release_at| release_at <= now)
    }
}

/// Kind of recorded activity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    /// Member signed up
    Signup,
    /// Seat reserved, or time charged
    Reserve,
    /// Member released their own seat
    Cancel,
    /// Seat released by an administrator or by expiry
    ForceCancel,
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Signup => "SIGNUP",
            Self::Reserve => "RESERVE",
            Self::Cancel => "CANCEL",
            Self::ForceCancel => "FORCE_CANCEL",
        };
        f.write_str(label)
    }
}

/// Immutable audit record of one state-changing operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Member the activity is attributed to
    pub member: MemberId,
    /// What happened
    pub kind: ActivityKind,
    /// Human-readable detail
    pub description: String,
    /// When it was recorded
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Creates a history entry
    #[must_use]
    pub fn new(
        member: MemberId,
        kind: ActivityKind,
        description: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            member,
            kind,
            description: description.into(),
            recorded_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_minutes_between_floors_partial_minutes() {
        let now = Utc::now();
        let until = now + Duration::minutes(29) + Duration::seconds(59);
        assert_eq!(Minutes::between(now, until), Minutes::new(29));
    }

    #[test]
    fn test_minutes_between_past_is_zero() {
        let now = Utc::now();
        assert_eq!(Minutes::between(now, now - Duration::minutes(5)), Minutes::ZERO);
        assert_eq!(Minutes::between(now, now), Minutes::ZERO);
    }

    #[test]
    fn test_minutes_checked_sub_never_negative() {
        assert_eq!(Minutes::new(30).checked_sub(Minutes::new(60)), None);
        assert_eq!(
            Minutes::new(60).checked_sub(Minutes::new(30)),
            Some(Minutes::new(30))
        );
    }

    #[test]
    fn test_minutes_after_saturates() {
        let now = Utc::now();
        assert_eq!(Minutes::new(15).after(now), now + Duration::minutes(15));
        assert_eq!(Minutes::new(u64::MAX).after(now), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_from_hours() {
        assert_eq!(Minutes::from_hours(2), Minutes::new(120));
        assert_eq!(Minutes::from_hours(0), Minutes::ZERO);
    }

    #[test]
    fn test_seat_expiry() {
        let now = Utc::now();
        let mut seat = Seat::new(1);
        assert!(!seat.is_expired(now));
        assert_eq!(seat.remaining(now), Minutes::ZERO);

        seat.occupancy = Some(Occupancy {
            member: MemberId::new(),
            release_at: now - Duration::minutes(1),
        });
        assert!(seat.is_expired(now));

        seat.occupancy = Some(Occupancy {
            member: MemberId::new(),
            release_at: now + Duration::minutes(5),
        });
        assert!(!seat.is_expired(now));
        assert_eq!(seat.remaining(now), Minutes::new(5));
    }

    #[test]
    fn test_activity_kind_wire_names() {
        let json = serde_json::to_string(&ActivityKind::ForceCancel).unwrap();
        assert_eq!(json, "\"FORCE_CANCEL\"");
        assert_eq!(ActivityKind::Signup.to_string(), "SIGNUP");
    }
}
