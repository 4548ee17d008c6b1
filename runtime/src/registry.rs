//! Seat registry: occupancy state for the seat pool.
//!
//! Each seat sits behind its own async mutex, so operations on different seats
//! never contend. An occupant index answers "which seat does this member hold"
//! without scanning the pool; it is only written while the seat is locked and
//! is always the innermost lock taken.

use chrono::{DateTime, Utc};
use seat_lease_core::{MemberId, Minutes, Occupancy, ReservationError, Seat, SeatId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Exclusive access to one seat. Released on drop.
#[derive(Debug)]
pub struct SeatGuard {
    seat: OwnedMutexGuard<Seat>,
}

impl SeatGuard {
    /// Push the release time out by `additional` minutes.
    ///
    /// A release time already in the past restarts from `now`; otherwise the
    /// minutes are added on top of it. A free seat is left untouched and
    /// `None` is returned, since a release time without an occupant is not a
    /// valid seat state.
    pub fn extend(&mut self, additional: Minutes, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let occupancy = self.seat.occupancy.as_mut()?;
        let base = if occupancy.release_at < now {
            now
        } else {
            occupancy.release_at
        };
        occupancy.release_at = additional.after(base);
        Some(occupancy.release_at)
    }
}

impl Deref for SeatGuard {
    type Target = Seat;

    fn deref(&self) -> &Seat {
        &self.seat
    }
}

/// Occupied versus total seat counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancySummary {
    /// Seats currently held
    pub occupied: usize,
    /// Seats in the pool
    pub total: usize,
}

#[derive(Debug, Default)]
struct Pool {
    seats: HashMap<SeatId, Arc<Mutex<Seat>>>,
    // Seat numbers never change after insertion, so this index is read
    // without touching any seat's lock.
    numbers: BTreeMap<u32, SeatId>,
}

impl Pool {
    fn insert(&mut self, seat: Seat) -> SeatId {
        let id = seat.id;
        self.numbers.insert(seat.seat_number, id);
        self.seats.insert(id, Arc::new(Mutex::new(seat)));
        id
    }

    fn highest_number(&self) -> u32 {
        self.numbers.last_key_value().map_or(0, |(number, _)| *number)
    }
}

/// The seat pool
#[derive(Debug, Default)]
pub struct SeatRegistry {
    pool: RwLock<Pool>,
    occupants: Mutex<HashMap<MemberId, SeatId>>,
}

impl SeatRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one free seat with the given floor number.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::DuplicateSeatNumber`] if a seat already
    /// carries that number.
    pub async fn add_seat(&self, seat_number: u32) -> Result<SeatId, ReservationError> {
        let mut pool = self.pool.write().await;
        if pool.numbers.contains_key(&seat_number) {
            return Err(ReservationError::DuplicateSeatNumber(seat_number));
        }
        Ok(pool.insert(Seat::new(seat_number)))
    }

    /// Add `count` free seats, numbered after the highest existing seat number.
    ///
    /// An empty registry gets seats `1..=count`.
    pub async fn provision(&self, count: u32) -> Vec<SeatId> {
        let mut pool = self.pool.write().await;
        let highest = pool.highest_number();
        (1..=count)
            .map(|offset| pool.insert(Seat::new(highest + offset)))
            .collect()
    }

    /// Number of seats in the pool
    pub async fn len(&self) -> usize {
        self.pool.read().await.seats.len()
    }

    /// Whether the pool has no seats
    pub async fn is_empty(&self) -> bool {
        self.pool.read().await.seats.is_empty()
    }

    /// Lock a seat, waiting for any operation already holding it.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::SeatNotFound`] if the id does not resolve.
    pub async fn lock(&self, seat_id: SeatId) -> Result<SeatGuard, ReservationError> {
        let seat = self
            .pool
            .read()
            .await
            .seats
            .get(&seat_id)
            .cloned()
            .ok_or(ReservationError::SeatNotFound(seat_id))?;
        Ok(SeatGuard {
            seat: seat.lock_owned().await,
        })
    }

    /// The id of the seat `member` occupies, if any
    pub async fn occupied_seat_of(&self, member: &MemberId) -> Option<SeatId> {
        self.occupants.lock().await.get(member).copied()
    }

    /// Snapshot of the seat `member` occupies, if any
    pub async fn find_by_occupant(&self, member: &MemberId) -> Option<Seat> {
        let seat_id = self.occupied_seat_of(member).await?;
        let seat = self.lock(seat_id).await.ok()?;
        (seat.occupant() == Some(*member)).then(|| (*seat).clone())
    }

    /// Snapshots of occupied seats whose release time is at or before `cutoff`,
    /// ordered by seat number
    pub async fn find_expired_before(&self, cutoff: DateTime<Utc>) -> Vec<Seat> {
        self.snapshot()
            .await
            .into_iter()
            .filter(|seat| seat.is_expired(cutoff))
            .collect()
    }

    /// Snapshots of every seat, ordered by seat number
    pub async fn snapshot(&self) -> Vec<Seat> {
        let handles: Vec<_> = {
            let pool = self.pool.read().await;
            pool.numbers
                .values()
                .filter_map(|id| pool.seats.get(id).cloned())
                .collect()
        };
        let mut seats = Vec::with_capacity(handles.len());
        for handle in handles {
            seats.push(handle.lock().await.clone());
        }
        seats
    }

    /// Occupied and total seat counts
    pub async fn occupancy(&self) -> OccupancySummary {
        let seats = self.snapshot().await;
        OccupancySummary {
            occupied: seats.iter().filter(|seat| seat.is_occupied()).count(),
            total: seats.len(),
        }
    }

    /// Hand a locked seat to `member` until `release_at`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::SeatAlreadyOccupied`] and changes nothing
    /// if the seat is held.
    pub async fn occupy(
        &self,
        seat: &mut SeatGuard,
        member: MemberId,
        release_at: DateTime<Utc>,
    ) -> Result<(), ReservationError> {
        if seat.is_occupied() {
            return Err(ReservationError::SeatAlreadyOccupied(seat.id));
        }
        seat.seat.occupancy = Some(Occupancy { member, release_at });
        self.occupants.lock().await.insert(member, seat.id);
        Ok(())
    }

    /// Free a locked seat, returning the occupancy it had.
    ///
    /// Releasing a free seat is a no-op that returns `None`.
    pub async fn release(&self, seat: &mut SeatGuard) -> Option<Occupancy> {
        let occupancy = seat.seat.occupancy.take()?;
        let mut occupants = self.occupants.lock().await;
        if occupants.get(&occupancy.member) == Some(&seat.id) {
            occupants.remove(&occupancy.member);
        }
        Some(occupancy)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_provision_numbers_seats_sequentially() {
        let registry = SeatRegistry::new();
        registry.provision(3).await;
        registry.provision(2).await;

        let numbers: Vec<_> = registry
            .snapshot()
            .await
            .iter()
            .map(|seat| seat.seat_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert!(registry.snapshot().await.iter().all(|seat| !seat.is_occupied()));
    }

    #[tokio::test]
    async fn test_add_seat_rejects_taken_number() {
        let registry = SeatRegistry::new();
        registry.provision(2).await;

        assert_eq!(
            registry.add_seat(2).await,
            Err(ReservationError::DuplicateSeatNumber(2))
        );
        registry.add_seat(10).await.unwrap();
        registry.provision(1).await;

        let numbers: Vec<_> = registry
            .snapshot()
            .await
            .iter()
            .map(|seat| seat.seat_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 10, 11]);
    }

    #[tokio::test]
    async fn test_provision_does_not_wait_on_held_seat() {
        let registry = SeatRegistry::new();
        let ids = registry.provision(1).await;
        let held = registry.lock(ids[0]).await.unwrap();

        let added = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            registry.provision(2),
        )
        .await
        .unwrap();

        assert_eq!(added.len(), 2);
        assert_eq!(registry.len().await, 3);
        drop(held);
    }

    #[tokio::test]
    async fn test_occupy_then_release_keeps_index_in_step() {
        let registry = SeatRegistry::new();
        let seat_id = registry.add_seat(1).await.unwrap();
        let member = MemberId::new();
        let release_at = Utc::now() + Duration::minutes(60);

        let mut seat = registry.lock(seat_id).await.unwrap();
        registry.occupy(&mut seat, member, release_at).await.unwrap();
        drop(seat);

        let found = registry.find_by_occupant(&member).await.unwrap();
        assert_eq!(found.id, seat_id);
        assert_eq!(found.release_at(), Some(release_at));

        let mut seat = registry.lock(seat_id).await.unwrap();
        let released = registry.release(&mut seat).await.unwrap();
        assert_eq!(released.member, member);
        assert!(registry.release(&mut seat).await.is_none());
        drop(seat);

        assert!(registry.find_by_occupant(&member).await.is_none());
        let seat = registry.lock(seat_id).await.unwrap();
        assert_eq!(seat.occupant(), None);
        assert_eq!(seat.release_at(), None);
    }

    #[tokio::test]
    async fn test_occupy_rejects_held_seat() {
        let registry = SeatRegistry::new();
        let seat_id = registry.add_seat(1).await.unwrap();
        let first = MemberId::new();
        let release_at = Utc::now() + Duration::minutes(30);

        let mut seat = registry.lock(seat_id).await.unwrap();
        registry.occupy(&mut seat, first, release_at).await.unwrap();
        let result = registry
            .occupy(&mut seat, MemberId::new(), release_at + Duration::minutes(5))
            .await;

        assert_eq!(result, Err(ReservationError::SeatAlreadyOccupied(seat_id)));
        assert_eq!(seat.occupant(), Some(first));
        assert_eq!(seat.release_at(), Some(release_at));
    }

    #[tokio::test]
    async fn test_extend_from_future_and_past_release() {
        let registry = SeatRegistry::new();
        let seat_id = registry.add_seat(1).await.unwrap();
        let now = Utc::now();

        let mut seat = registry.lock(seat_id).await.unwrap();
        assert_eq!(seat.extend(Minutes::new(10), now), None);

        registry
            .occupy(&mut seat, MemberId::new(), now + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(
            seat.extend(Minutes::new(60), now),
            Some(now + Duration::minutes(70))
        );

        let later = now + Duration::minutes(100);
        assert_eq!(
            seat.extend(Minutes::new(15), later),
            Some(later + Duration::minutes(15))
        );
    }

    #[tokio::test]
    async fn test_find_expired_before_only_returns_elapsed_occupied_seats() {
        let registry = SeatRegistry::new();
        let now = Utc::now();
        let ids = registry.provision(3).await;

        let mut a = registry.lock(ids[0]).await.unwrap();
        registry
            .occupy(&mut a, MemberId::new(), now - Duration::minutes(1))
            .await
            .unwrap();
        drop(a);
        let mut b = registry.lock(ids[1]).await.unwrap();
        registry
            .occupy(&mut b, MemberId::new(), now + Duration::minutes(5))
            .await
            .unwrap();
        drop(b);

        let expired = registry.find_expired_before(now).await;
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, ids[0]);

        assert_eq!(
            registry.occupancy().await,
            OccupancySummary {
                occupied: 2,
                total: 3
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_seat() {
        let registry = SeatRegistry::new();
        let missing = SeatId::new();
        assert_eq!(
            registry.lock(missing).await.err(),
            Some(ReservationError::SeatNotFound(missing))
        );
    }
}
