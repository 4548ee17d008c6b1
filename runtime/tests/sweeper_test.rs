//! Expiry sweep: elapsed sessions are reclaimed without refund.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::Duration;
use seat_lease_core::environment::Clock;
use seat_lease_core::{ActivityKind, InMemoryActivityLog, MemberId, Minutes, SeatId};
use seat_lease_runtime::{EngineEnvironment, ExpirySweeper, ReservationEngine, ReserveDuration};
use seat_lease_testing::ManualClock;
use std::sync::Arc;
use tokio::sync::broadcast;

struct Floor {
    clock: Arc<ManualClock>,
    log: Arc<InMemoryActivityLog>,
    engine: Arc<ReservationEngine>,
    seats: Vec<SeatId>,
}

async fn floor() -> Floor {
    let clock = Arc::new(ManualClock::starting_at_test_epoch());
    let log = Arc::new(InMemoryActivityLog::new());
    let engine = Arc::new(ReservationEngine::new(EngineEnvironment::new(
        clock.clone(),
        log.clone(),
    )));
    let seats = engine.provision_seats(3).await;
    Floor {
        clock,
        log,
        engine,
        seats,
    }
}

async fn seated(floor: &Floor, email: &str, seat: usize, minutes: u64) -> MemberId {
    let member = floor.engine.register_member("Member", email).await.unwrap();
    floor
        .engine
        .ledger()
        .credit(&member.id, Minutes::new(minutes))
        .await
        .unwrap();
    floor
        .engine
        .reserve(
            floor.seats[seat],
            member.id,
            ReserveDuration::Minutes(Minutes::new(minutes)),
        )
        .await
        .unwrap();
    member.id
}

#[tokio::test]
async fn test_sweep_frees_only_elapsed_seats() {
    let floor = floor().await;
    let expired = seated(&floor, "a@example.com", 0, 30).await;
    let running = seated(&floor, "b@example.com", 1, 36).await;

    // Seat 1 ran out a minute ago, seat 2 has five minutes left, seat 3 is free
    floor.clock.advance(Duration::minutes(31));
    let report = floor.engine.run_expiry_sweep(floor.clock.now()).await;

    assert_eq!(report.released.len(), 1);
    let release = &report.released[0];
    assert_eq!(release.member, expired);
    assert_eq!(release.seat_id, floor.seats[0]);
    assert_eq!(release.refunded, Minutes::ZERO);
    assert_eq!(floor.engine.balance_of(&expired).await.unwrap(), Minutes::ZERO);
    assert!(floor.engine.registry().find_by_occupant(&expired).await.is_none());

    let still_running = floor.engine.registry().find_by_occupant(&running).await.unwrap();
    assert_eq!(still_running.id, floor.seats[1]);
    assert_eq!(
        still_running.release_at(),
        Some(seat_lease_testing::test_epoch() + Duration::minutes(36))
    );

    let free = floor.engine.registry().lock(floor.seats[2]).await.unwrap();
    assert!(!free.is_occupied());
    drop(free);

    assert_eq!(floor.engine.occupancy().await.occupied, 1);
    let history = floor.log.for_member(&expired).await;
    assert_eq!(history[0].kind, ActivityKind::ForceCancel);
    assert_eq!(
        history[0].description,
        "Seat 1 released: session time elapsed"
    );
}

#[tokio::test]
async fn test_sweep_releases_at_exact_release_time() {
    let floor = floor().await;
    let member = seated(&floor, "a@example.com", 0, 30).await;

    floor.clock.advance(Duration::minutes(30));
    let report = floor.engine.run_expiry_sweep(floor.clock.now()).await;

    assert_eq!(report.released.len(), 1);
    assert_eq!(report.released[0].member, member);
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let floor = floor().await;
    seated(&floor, "a@example.com", 0, 10).await;
    floor.clock.advance(Duration::minutes(20));
    let now = floor.clock.now();

    let first = floor.engine.run_expiry_sweep(now).await;
    let entries = floor.log.len().await;
    let second = floor.engine.run_expiry_sweep(now).await;

    assert_eq!(first.released.len(), 1);
    assert!(second.is_empty());
    assert_eq!(floor.log.len().await, entries);
}

#[tokio::test]
async fn test_sweep_with_nothing_to_do() {
    let floor = floor().await;
    seated(&floor, "a@example.com", 0, 10).await;

    let report = floor.engine.run_expiry_sweep(floor.clock.now()).await;

    assert!(report.is_empty());
    assert_eq!(report.swept_at, floor.clock.now());
    assert_eq!(floor.engine.occupancy().await.occupied, 1);
}

#[tokio::test]
async fn test_member_can_reserve_again_after_sweep() {
    let floor = floor().await;
    let member = seated(&floor, "a@example.com", 0, 10).await;
    floor.clock.advance(Duration::minutes(15));
    floor.engine.run_expiry_sweep(floor.clock.now()).await;

    floor.engine.charge_time(member, 1).await.unwrap();
    let reservation = floor
        .engine
        .reserve(
            floor.seats[0],
            member,
            ReserveDuration::Minutes(Minutes::new(20)),
        )
        .await
        .unwrap();

    assert_eq!(reservation.balance_after, Minutes::new(40));
}

#[tokio::test(start_paused = true)]
async fn test_spawned_sweeper_runs_until_shutdown() {
    let floor = floor().await;
    let first = seated(&floor, "a@example.com", 0, 10).await;
    let second = seated(&floor, "b@example.com", 1, 60).await;
    floor.clock.advance(Duration::minutes(11));

    let period = std::time::Duration::from_secs(60);
    let sweeper = ExpirySweeper::new(floor.engine.clone(), period);
    assert_eq!(sweeper.period(), period);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = sweeper.spawn(shutdown_rx);

    // First tick fires immediately
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert!(floor.engine.registry().find_by_occupant(&first).await.is_none());
    assert!(floor.engine.registry().find_by_occupant(&second).await.is_some());

    floor.clock.advance(Duration::minutes(60));
    tokio::time::sleep(period).await;
    assert!(floor.engine.registry().find_by_occupant(&second).await.is_none());
    assert_eq!(floor.engine.occupancy().await.occupied, 0);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("sweeper should stop after shutdown")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_stops_when_sender_dropped() {
    let floor = floor().await;
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let handle = ExpirySweeper::new(floor.engine.clone(), std::time::Duration::from_secs(5))
        .spawn(shutdown_rx);

    drop(shutdown_tx);

    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("sweeper should stop once the channel closes")
        .unwrap();
}
