//! Errors returned by engine operations.
//!
//! Every variant is a recoverable, caller-visible condition. Preconditions are
//! validated before any mutation, so receiving one of these means nothing changed.

use crate::types::{MemberId, Minutes, SeatId};
use thiserror::Error;

/// Errors that can occur during reservation, release and charge operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// The member already occupies a seat
    #[error("Member {member} already occupies seat {seat}")]
    AlreadyReserved {
        /// The member asking
        member: MemberId,
        /// The seat they already hold
        seat: SeatId,
    },

    /// The wallet does not cover the requested time
    #[error("Insufficient balance: {available} available < {required} required")]
    InsufficientBalance {
        /// Minutes the operation needs
        required: Minutes,
        /// Minutes in the wallet
        available: Minutes,
    },

    /// No seat with this identifier exists
    #[error("Seat {0} not found")]
    SeatNotFound(SeatId),

    /// The seat is held by someone else
    #[error("Seat {0} is already occupied")]
    SeatAlreadyOccupied(SeatId),

    /// The member holds no seat
    #[error("Member {0} has no active reservation")]
    NoActiveReservation(MemberId),

    /// No member with this identifier exists
    #[error("Member {0} not found")]
    MemberNotFound(MemberId),

    /// A seat with this floor number already exists
    #[error("Seat number {0} is already in use")]
    DuplicateSeatNumber(u32),

    /// Signup with an email that is already registered
    #[error("Email {0} is already registered")]
    DuplicateMember(String),

    /// A reservation must cover at least one minute
    #[error("Reservation duration must be at least one minute")]
    InvalidDuration,
}

impl ReservationError {
    /// Short, stable label used for metrics and structured logs
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::AlreadyReserved { .. } => "already_reserved",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::SeatNotFound(_) => "seat_not_found",
            Self::SeatAlreadyOccupied(_) => "seat_already_occupied",
            Self::NoActiveReservation(_) => "no_active_reservation",
            Self::MemberNotFound(_) => "member_not_found",
            Self::DuplicateSeatNumber(_) => "duplicate_seat_number",
            Self::DuplicateMember(_) => "duplicate_member",
            Self::InvalidDuration => "invalid_duration",
        }
    }
}
