//! Time ledger: each member's prepaid-minutes wallet.
//!
//! Every wallet sits behind its own async mutex. Holding a [`WalletGuard`] is
//! what serializes all operations touching one member, so the engine takes it
//! first and keeps it for the whole operation.

use seat_lease_core::{MemberId, Minutes, ReservationError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Exclusive access to one member's wallet.
///
/// Released on drop.
#[derive(Debug)]
pub struct WalletGuard {
    member: MemberId,
    balance: OwnedMutexGuard<Minutes>,
}

impl WalletGuard {
    /// The wallet owner
    #[must_use]
    pub const fn member(&self) -> MemberId {
        self.member
    }

    /// Current balance
    #[must_use]
    pub fn balance(&self) -> Minutes {
        *self.balance
    }

    /// Subtract `minutes`, returning the new balance.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::InsufficientBalance`] and leaves the
    /// balance untouched if it does not cover `minutes`.
    pub fn debit(&mut self, minutes: Minutes) -> Result<Minutes, ReservationError> {
        let available = *self.balance;
        let remaining =
            available
                .checked_sub(minutes)
                .ok_or(ReservationError::InsufficientBalance {
                    required: minutes,
                    available,
                })?;
        *self.balance = remaining;
        Ok(remaining)
    }

    /// Add `minutes`, returning the new balance
    pub fn credit(&mut self, minutes: Minutes) -> Minutes {
        *self.balance = self.balance.saturating_add(minutes);
        *self.balance
    }
}

/// All member wallets
#[derive(Debug, Default)]
pub struct TimeLedger {
    wallets: RwLock<HashMap<MemberId, Arc<Mutex<Minutes>>>>,
}

impl TimeLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a zero-balance wallet for `member`.
    ///
    /// Returns `false` and leaves the existing balance alone if one is already open.
    pub async fn open(&self, member: MemberId) -> bool {
        let mut wallets = self.wallets.write().await;
        if wallets.contains_key(&member) {
            return false;
        }
        wallets.insert(member, Arc::new(Mutex::new(Minutes::ZERO)));
        true
    }

    /// Whether `member` has a wallet
    pub async fn contains(&self, member: &MemberId) -> bool {
        self.wallets.read().await.contains_key(member)
    }

    /// Lock `member`'s wallet, waiting for any operation already holding it.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::MemberNotFound`] if no wallet is open.
    pub async fn lock(&self, member: &MemberId) -> Result<WalletGuard, ReservationError> {
        let wallet = self
            .wallets
            .read()
            .await
            .get(member)
            .cloned()
            .ok_or(ReservationError::MemberNotFound(*member))?;
        Ok(WalletGuard {
            member: *member,
            balance: wallet.lock_owned().await,
        })
    }

    /// Atomically subtract `minutes` from `member`'s balance.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::MemberNotFound`] or
    /// [`ReservationError::InsufficientBalance`].
    pub async fn debit(
        &self,
        member: &MemberId,
        minutes: Minutes,
    ) -> Result<Minutes, ReservationError> {
        self.lock(member).await?.debit(minutes)
    }

    /// Atomically add `minutes` to `member`'s balance.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::MemberNotFound`].
    pub async fn credit(
        &self,
        member: &MemberId,
        minutes: Minutes,
    ) -> Result<Minutes, ReservationError> {
        Ok(self.lock(member).await?.credit(minutes))
    }

    /// Read `member`'s balance.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::MemberNotFound`].
    pub async fn balance_of(&self, member: &MemberId) -> Result<Minutes, ReservationError> {
        Ok(self.lock(member).await?.balance())
    }
}
