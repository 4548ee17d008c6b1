//! Append-only activity log.
//!
//! The engine writes one [`HistoryEntry`] per state-changing operation and never
//! reads it back. Appends are best-effort: a failed append is reported to the
//! caller of [`ActivityLog::append`] but the engine only logs it.

use crate::types::{HistoryEntry, MemberId};
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from activity log backends
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivityLogError {
    /// The backend could not accept the entry
    #[error("Activity log unavailable: {0}")]
    Unavailable(String),
}

/// Sink for history entries.
///
/// Returns `BoxFuture` instead of async fn to stay dyn-compatible, so the
/// engine can hold an `Arc<dyn ActivityLog>`.
pub trait ActivityLog: Send + Sync {
    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityLogError`] if the backend rejects the write.
    fn append(&self, entry: HistoryEntry) -> BoxFuture<'_, Result<(), ActivityLogError>>;
}

/// Activity log kept in process memory.
///
/// # Example
///
/// ```
/// use seat_lease_core::{ActivityKind, ActivityLog, HistoryEntry, InMemoryActivityLog, MemberId};
/// use chrono::Utc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let log = InMemoryActivityLog::new();
/// let member = MemberId::new();
/// log.append(HistoryEntry::new(member, ActivityKind::Signup, "joined", Utc::now())).await?;
/// assert_eq!(log.for_member(&member).await.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryActivityLog {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl InMemoryActivityLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries attributed to `member`, newest first
    pub async fn for_member(&self, member: &MemberId) -> Vec<HistoryEntry> {
        let entries = self.entries.read().await;
        let mut matching: Vec<_> = entries
            .iter()
            .filter(|entry| &entry.member == member)
            .cloned()
            .collect();
        sort_newest_first(&mut matching);
        matching
    }

    /// All entries, newest first
    pub async fn recent(&self) -> Vec<HistoryEntry> {
        let mut all = self.entries.read().await.clone();
        sort_newest_first(&mut all);
        all
    }

    /// Number of recorded entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing has been recorded
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

// Stable sort keeps append order for entries recorded at the same instant,
// reversing afterwards puts the later append first.
fn sort_newest_first(entries: &mut [HistoryEntry]) {
    entries.sort_by_key(|entry| entry.recorded_at);
    entries.reverse();
}

impl ActivityLog for InMemoryActivityLog {
    fn append(&self, entry: HistoryEntry) -> BoxFuture<'_, Result<(), ActivityLogError>> {
        Box::pin(async move {
            self.entries.write().await.push(entry);
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ActivityKind;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_for_member_is_newest_first_and_filtered() {
        let log = InMemoryActivityLog::new();
        let alice = MemberId::new();
        let bob = MemberId::new();
        let now = Utc::now();

        log.append(HistoryEntry::new(alice, ActivityKind::Signup, "joined", now))
            .await
            .unwrap();
        log.append(HistoryEntry::new(bob, ActivityKind::Signup, "joined", now))
            .await
            .unwrap();
        log.append(HistoryEntry::new(
            alice,
            ActivityKind::Reserve,
            "seat 3",
            now + Duration::minutes(1),
        ))
        .await
        .unwrap();

        let history = log.for_member(&alice).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, ActivityKind::Reserve);
        assert_eq!(history[1].kind, ActivityKind::Signup);
        assert_eq!(log.len().await, 3);
    }

    #[tokio::test]
    async fn test_recent_keeps_latest_append_first_on_ties() {
        let log = InMemoryActivityLog::new();
        let member = MemberId::new();
        let now = Utc::now();

        log.append(HistoryEntry::new(member, ActivityKind::Reserve, "first", now))
            .await
            .unwrap();
        log.append(HistoryEntry::new(member, ActivityKind::Cancel, "second", now))
            .await
            .unwrap();

        let recent = log.recent().await;
        assert_eq!(recent[0].description, "second");
        assert_eq!(recent[1].description, "first");
    }
}
