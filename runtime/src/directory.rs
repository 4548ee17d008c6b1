//! Member directory: registered members, keyed by id and by email.

use chrono::{DateTime, Utc};
use seat_lease_core::{Member, MemberId, ReservationError};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Members {
    by_id: HashMap<MemberId, Member>,
    by_email: HashMap<String, MemberId>,
}

/// Registered members
#[derive(Debug, Default)]
pub struct MemberDirectory {
    members: RwLock<Members>,
}

/// Emails are matched ignoring surrounding whitespace and ASCII case.
fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl MemberDirectory {
    /// Create an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new member.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::DuplicateMember`] if the email is taken.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        joined_at: DateTime<Utc>,
    ) -> Result<Member, ReservationError> {
        let email = normalize_email(email);
        let mut members = self.members.write().await;
        if members.by_email.contains_key(&email) {
            return Err(ReservationError::DuplicateMember(email));
        }

        let member = Member::new(name.trim().to_string(), email.clone(), joined_at);
        members.by_email.insert(email, member.id);
        members.by_id.insert(member.id, member.clone());
        Ok(member)
    }

    /// Look up a member by id
    pub async fn get(&self, id: &MemberId) -> Option<Member> {
        self.members.read().await.by_id.get(id).cloned()
    }

    /// Look up a member by email
    pub async fn find_by_email(&self, email: &str) -> Option<Member> {
        let members = self.members.read().await;
        let id = members.by_email.get(&normalize_email(email))?;
        members.by_id.get(id).cloned()
    }

    /// Number of registered members
    pub async fn len(&self) -> usize {
        self.members.read().await.by_id.len()
    }

    /// Whether nobody has registered
    pub async fn is_empty(&self) -> bool {
        self.members.read().await.by_id.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let directory = MemberDirectory::new();
        let member = directory
            .register("Mina", "mina@example.com", Utc::now())
            .await
            .unwrap();

        assert_eq!(directory.get(&member.id).await, Some(member.clone()));
        assert_eq!(
            directory.find_by_email(" MINA@example.com ").await,
            Some(member)
        );
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let directory = MemberDirectory::new();
        directory
            .register("Mina", "mina@example.com", Utc::now())
            .await
            .unwrap();

        let result = directory
            .register("Other", "Mina@Example.com", Utc::now())
            .await;
        assert_eq!(
            result,
            Err(ReservationError::DuplicateMember(
                "mina@example.com".to_string()
            ))
        );
        assert_eq!(directory.len().await, 1);
    }
}
