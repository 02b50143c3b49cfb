use crate::error::SsoError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// A user record in the account store. The email is the sole identity anchor:
/// accounts are looked up by it and created exactly once per new email.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    /// Unique account id.
    pub id: String,
    /// Display name, as asserted by the provider at creation time.
    pub name: String,
    /// Unique email address.
    pub email: String,
}

/// Summary of the resolved account, returned by a successful callback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// The local account id now bound to the session.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl From<Account> for AuthenticatedUser {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
        }
    }
}

/// Persistence port for local accounts, keyed by email.
///
/// Implementations are expected to enforce email uniqueness at creation so
/// concurrent first-logins by the same email cannot produce duplicates.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Look up an account by its exact email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, SsoError>;

    /// Create an account with the given email and display name.
    async fn create(&self, email: &str, name: &str) -> Result<Account, SsoError>;
}

/// In-memory account store for tests and demos.
#[derive(Default)]
pub struct MemoryAccountStore {
    by_email: Mutex<HashMap<String, Account>>,
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, SsoError> {
        Ok(self.by_email.lock().await.get(email).cloned())
    }

    async fn create(&self, email: &str, name: &str) -> Result<Account, SsoError> {
        let mut by_email = self.by_email.lock().await;
        if by_email.contains_key(email) {
            return Err(SsoError::Account(format!(
                "account with email {email} already exists"
            )));
        }
        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
        };
        by_email.insert(email.to_string(), account.clone());
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_returns_none_for_unknown_email() {
        let store = MemoryAccountStore::default();
        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn created_account_is_found_by_email() {
        let store = MemoryAccountStore::default();
        let created = store.create("a@x.com", "A").await.unwrap();
        let found = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.name, "A");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryAccountStore::default();
        store.create("a@x.com", "A").await.unwrap();
        assert!(matches!(
            store.create("a@x.com", "B").await,
            Err(SsoError::Account(_))
        ));
    }
}
