use crate::error::SsoError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// The identity a session is bound to: either a guest placeholder or a local
/// account after a successful login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Guest id or local account id.
    pub id: String,
    /// Whether this session still belongs to an unauthenticated guest.
    pub is_guest: bool,
}

/// A server-side session binding a browser to an identity across requests.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session id, carried by the browser cookie.
    pub id: String,
    /// The identity currently attached to the session.
    pub user: SessionUser,
    /// When the session stops being loadable.
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    /// Create a fresh guest session.
    pub fn guest(ttl: chrono::Duration) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user: SessionUser {
                id: uuid::Uuid::new_v4().to_string(),
                is_guest: true,
            },
            expires_at: chrono::Utc::now() + ttl,
        }
    }

    /// Attach a resolved account to this session, clearing the guest flag.
    ///
    /// The session is mutated in place, not replaced; the caller persists it
    /// through its store afterwards.
    pub fn bind_account(&mut self, account_id: &str) {
        self.user = SessionUser {
            id: account_id.to_string(),
            is_guest: false,
        };
    }
}

/// Persistence port for server-side sessions.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Load a session by id. Expired or unknown ids load as `None`.
    async fn load_session(&self, id: &str) -> Result<Option<Session>, SsoError>;
    /// Persist a session, overwriting any previous state under the same id.
    async fn save_session(&self, session: &Session) -> Result<(), SsoError>;
    /// Delete a session by id.
    async fn delete_session(&self, id: &str) -> Result<(), SsoError>;
}

/// In-memory session store for tests and demos.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_session(&self, id: &str) -> Result<Option<Session>, SsoError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(id)
            .filter(|s| s.expires_at > chrono::Utc::now())
            .cloned())
    }

    async fn save_session(&self, session: &Session) -> Result<(), SsoError> {
        self.sessions
            .lock()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<(), SsoError> {
        self.sessions.lock().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_sessions_start_unauthenticated() {
        let session = Session::guest(chrono::Duration::hours(24));
        assert!(session.user.is_guest);
    }

    #[test]
    fn binding_an_account_clears_the_guest_flag() {
        let mut session = Session::guest(chrono::Duration::hours(24));
        session.bind_account("acct-1");
        assert_eq!(session.user.id, "acct-1");
        assert!(!session.user.is_guest);
    }

    #[tokio::test]
    async fn saved_sessions_round_trip_until_expiry() {
        let store = MemorySessionStore::default();
        let session = Session::guest(chrono::Duration::hours(1));
        store.save_session(&session).await.unwrap();
        assert!(store.load_session(&session.id).await.unwrap().is_some());

        let mut expired = Session::guest(chrono::Duration::hours(1));
        expired.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        store.save_session(&expired).await.unwrap();
        assert!(store.load_session(&expired.id).await.unwrap().is_none());
    }
}
