use async_trait::async_trait;
use ssokit_core::SsoError;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Anti-forgery material for one login attempt.
///
/// Generated fresh per attempt, persisted until the provider redirects back,
/// and consumed exactly once at callback time.
#[derive(Clone, Debug)]
pub struct AuthRequestContext {
    /// Random CSRF state, also the storage key.
    pub state: String,
    /// Random nonce, echoed back inside the ID token.
    pub nonce: String,
    /// Issuance time, used for expiry.
    pub issued_at: chrono::DateTime<chrono::Utc>,
}

impl AuthRequestContext {
    /// Generate a fresh context with random state and nonce.
    pub fn generate() -> Self {
        Self {
            state: uuid::Uuid::new_v4().to_string(),
            nonce: uuid::Uuid::new_v4().to_string(),
            issued_at: chrono::Utc::now(),
        }
    }
}

/// Storage port for pending authorization request contexts.
///
/// `take` removes the context unconditionally, so a stored context can
/// satisfy at most one callback regardless of outcome.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Persist a context under its state token.
    async fn put(&self, context: AuthRequestContext) -> Result<(), SsoError>;

    /// Remove and return the context for `state`. Expired or unknown states
    /// return `None`.
    async fn take(&self, state: &str) -> Result<Option<AuthRequestContext>, SsoError>;
}

/// In-memory context store with a bounded lifetime per attempt.
pub struct MemoryContextStore {
    ttl: chrono::Duration,
    pending: Mutex<HashMap<String, AuthRequestContext>>,
}

impl MemoryContextStore {
    /// Override the expiry window.
    pub fn with_ttl(ttl: chrono::Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryContextStore {
    fn default() -> Self {
        // A login attempt has ten minutes to round-trip through the provider.
        Self::with_ttl(chrono::Duration::minutes(10))
    }
}

#[async_trait]
impl ContextStore for MemoryContextStore {
    async fn put(&self, context: AuthRequestContext) -> Result<(), SsoError> {
        let mut pending = self.pending.lock().await;
        let cutoff = chrono::Utc::now() - self.ttl;
        pending.retain(|_, ctx| ctx.issued_at > cutoff);
        pending.insert(context.state.clone(), context);
        Ok(())
    }

    async fn take(&self, state: &str) -> Result<Option<AuthRequestContext>, SsoError> {
        let mut pending = self.pending.lock().await;
        let cutoff = chrono::Utc::now() - self.ttl;
        Ok(pending.remove(state).filter(|ctx| ctx.issued_at > cutoff))
    }
}
