//! # Ssokit Flow
//!
//! Orchestrates the OIDC Authorization-Code login flow: starting an
//! authorization request, processing the provider's callback, resolving the
//! asserted claims to a local account, and binding the result to the
//! caller's session.
//!
//! The two operations share no in-process state; everything that must
//! survive the browser round trip lives in a [`ContextStore`] keyed by the
//! per-attempt CSRF state token.

#![warn(missing_docs)]

use ssokit_core::{
    Account, AccountStore, AuthenticatedUser, Session, SessionStore, SsoConfig, SsoError,
};
use ssokit_oidc::{default_http_client, verify_id_token, DiscoveryCache, OidcClient};
use std::sync::Arc;
use url::Url;

/// Per-attempt anti-forgery context and its store.
pub mod context;
pub use context::{AuthRequestContext, ContextStore, MemoryContextStore};

/// Query parameters of the provider's callback redirect.
#[derive(Debug, Default)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackParams {
    /// Extract the callback parameters from a raw path-and-query or an
    /// absolute URL.
    fn parse(raw_path: &str) -> Result<Self, SsoError> {
        let url = if raw_path.contains("://") {
            Url::parse(raw_path)
        } else {
            Url::parse(&format!(
                "http://callback.local/{}",
                raw_path.trim_start_matches('/')
            ))
        }
        .map_err(|_| SsoError::ReplayOrForgery)?;

        let mut params = CallbackParams::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }
        Ok(params)
    }
}

/// The single-sign-on flow, bound to one provider configuration and the
/// application's account and session stores.
pub struct SsoFlow {
    config: SsoConfig,
    http: reqwest::Client,
    discovery: DiscoveryCache,
    contexts: Arc<dyn ContextStore>,
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
}

impl SsoFlow {
    /// Create a flow with the default HTTP client and an in-memory context
    /// store.
    pub fn new(
        config: SsoConfig,
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let http = default_http_client();
        Self {
            config,
            discovery: DiscoveryCache::new(http.clone()),
            http,
            contexts: Arc::new(MemoryContextStore::default()),
            accounts,
            sessions,
        }
    }

    /// Replace the HTTP client used for all provider calls.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.discovery = DiscoveryCache::new(http.clone());
        self.http = http;
        self
    }

    /// Replace the context store.
    pub fn with_context_store(mut self, contexts: Arc<dyn ContextStore>) -> Self {
        self.contexts = contexts;
        self
    }

    /// The session store this flow persists sessions through.
    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        self.sessions.clone()
    }

    /// Construct the provider client: configuration gate, then (cached)
    /// discovery, then credential binding.
    async fn get_client(&self) -> Result<OidcClient, SsoError> {
        self.config.ensure_complete()?;
        let metadata = self.discovery.get(&self.config.discovery_url).await?;
        OidcClient::new(metadata, &self.config, self.http.clone())
    }

    /// Produce the provider's authorization URL for a fresh login attempt.
    ///
    /// Generates a new [`AuthRequestContext`] and persists it so the callback
    /// can verify the returned state. The caller redirects the browser to the
    /// returned URL.
    pub async fn start_authorization(&self) -> Result<String, SsoError> {
        self.config.ensure_complete()?;
        let client = self.get_client().await?;

        let context = AuthRequestContext::generate();
        let url = client.authorization_url(&context.state, &context.nonce)?;
        self.contexts.put(context).await?;

        log::debug!("authorization request started");
        Ok(url)
    }

    /// Process the provider's callback redirect.
    ///
    /// Runs the linear state machine: parse, verify state, exchange the code,
    /// verify the ID-token nonce when one is present, fetch claims, resolve
    /// the local account, and bind the session. Every failure is terminal for
    /// the attempt, and the session is only mutated as the final step.
    pub async fn handle_callback(
        &self,
        raw_path: &str,
        session: &mut Session,
    ) -> Result<AuthenticatedUser, SsoError> {
        self.config.ensure_complete()?;

        let params = CallbackParams::parse(raw_path)?;
        if let Some(error) = params.error {
            return Err(SsoError::ProviderDenied(
                params.error_description.unwrap_or(error),
            ));
        }

        // State integrity comes strictly before the token exchange. The
        // context is consumed here regardless of how the rest plays out.
        let state = params.state.ok_or(SsoError::ReplayOrForgery)?;
        let context = self
            .contexts
            .take(&state)
            .await?
            .ok_or(SsoError::ReplayOrForgery)?;

        let code = params.code.ok_or_else(|| {
            SsoError::TokenExchange("callback carried no authorization code".to_string())
        })?;

        let client = self.get_client().await?;
        let tokens = client.exchange_code(&code).await?;
        let access_token = tokens.require_access_token()?;

        if let Some(id_token) = tokens.id_token.as_deref() {
            verify_id_token(
                id_token,
                client.metadata(),
                &self.config.client_id,
                &context.nonce,
                &self.http,
            )
            .await?;
        }

        let claims = client.userinfo(access_token).await?;
        let email = claims
            .email
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(SsoError::IncompleteClaims("email"))?;
        let name = claims
            .name
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or(SsoError::IncompleteClaims("name"))?;

        let account = self.resolve_account(email, name).await?;

        session.bind_account(&account.id);
        self.sessions.save_session(session).await?;

        log::info!("sso login completed for account {}", account.id);
        Ok(account.into())
    }

    /// Look up the account by email, creating it on first login.
    async fn resolve_account(&self, email: &str, name: &str) -> Result<Account, SsoError> {
        if let Some(account) = self.accounts.find_by_email(email).await? {
            return Ok(account);
        }
        self.accounts.create(email, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssokit_core::{MemoryAccountStore, MemorySessionStore};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        server: MockServer,
        flow: SsoFlow,
        accounts: Arc<MemoryAccountStore>,
        sessions: Arc<MemorySessionStore>,
    }

    async fn harness() -> Harness {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "issuer": server.uri(),
                "authorization_endpoint": format!("{}/authorize", server.uri()),
                "token_endpoint": format!("{}/token", server.uri()),
                "userinfo_endpoint": format!("{}/userinfo", server.uri()),
            })))
            .mount(&server)
            .await;

        let accounts = Arc::new(MemoryAccountStore::default());
        let sessions = Arc::new(MemorySessionStore::default());
        let config = SsoConfig::new(server.uri(), "abc", "s3cret", "https://app.example");
        let flow = SsoFlow::new(config, accounts.clone(), sessions.clone());
        Harness {
            server,
            flow,
            accounts,
            sessions,
        }
    }

    async fn mount_token_success(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok123",
                "token_type": "Bearer",
            })))
            .mount(server)
            .await;
    }

    async fn mount_userinfo(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn issued_state(authorization_url: &str) -> String {
        Url::parse(authorization_url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    fn guest_session() -> Session {
        Session::guest(chrono::Duration::hours(24))
    }

    #[tokio::test]
    async fn missing_configuration_gates_both_operations() {
        let server = MockServer::start().await;
        // No mocks mounted: any provider call would surface as a different
        // error kind than Configuration.
        let accounts = Arc::new(MemoryAccountStore::default());
        let sessions = Arc::new(MemorySessionStore::default());

        for missing in ["discovery", "id", "secret"] {
            let mut config = SsoConfig::new(server.uri(), "abc", "s3cret", "https://app.example");
            match missing {
                "discovery" => config.discovery_url.clear(),
                "id" => config.client_id.clear(),
                _ => config.client_secret.clear(),
            }
            let flow = SsoFlow::new(config, accounts.clone(), sessions.clone());

            assert!(matches!(
                flow.start_authorization().await,
                Err(SsoError::Configuration(_))
            ));
            let mut session = guest_session();
            assert!(matches!(
                flow.handle_callback("/auth/sso_callback?code=x&state=y", &mut session)
                    .await,
                Err(SsoError::Configuration(_))
            ));
        }
    }

    #[tokio::test]
    async fn mismatched_state_is_rejected_before_the_exchange() {
        let h = harness().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&h.server)
            .await;

        h.flow.start_authorization().await.unwrap();

        let mut session = guest_session();
        let err = h
            .flow
            .handle_callback("/auth/sso_callback?code=XYZ&state=forged", &mut session)
            .await
            .unwrap_err();
        assert!(matches!(err, SsoError::ReplayOrForgery));
    }

    #[tokio::test]
    async fn a_callback_is_single_use() {
        let h = harness().await;
        mount_token_success(&h.server).await;
        mount_userinfo(&h.server, serde_json::json!({"email": "a@x.com", "name": "A"})).await;

        let url = h.flow.start_authorization().await.unwrap();
        let callback = format!("/auth/sso_callback?code=XYZ&state={}", issued_state(&url));

        let mut session = guest_session();
        h.flow.handle_callback(&callback, &mut session).await.unwrap();

        let mut replay_session = guest_session();
        let err = h
            .flow
            .handle_callback(&callback, &mut replay_session)
            .await
            .unwrap_err();
        assert!(matches!(err, SsoError::ReplayOrForgery));
        assert!(replay_session.user.is_guest);
    }

    #[tokio::test]
    async fn incomplete_claims_abort_without_side_effects() {
        let h = harness().await;
        mount_token_success(&h.server).await;
        mount_userinfo(&h.server, serde_json::json!({"email": "a@x.com"})).await;

        let url = h.flow.start_authorization().await.unwrap();
        let callback = format!("/auth/sso_callback?code=XYZ&state={}", issued_state(&url));

        let mut session = guest_session();
        let before = session.user.clone();
        let err = h
            .flow
            .handle_callback(&callback, &mut session)
            .await
            .unwrap_err();

        assert!(matches!(err, SsoError::IncompleteClaims("name")));
        assert!(h.accounts.find_by_email("a@x.com").await.unwrap().is_none());
        assert_eq!(session.user, before);
        assert!(h.sessions.load_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn account_resolution_is_idempotent_per_email() {
        let h = harness().await;
        mount_token_success(&h.server).await;
        mount_userinfo(&h.server, serde_json::json!({"email": "a@x.com", "name": "A"})).await;

        let mut ids = Vec::new();
        for _ in 0..2 {
            let url = h.flow.start_authorization().await.unwrap();
            let callback =
                format!("/auth/sso_callback?code=XYZ&state={}", issued_state(&url));
            let mut session = guest_session();
            let user = h.flow.handle_callback(&callback, &mut session).await.unwrap();
            ids.push(user.id);
        }

        assert_eq!(ids[0], ids[1]);
        let account = h.accounts.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(account.id, ids[0]);
    }

    #[tokio::test]
    async fn failed_exchange_leaves_the_session_unchanged() {
        let h = harness().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
            })))
            .mount(&h.server)
            .await;

        let url = h.flow.start_authorization().await.unwrap();
        let callback = format!("/auth/sso_callback?code=XYZ&state={}", issued_state(&url));

        let mut session = guest_session();
        let before = session.user.clone();
        let err = h
            .flow
            .handle_callback(&callback, &mut session)
            .await
            .unwrap_err();

        assert!(matches!(err, SsoError::TokenExchange(_)));
        assert_eq!(session.user, before);
        assert!(session.user.is_guest);
    }

    #[tokio::test]
    async fn provider_denial_is_terminal() {
        let h = harness().await;
        let url = h.flow.start_authorization().await.unwrap();
        let callback = format!(
            "/auth/sso_callback?error=access_denied&error_description=user+declined&state={}",
            issued_state(&url)
        );

        let mut session = guest_session();
        let err = h
            .flow
            .handle_callback(&callback, &mut session)
            .await
            .unwrap_err();
        match err {
            SsoError::ProviderDenied(detail) => assert_eq!(detail, "user declined"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn full_login_binds_the_session_to_a_new_account() {
        let h = harness().await;
        mount_token_success(&h.server).await;
        mount_userinfo(&h.server, serde_json::json!({"email": "a@x.com", "name": "A"})).await;

        let url = h.flow.start_authorization().await.unwrap();
        let pairs: std::collections::HashMap<_, _> =
            Url::parse(&url).unwrap().query_pairs().into_owned().collect();
        assert_eq!(pairs["redirect_uri"], "https://app.example/auth/sso_callback");

        let callback = format!("/auth/sso_callback?code=XYZ&state={}", pairs["state"]);
        let mut session = guest_session();
        let user = h.flow.handle_callback(&callback, &mut session).await.unwrap();

        assert_eq!(user.name, "A");
        assert_eq!(user.email, "a@x.com");
        assert!(!session.user.is_guest);
        assert_eq!(session.user.id, user.id);

        // The mutated session was persisted through the store.
        let stored = h.sessions.load_session(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.user, session.user);
    }

    #[tokio::test]
    async fn absolute_callback_urls_are_accepted() {
        let h = harness().await;
        mount_token_success(&h.server).await;
        mount_userinfo(&h.server, serde_json::json!({"email": "a@x.com", "name": "A"})).await;

        let url = h.flow.start_authorization().await.unwrap();
        let callback = format!(
            "https://app.example/auth/sso_callback?code=XYZ&state={}",
            issued_state(&url)
        );

        let mut session = guest_session();
        assert!(h.flow.handle_callback(&callback, &mut session).await.is_ok());
    }
}
