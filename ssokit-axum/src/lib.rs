//! Axum integration for the ssokit single-sign-on subsystem.
//!
//! Exposes the two browser-facing routes: `/auth/sso_login`, which starts
//! the authorization request and redirects to the provider, and
//! `/auth/sso_callback`, which completes the login and redirects to the
//! post-login destination. Requires a [`tower_cookies::CookieManagerLayer`]
//! on the application router.

use axum::extract::{OriginalUri, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use ssokit_core::{SameSite, Session, SessionStore, SsoError};
use ssokit_flow::SsoFlow;
use std::sync::Arc;
use tower_cookies::{Cookie, Cookies};

/// Where the browser lands after a successful login.
const POST_LOGIN_REDIRECT: &str = "/profile";

/// The one user-visible failure message. Every error kind collapses into it;
/// operator logs keep the detail.
const GENERIC_FAILURE: &str = "This login link is expired or invalid.";

/// Attributes of the session cookie.
#[derive(Clone, Debug)]
pub struct SessionCookieConfig {
    /// Cookie name.
    pub cookie_name: String,
    /// Cookie path.
    pub path: String,
    /// Whether the cookie is only sent over HTTPS.
    pub secure: bool,
    /// Whether the cookie is hidden from client-side scripts.
    pub http_only: bool,
    /// Cross-site sending policy.
    pub same_site: SameSite,
    /// Cookie and session lifetime.
    pub max_age: Option<chrono::Duration>,
}

impl Default for SessionCookieConfig {
    fn default() -> Self {
        Self {
            cookie_name: "ssokit_session".to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            max_age: Some(chrono::Duration::hours(24)),
        }
    }
}

/// Shared state for the SSO routes.
#[derive(Clone)]
pub struct SsoState {
    flow: Arc<SsoFlow>,
    sessions: Arc<dyn SessionStore>,
    cookie: SessionCookieConfig,
}

impl SsoState {
    /// Wrap a flow for serving. The session store is taken from the flow so
    /// both sides persist through the same backend.
    pub fn new(flow: SsoFlow, cookie: SessionCookieConfig) -> Self {
        let sessions = flow.session_store();
        Self {
            flow: Arc::new(flow),
            sessions,
            cookie,
        }
    }
}

/// Build the router carrying both SSO routes.
pub fn router(state: SsoState) -> Router {
    Router::new()
        .route("/auth/sso_login", get(sso_login))
        .route("/auth/sso_callback", get(sso_callback))
        .with_state(state)
}

async fn sso_login(State(state): State<SsoState>) -> Response {
    match state.flow.start_authorization().await {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(error) => failure_response(&error),
    }
}

async fn sso_callback(
    State(state): State<SsoState>,
    cookies: Cookies,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let mut session = match load_or_create_session(&state, &cookies).await {
        Ok(session) => session,
        Err(error) => return failure_response(&error),
    };

    let raw_path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    match state.flow.handle_callback(raw_path, &mut session).await {
        Ok(_user) => {
            cookies.add(session_cookie(&state.cookie, session.id.clone()));
            Redirect::to(POST_LOGIN_REDIRECT).into_response()
        }
        Err(error) => failure_response(&error),
    }
}

/// Load the browser's session from its cookie, or start a guest session.
async fn load_or_create_session(
    state: &SsoState,
    cookies: &Cookies,
) -> Result<Session, SsoError> {
    if let Some(cookie) = cookies.get(&state.cookie.cookie_name) {
        if let Some(session) = state.sessions.load_session(cookie.value()).await? {
            return Ok(session);
        }
    }
    let ttl = state
        .cookie
        .max_age
        .unwrap_or_else(|| chrono::Duration::hours(24));
    Ok(Session::guest(ttl))
}

fn to_cookie_same_site(same_site: SameSite) -> tower_cookies::cookie::SameSite {
    match same_site {
        SameSite::Lax => tower_cookies::cookie::SameSite::Lax,
        SameSite::Strict => tower_cookies::cookie::SameSite::Strict,
        SameSite::None => tower_cookies::cookie::SameSite::None,
    }
}

fn session_cookie(config: &SessionCookieConfig, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(config.cookie_name.clone(), value);
    cookie.set_path(config.path.clone());
    cookie.set_secure(config.secure);
    cookie.set_http_only(config.http_only);
    cookie.set_same_site(to_cookie_same_site(config.same_site));
    if let Some(max_age) = config.max_age {
        cookie.set_max_age(tower_cookies::cookie::time::Duration::seconds(
            max_age.num_seconds(),
        ));
    }
    cookie
}

fn failure_response(error: &SsoError) -> Response {
    if error.is_configuration() {
        // Configuration failures are an operator problem, not a bad link.
        log::error!("sso is misconfigured: {error}");
        (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE).into_response()
    } else {
        log::warn!("sso login attempt failed: {error}");
        (StatusCode::BAD_REQUEST, GENERIC_FAILURE).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_failures_map_to_server_errors() {
        let response = failure_response(&SsoError::Configuration("OIDC_CLIENT_ID"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn all_other_failures_collapse_to_a_generic_bad_request() {
        for error in [
            SsoError::ProviderDenied("denied".to_string()),
            SsoError::ReplayOrForgery,
            SsoError::TokenExchange("boom".to_string()),
            SsoError::ClaimsFetch("boom".to_string()),
            SsoError::IncompleteClaims("email"),
        ] {
            let response = failure_response(&error);
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn session_cookie_carries_the_configured_attributes() {
        let config = SessionCookieConfig::default();
        let cookie = session_cookie(&config, "sess-1".to_string());

        assert_eq!(cookie.name(), "ssokit_session");
        assert_eq!(cookie.value(), "sess-1");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(
            cookie.same_site(),
            Some(tower_cookies::cookie::SameSite::Lax)
        );
        assert_eq!(
            cookie.max_age(),
            Some(tower_cookies::cookie::time::Duration::hours(24))
        );
    }
}
