use axum::{response::IntoResponse, routing::get, Router};
use ssokit_axum::{router, SessionCookieConfig, SsoState};
use ssokit_core::{MemoryAccountStore, MemorySessionStore, SsoConfig};
use ssokit_flow::SsoFlow;
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Expects OIDC_DISCOVERY_URL, OIDC_CLIENT_ID, OIDC_CLIENT_SECRET and
    // BASE_URL; each operation fails with a configuration error until all
    // four are set.
    let config = SsoConfig::from_env();

    let flow = SsoFlow::new(
        config,
        Arc::new(MemoryAccountStore::default()),
        Arc::new(MemorySessionStore::default()),
    );

    let state = SsoState::new(
        flow,
        SessionCookieConfig {
            secure: false, // local demo over plain http
            ..Default::default()
        },
    );

    let app = Router::new()
        .route("/", get(index))
        .route("/profile", get(profile))
        .merge(router(state))
        .layer(CookieManagerLayer::new());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    println!("Listening on http://0.0.0.0:3000");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index() -> impl IntoResponse {
    "Welcome! Go to /auth/sso_login to sign in."
}

async fn profile() -> impl IntoResponse {
    "You are signed in."
}
