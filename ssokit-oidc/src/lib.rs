//! # Ssokit OIDC
//!
//! OpenID Connect provider client for the ssokit single-sign-on subsystem:
//! discovery of the provider's metadata, the Authorization-Code protocol
//! client (authorization URL, code exchange, userinfo), and ID-token nonce
//! verification against the provider's JWKS.

pub mod client;
pub mod discovery;
pub mod verify;

pub use client::{default_http_client, OidcClient, TokenSet, UserClaims};
pub use discovery::{DiscoveryCache, ProviderMetadata};
pub use verify::verify_id_token;
