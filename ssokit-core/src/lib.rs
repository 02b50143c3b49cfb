//! # Ssokit Core
//!
//! `ssokit-core` provides the foundational types and ports for the ssokit
//! single-sign-on subsystem: the error taxonomy, the SSO provider
//! configuration, and the account/session stores the login flow depends on.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

/// Errors that can occur during the sign-on process.
pub mod error;
pub use crate::error::SsoError;

/// Static SSO provider settings.
pub mod config;
pub use crate::config::SsoConfig;

/// Local accounts and the account store port.
pub mod account;
pub use crate::account::{Account, AccountStore, AuthenticatedUser, MemoryAccountStore};

/// Server-side sessions and the session store port.
pub mod session;
pub use crate::session::{MemorySessionStore, Session, SessionStore, SessionUser};

/// Controls whether a cookie is sent with cross-site requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    /// The cookie is sent with "safe" cross-site requests (e.g., following a link).
    Lax,
    /// The cookie is only sent for same-site requests.
    Strict,
    /// The cookie is sent with all requests, including cross-site. Requires `Secure`.
    None,
}
