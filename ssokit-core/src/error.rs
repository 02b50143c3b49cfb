/// Error kinds for the sign-on flow.
///
/// Every kind is terminal for the current login attempt; nothing is retried
/// automatically. The web layer collapses all of them into one generic
/// user-visible failure, keeping only operator-facing logs distinguishable.
#[derive(Debug, thiserror::Error)]
pub enum SsoError {
    /// A required SSO setting is unset. Fatal for the whole feature until an
    /// operator fixes the configuration.
    #[error("Missing SSO configuration: {0}")]
    Configuration(&'static str),
    /// The provider returned an error instead of an authorization code.
    #[error("Provider denied the authorization request: {0}")]
    ProviderDenied(String),
    /// The returned state does not match any active login attempt, or the
    /// attempt expired. Covers replayed and forged callbacks.
    #[error("State does not match an active login attempt")]
    ReplayOrForgery,
    /// Fetching or parsing the provider's discovery document failed.
    #[error("OIDC discovery failed: {0}")]
    Discovery(String),
    /// The code-for-token exchange failed or returned no usable access token.
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    /// The userinfo call failed.
    #[error("Claims fetch failed: {0}")]
    ClaimsFetch(String),
    /// The userinfo response is missing a mandatory claim.
    #[error("Provider claims missing required field: {0}")]
    IncompleteClaims(&'static str),
    /// Account store error.
    #[error("Account store error: {0}")]
    Account(String),
    /// Session store error.
    #[error("Session store error: {0}")]
    Session(String),
}

impl SsoError {
    /// Whether this failure should be surfaced to operators as a deployment
    /// problem rather than a bad or expired login attempt.
    pub fn is_configuration(&self) -> bool {
        matches!(self, SsoError::Configuration(_))
    }
}
