use crate::error::SsoError;
use url::Url;

/// Path of the callback route, relative to the application base URL.
pub const CALLBACK_PATH: &str = "auth/sso_callback";

/// Static SSO settings for a single OIDC provider.
///
/// All four values must be present before any protocol operation runs;
/// absence is a configuration error, not a runtime one.
#[derive(Clone, Debug, Default)]
pub struct SsoConfig {
    /// Base issuer URL for OIDC discovery.
    pub discovery_url: String,
    /// Registered client identifier.
    pub client_id: String,
    /// Registered client secret.
    pub client_secret: String,
    /// Application base URL, used to construct the callback redirect URI.
    pub base_url: String,
}

impl SsoConfig {
    /// Create a config from explicit values.
    pub fn new(
        discovery_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            discovery_url: discovery_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: base_url.into(),
        }
    }

    /// Read the config from `OIDC_DISCOVERY_URL`, `OIDC_CLIENT_ID`,
    /// `OIDC_CLIENT_SECRET` and `BASE_URL`.
    ///
    /// Unset variables are left empty here so the feature can be wired up
    /// unconditionally; [`SsoConfig::ensure_complete`] gates every operation.
    pub fn from_env() -> Self {
        Self {
            discovery_url: std::env::var("OIDC_DISCOVERY_URL").unwrap_or_default(),
            client_id: std::env::var("OIDC_CLIENT_ID").unwrap_or_default(),
            client_secret: std::env::var("OIDC_CLIENT_SECRET").unwrap_or_default(),
            base_url: std::env::var("BASE_URL").unwrap_or_default(),
        }
    }

    /// Fail with [`SsoError::Configuration`] naming the first missing setting.
    pub fn ensure_complete(&self) -> Result<(), SsoError> {
        if self.discovery_url.is_empty() {
            return Err(SsoError::Configuration("OIDC_DISCOVERY_URL"));
        }
        if self.client_id.is_empty() {
            return Err(SsoError::Configuration("OIDC_CLIENT_ID"));
        }
        if self.client_secret.is_empty() {
            return Err(SsoError::Configuration("OIDC_CLIENT_SECRET"));
        }
        if self.base_url.is_empty() {
            return Err(SsoError::Configuration("BASE_URL"));
        }
        Ok(())
    }

    /// The fixed callback redirect URI, `<base>/auth/sso_callback`.
    pub fn redirect_uri(&self) -> Result<String, SsoError> {
        let base = Url::parse(&self.base_url)
            .map_err(|_| SsoError::Configuration("BASE_URL"))?;
        let url = base
            .join(CALLBACK_PATH)
            .map_err(|_| SsoError::Configuration("BASE_URL"))?;
        Ok(url.to_string())
    }
}
