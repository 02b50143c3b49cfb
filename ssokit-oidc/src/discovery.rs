use serde::Deserialize;
use ssokit_core::SsoError;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// The subset of the provider's discovery document the flow needs.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier, also the expected `iss` of ID tokens.
    pub issuer: String,
    /// Where the browser is redirected to authorize.
    pub authorization_endpoint: String,
    /// Where the authorization code is exchanged for tokens.
    pub token_endpoint: String,
    /// Where claims about the authenticated subject are fetched.
    pub userinfo_endpoint: String,
    /// Key set for ID-token signature verification, when published.
    #[serde(default)]
    pub jwks_uri: Option<String>,
}

/// Resolve the discovery document URL from the configured issuer URL.
///
/// Appends `/.well-known/openid-configuration` unless the configured URL
/// already points at a well-known document.
pub fn discovery_document_url(discovery_url: &str) -> String {
    if discovery_url.contains(".well-known") {
        discovery_url.to_string()
    } else {
        format!(
            "{}/.well-known/openid-configuration",
            discovery_url.trim_end_matches('/')
        )
    }
}

impl ProviderMetadata {
    /// Fetch the provider's metadata from its discovery endpoint.
    pub async fn discover(
        discovery_url: &str,
        client: &reqwest::Client,
    ) -> Result<Self, SsoError> {
        let url = discovery_document_url(discovery_url);
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| SsoError::Discovery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SsoError::Discovery(format!(
                "discovery endpoint returned status {}",
                response.status()
            )));
        }

        response
            .json::<ProviderMetadata>()
            .await
            .map_err(|e| SsoError::Discovery(e.to_string()))
    }
}

/// Time-bounded cache of the provider's discovery result.
///
/// Caching is an allowed optimization, not a correctness requirement: every
/// operation works against a cold cache, and entries are refetched once the
/// TTL elapses.
pub struct DiscoveryCache {
    http: reqwest::Client,
    ttl: Duration,
    cached: RwLock<Option<(ProviderMetadata, Instant)>>,
}

impl DiscoveryCache {
    /// Create a cache with the default 1 hour TTL.
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            ttl: Duration::from_secs(3600),
            cached: RwLock::new(None),
        }
    }

    /// Override the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Return the cached metadata, discovering it if absent or stale.
    pub async fn get(&self, discovery_url: &str) -> Result<ProviderMetadata, SsoError> {
        {
            let read_guard = self.cached.read().await;
            if let Some((metadata, fetched_at)) = read_guard.as_ref() {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(metadata.clone());
                }
            }
        }

        let mut write_guard = self.cached.write().await;
        let metadata = ProviderMetadata::discover(discovery_url, &self.http).await?;
        *write_guard = Some((metadata.clone(), Instant::now()));
        Ok(metadata)
    }
}
