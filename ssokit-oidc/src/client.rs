use crate::discovery::ProviderMetadata;
use serde::Deserialize;
use ssokit_core::{SsoConfig, SsoError};
use std::time::Duration;
use url::Url;

/// Scopes requested for every login attempt.
const SCOPES: &str = "openid email profile";

/// A shared HTTP client with a bounded per-call timeout, so a stalled
/// provider surfaces as the corresponding step's error instead of hanging
/// the login attempt.
pub fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_default()
}

/// Result of the code-for-token exchange.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenSet {
    /// The access token. Its absence is terminal for the flow.
    pub access_token: Option<String>,
    /// ID token, when the provider issues one.
    #[serde(default)]
    pub id_token: Option<String>,
    /// Token type, usually `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl TokenSet {
    /// The access token, or [`SsoError::TokenExchange`] if the provider did
    /// not return one.
    pub fn require_access_token(&self) -> Result<&str, SsoError> {
        self.access_token.as_deref().ok_or_else(|| {
            SsoError::TokenExchange("provider returned no access token".to_string())
        })
    }
}

/// Error body the token endpoint returns on failure.
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Identity claims asserted by the provider's userinfo endpoint.
///
/// Completeness (email and name both present) is the flow's responsibility,
/// not the wire layer's.
#[derive(Clone, Debug, Deserialize)]
pub struct UserClaims {
    /// Provider-side subject identifier.
    #[serde(default)]
    pub sub: Option<String>,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// A configured protocol client bound to one provider.
///
/// Immutable once constructed; cheap to reconstruct per request since the
/// discovery round trip is cached separately.
#[derive(Clone, Debug)]
pub struct OidcClient {
    metadata: ProviderMetadata,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    http: reqwest::Client,
}

impl OidcClient {
    /// Bind discovered metadata to the configured client credentials and
    /// callback redirect URI. Only the authorization-code response type is
    /// ever requested.
    pub fn new(
        metadata: ProviderMetadata,
        config: &SsoConfig,
        http: reqwest::Client,
    ) -> Result<Self, SsoError> {
        Ok(Self {
            metadata,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri()?,
            http,
        })
    }

    /// The provider metadata this client was constructed from.
    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    /// The callback redirect URI this client sends on every request.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Build the provider's authorization URL for a fresh login attempt.
    pub fn authorization_url(&self, state: &str, nonce: &str) -> Result<String, SsoError> {
        let mut url = Url::parse(&self.metadata.authorization_endpoint)
            .map_err(|e| SsoError::Discovery(format!("invalid authorization endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", SCOPES)
            .append_pair("state", state)
            .append_pair("nonce", nonce);
        Ok(url.to_string())
    }

    /// Exchange an authorization code for a token set.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, SsoError> {
        let response = self
            .http
            .post(&self.metadata.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.redirect_uri),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
            ])
            .send()
            .await
            .map_err(|e| SsoError::TokenExchange(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = match response.json::<TokenErrorBody>().await {
                Ok(body) => body
                    .error_description
                    .unwrap_or(body.error),
                Err(_) => format!("token endpoint returned status {status}"),
            };
            return Err(SsoError::TokenExchange(detail));
        }

        response
            .json::<TokenSet>()
            .await
            .map_err(|e| SsoError::TokenExchange(e.to_string()))
    }

    /// Fetch the provider's claims about the authenticated subject.
    pub async fn userinfo(&self, access_token: &str) -> Result<UserClaims, SsoError> {
        let response = self
            .http
            .get(&self.metadata.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SsoError::ClaimsFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SsoError::ClaimsFetch(format!(
                "userinfo endpoint returned status {}",
                response.status()
            )));
        }

        response
            .json::<UserClaims>()
            .await
            .map_err(|e| SsoError::ClaimsFetch(e.to_string()))
    }
}
