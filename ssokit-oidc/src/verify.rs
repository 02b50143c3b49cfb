use crate::discovery::ProviderMetadata;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use ssokit_core::SsoError;

/// A single key from the provider's JWKS.
#[derive(Clone, Debug, Deserialize)]
pub struct Jwk {
    /// Key id, matched against the ID token header.
    pub kid: Option<String>,
    /// Key type; only RSA keys are supported.
    pub kty: String,
    /// RSA modulus.
    pub n: Option<String>,
    /// RSA exponent.
    pub e: Option<String>,
}

impl Jwk {
    fn to_decoding_key(&self) -> Result<DecodingKey, SsoError> {
        if self.kty != "RSA" {
            return Err(SsoError::TokenExchange(format!(
                "unsupported JWK key type {}",
                self.kty
            )));
        }
        let n = self
            .n
            .as_ref()
            .ok_or_else(|| SsoError::TokenExchange("JWK missing 'n' component".to_string()))?;
        let e = self
            .e
            .as_ref()
            .ok_or_else(|| SsoError::TokenExchange("JWK missing 'e' component".to_string()))?;
        DecodingKey::from_rsa_components(n, e)
            .map_err(|e| SsoError::TokenExchange(e.to_string()))
    }
}

/// The provider's published key set.
#[derive(Clone, Debug, Deserialize)]
pub struct Jwks {
    /// The keys, in provider order.
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Fetch the key set from the provider.
    pub async fn fetch(jwks_uri: &str, client: &reqwest::Client) -> Result<Self, SsoError> {
        let response = client
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| SsoError::TokenExchange(e.to_string()))?;
        response
            .json::<Jwks>()
            .await
            .map_err(|e| SsoError::TokenExchange(e.to_string()))
    }

    /// Select the key matching `kid`, falling back to the first key when the
    /// token header carries none.
    pub fn find_key(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(id) => self.keys.iter().find(|k| k.kid.as_deref() == Some(id)),
            None => self.keys.first(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    #[serde(default)]
    nonce: Option<String>,
}

/// Verify an ID token's signature, issuer and audience against the provider,
/// then check that its nonce matches the one issued for this attempt.
///
/// A nonce mismatch is a replay, so it maps to [`SsoError::ReplayOrForgery`];
/// every other failure belongs to the exchange step.
pub async fn verify_id_token(
    id_token: &str,
    metadata: &ProviderMetadata,
    client_id: &str,
    expected_nonce: &str,
    http: &reqwest::Client,
) -> Result<(), SsoError> {
    let jwks_uri = metadata.jwks_uri.as_deref().ok_or_else(|| {
        SsoError::TokenExchange("provider metadata has no jwks_uri".to_string())
    })?;

    let header =
        decode_header(id_token).map_err(|e| SsoError::TokenExchange(e.to_string()))?;
    let jwks = Jwks::fetch(jwks_uri, http).await?;
    let jwk = jwks.find_key(header.kid.as_deref()).ok_or_else(|| {
        SsoError::TokenExchange("no matching key found in JWKS".to_string())
    })?;
    let decoding_key = jwk.to_decoding_key()?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(std::slice::from_ref(&metadata.issuer));
    validation.set_audience(&[client_id]);

    let token_data = decode::<IdTokenClaims>(id_token, &decoding_key, &validation)
        .map_err(|e| SsoError::TokenExchange(format!("ID token validation failed: {e}")))?;

    match token_data.claims.nonce.as_deref() {
        Some(nonce) if nonce == expected_nonce => Ok(()),
        _ => Err(SsoError::ReplayOrForgery),
    }
}
