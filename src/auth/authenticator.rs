//! Bearer token provider for BigQuery requests

use super::types::{AuthConfig, CachedToken};
use crate::error::{Error, Result};
use crate::types::JwtAlgorithm;
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Attaches an `Authorization: Bearer` header according to an [`AuthConfig`]
///
/// Service-account tokens are exchanged once and reused until shortly before
/// they expire. The cache lock is held across the exchange so concurrent
/// callers never trigger a second one.
pub struct Authenticator {
    config: AuthConfig,
    token: Mutex<Option<CachedToken>>,
    http_client: Client,
}

impl Authenticator {
    pub fn new(config: AuthConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Share an existing client (and its connection pool) for token exchange
    pub fn with_client(config: AuthConfig, http_client: Client) -> Self {
        Self {
            config,
            token: Mutex::new(None),
            http_client,
        }
    }

    pub async fn apply(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self.bearer_token().await? {
            Some(token) => req.bearer_auth(token),
            None => req,
        })
    }

    /// Drop the cached exchanged token
    pub async fn clear_cache(&self) {
        *self.token.lock().await = None;
    }

    async fn bearer_token(&self) -> Result<Option<String>> {
        let AuthConfig::ServiceAccount {
            client_email,
            private_key,
            token_uri,
            scopes,
            algorithm,
            token_lifetime_seconds,
        } = &self.config
        else {
            return Ok(match &self.config {
                AuthConfig::Bearer { token } => Some(token.clone()),
                _ => None,
            });
        };

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(Some(token.token.clone()));
        }

        let assertion = Assertion::new(client_email, token_uri, scopes, *token_lifetime_seconds)
            .sign(private_key, *algorithm)?;
        let fresh = self.exchange(token_uri, &assertion).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(Some(token))
    }

    async fn exchange(&self, token_uri: &str, assertion: &str) -> Result<CachedToken> {
        debug!("Exchanging service account assertion at {}", token_uri);

        let response = self
            .http_client
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::auth(format!(
                "Token exchange failed with status {}: {body}",
                status.as_u16()
            )));
        }

        let TokenResponse {
            access_token,
            expires_in,
        } = response.json().await?;
        Ok(match expires_in {
            Some(secs) => CachedToken::expires_in(access_token, secs),
            None => CachedToken::new(access_token, None),
        })
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("auth", &self.config.label())
            .finish_non_exhaustive()
    }
}

/// Claims of a Google service-account JWT assertion
#[derive(Debug, Serialize)]
struct Assertion {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

impl Assertion {
    fn new(client_email: &str, token_uri: &str, scopes: &[String], lifetime_seconds: u64) -> Self {
        let iat = Utc::now().timestamp();
        Self {
            iss: client_email.to_string(),
            scope: scopes.join(" "),
            aud: token_uri.to_string(),
            iat,
            exp: iat + lifetime_seconds as i64,
        }
    }

    fn sign(&self, private_key_pem: &str, algorithm: JwtAlgorithm) -> Result<String> {
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| Error::auth(format!("Invalid private key: {e}")))?;
        jsonwebtoken::encode(&Header::new(algorithm.into()), self, &key)
            .map_err(|e| Error::auth(format!("Failed to encode JWT: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}
