use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_METADATA_URL: &str = "http://metadata.google.internal";
pub const DEFAULT_IAM_CREDENTIALS_URL: &str = "https://iamcredentials.googleapis.com";

const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Access tokens and RSA-SHA256 signatures on behalf of one service account.
#[async_trait]
pub trait GoogleCredentials: Send + Sync {
    async fn access_token(&self) -> Result<String>;
    async fn service_account_email(&self) -> Result<String>;
    async fn sign_blob(&self, data: &[u8]) -> Result<Vec<u8>>;
    async fn project_id(&self) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    refresh_at: Instant,
}

#[derive(Debug, Default)]
struct TokenCache {
    inner: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<TokenResponse>>,
    {
        let mut cached = self.inner.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.token.clone());
            }
        }

        let response = fetch().await?;
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(REFRESH_MARGIN);
        *cached = Some(CachedToken {
            token: response.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(response.access_token)
    }
}

fn auth_error(message: impl Into<String>) -> BotError {
    BotError::AuthError {
        message: message.into(),
    }
}

#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Credentials from a service account key (JWT bearer grant).
pub struct ServiceAccountCredentials {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: Client,
    cache: TokenCache,
}

impl ServiceAccountCredentials {
    pub fn from_json(json: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(json)?;
        Self::new(key)
    }

    pub fn new(key: ServiceAccountKey) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| auth_error(format!("invalid service account private key: {}", e)))?;
        Ok(Self {
            key,
            encoding_key,
            client: Client::new(),
            cache: TokenCache::default(),
        })
    }

    fn assertion(&self) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| auth_error(format!("failed to sign JWT assertion: {}", e)))
    }

    async fn fetch_token(&self) -> Result<TokenResponse> {
        let assertion = self.assertion()?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::upstream("oauth2", status, body));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl GoogleCredentials for ServiceAccountCredentials {
    async fn access_token(&self) -> Result<String> {
        self.cache.get_or_fetch(|| self.fetch_token()).await
    }

    async fn service_account_email(&self) -> Result<String> {
        Ok(self.key.client_email.clone())
    }

    async fn sign_blob(&self, data: &[u8]) -> Result<Vec<u8>> {
        let signature = jsonwebtoken::crypto::sign(data, &self.encoding_key, Algorithm::RS256)
            .map_err(|e| auth_error(format!("failed to sign blob: {}", e)))?;
        URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|e| auth_error(format!("malformed signature encoding: {}", e)))
    }

    async fn project_id(&self) -> Option<String> {
        self.key.project_id.clone()
    }
}

#[derive(Debug, Serialize)]
struct SignBlobRequest {
    payload: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignBlobResponse {
    signed_blob: String,
}

/// Application default credentials of the runtime service account, read
/// from the metadata server. Signing goes through the IAM Credentials API.
pub struct MetadataCredentials {
    metadata_url: String,
    iam_url: String,
    client: Client,
    cache: TokenCache,
    email: Mutex<Option<String>>,
}

impl MetadataCredentials {
    pub fn new(metadata_url: impl Into<String>, iam_url: impl Into<String>) -> Self {
        Self {
            metadata_url: metadata_url.into().trim_end_matches('/').to_string(),
            iam_url: iam_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            cache: TokenCache::default(),
            email: Mutex::new(None),
        }
    }

    async fn metadata(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}/computeMetadata/v1/{}", self.metadata_url, path);
        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(5))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::upstream("metadata", status, body));
        }
        Ok(response)
    }

    async fn fetch_token(&self) -> Result<TokenResponse> {
        Ok(self
            .metadata("instance/service-accounts/default/token")
            .await?
            .json()
            .await?)
    }
}

impl Default for MetadataCredentials {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_URL, DEFAULT_IAM_CREDENTIALS_URL)
    }
}

#[async_trait]
impl GoogleCredentials for MetadataCredentials {
    async fn access_token(&self) -> Result<String> {
        self.cache.get_or_fetch(|| self.fetch_token()).await
    }

    async fn service_account_email(&self) -> Result<String> {
        let mut email = self.email.lock().await;
        if let Some(email) = email.as_ref() {
            return Ok(email.clone());
        }
        let fetched = self
            .metadata("instance/service-accounts/default/email")
            .await?
            .text()
            .await?
            .trim()
            .to_string();
        *email = Some(fetched.clone());
        Ok(fetched)
    }

    async fn sign_blob(&self, data: &[u8]) -> Result<Vec<u8>> {
        let email = self.service_account_email().await?;
        let token = self.access_token().await?;
        let url = format!(
            "{}/v1/projects/-/serviceAccounts/{}:signBlob",
            self.iam_url, email
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&SignBlobRequest {
                payload: STANDARD.encode(data),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::upstream("iamcredentials", status, body));
        }

        let signed: SignBlobResponse = response.json().await?;
        STANDARD
            .decode(signed.signed_blob)
            .map_err(|e| auth_error(format!("malformed signedBlob: {}", e)))
    }

    async fn project_id(&self) -> Option<String> {
        match self.metadata("project/project-id").await {
            Ok(response) => response.text().await.ok().map(|p| p.trim().to_string()),
            Err(e) => {
                tracing::debug!("project id unavailable from metadata server: {}", e);
                None
            }
        }
    }
}

/// Inline service account JSON when it parses, otherwise the metadata
/// server.
pub fn resolve_credentials(inline_json: Option<&str>) -> Arc<dyn GoogleCredentials> {
    if let Some(json) = inline_json.filter(|j| !j.trim().is_empty()) {
        match ServiceAccountCredentials::from_json(json) {
            Ok(credentials) => {
                tracing::info!("✅ Google credentials: using inline service account JSON");
                return Arc::new(credentials);
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ FIREBASE_CREDENTIALS present but invalid: {}. Fallback to application default credentials",
                    e
                );
            }
        }
    }
    tracing::info!("✅ Google credentials: using application default credentials");
    Arc::new(MetadataCredentials::default())
}
