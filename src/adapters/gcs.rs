use crate::adapters::google_auth::GoogleCredentials;
use crate::domain::ports::ImageStorage;
use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_STORAGE_URL: &str = "https://storage.googleapis.com";
const SIGNING_HOST: &str = "storage.googleapis.com";
const SIGNING_ALGORITHM: &str = "GOOG4-RSA-SHA256";
const MAX_SIGNED_URL_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// RFC 3986 unreserved characters stay literal.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const PATH_ENCODE_SET: &AsciiSet = &QUERY_ENCODE_SET.remove(b'/');

fn encode_query(value: &str) -> String {
    utf8_percent_encode(value, QUERY_ENCODE_SET).to_string()
}

fn encode_path(value: &str) -> String {
    utf8_percent_encode(value, PATH_ENCODE_SET).to_string()
}

/// The parts of a V4 signed GET URL that exist before the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V4SigningInput {
    pub resource: String,
    pub canonical_query: String,
    pub canonical_request: String,
    pub string_to_sign: String,
}

pub fn v4_signing_input(
    bucket: &str,
    object: &str,
    email: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> V4SigningInput {
    let ttl = ttl.min(MAX_SIGNED_URL_TTL);
    let datestamp = now.format("%Y%m%d").to_string();
    let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
    let credential_scope = format!("{}/auto/storage/goog4_request", datestamp);
    let credential = format!("{}/{}", email, credential_scope);
    let resource = format!("/{}/{}", bucket, encode_path(object));

    // parameter names are already in sorted order
    let params = [
        ("X-Goog-Algorithm", SIGNING_ALGORITHM.to_string()),
        ("X-Goog-Credential", credential),
        ("X-Goog-Date", timestamp.clone()),
        ("X-Goog-Expires", ttl.as_secs().to_string()),
        ("X-Goog-SignedHeaders", "host".to_string()),
    ];
    let canonical_query = params
        .iter()
        .map(|(k, v)| format!("{}={}", encode_query(k), encode_query(v)))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_request = format!(
        "GET\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
        resource, canonical_query, SIGNING_HOST
    );
    let request_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        SIGNING_ALGORITHM, timestamp, credential_scope, request_hash
    );

    V4SigningInput {
        resource,
        canonical_query,
        canonical_request,
        string_to_sign,
    }
}

/// Cloud Storage bucket client: media uploads and V4 signed GET URLs.
pub struct GcsStorage {
    client: Client,
    base_url: String,
    bucket: String,
    credentials: Arc<dyn GoogleCredentials>,
}

impl GcsStorage {
    pub fn new(bucket: impl Into<String>, credentials: Arc<dyn GoogleCredentials>) -> Self {
        Self::with_base_url(DEFAULT_STORAGE_URL, bucket, credentials)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        credentials: Arc<dyn GoogleCredentials>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            credentials,
        }
    }

    pub async fn upload(&self, object: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        let token = self.credentials.access_token().await?;
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.base_url,
            encode_query(&self.bucket),
            encode_query(object)
        );

        tracing::debug!("Uploading {} bytes to gs://{}/{}", data.len(), self.bucket, object);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::upstream("gcs", status, body));
        }
        Ok(())
    }

    pub async fn signed_url(&self, object: &str, ttl: Duration) -> Result<String> {
        let email = self.credentials.service_account_email().await?;
        let input = v4_signing_input(&self.bucket, object, &email, ttl, Utc::now());
        let signature = self
            .credentials
            .sign_blob(input.string_to_sign.as_bytes())
            .await?;

        Ok(format!(
            "https://{}{}?{}&X-Goog-Signature={}",
            SIGNING_HOST,
            input.resource,
            input.canonical_query,
            hex::encode(signature)
        ))
    }
}

#[async_trait]
impl ImageStorage for GcsStorage {
    async fn upload_signed(
        &self,
        object: &str,
        data: Vec<u8>,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String> {
        self.upload(object, data, content_type).await?;
        self.signed_url(object, ttl).await
    }
}
