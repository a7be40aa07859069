use crate::adapters::google_auth::GoogleCredentials;
use crate::domain::model::Role;
use crate::domain::ports::StoryStore;
use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;

pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com";
const SUMMARY_DOCUMENT: &str = "latest_summary";

/// Random document id in the style of client-generated Firestore ids.
fn auto_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}

fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

/// Firestore REST client for `users/{uid}/chat` and
/// `users/{uid}/story/latest_summary`.
pub struct FirestoreStore {
    client: Client,
    base_url: String,
    project_id: String,
    credentials: Arc<dyn GoogleCredentials>,
}

impl FirestoreStore {
    pub fn new(project_id: impl Into<String>, credentials: Arc<dyn GoogleCredentials>) -> Self {
        Self::with_base_url(DEFAULT_FIRESTORE_URL, project_id, credentials)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        credentials: Arc<dyn GoogleCredentials>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            credentials,
        }
    }

    fn database(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }

    fn document_name(&self, path: &str) -> String {
        format!("{}/documents/{}", self.database(), path)
    }

    /// Writes `fields` to `path` (replacing the document) and stamps
    /// `timestamp_field` with the server commit time.
    async fn commit_set(&self, path: &str, fields: Value, timestamp_field: &str) -> Result<()> {
        let body = json!({
            "writes": [{
                "update": {
                    "name": self.document_name(path),
                    "fields": fields,
                },
                "updateTransforms": [{
                    "fieldPath": timestamp_field,
                    "setToServerValue": "REQUEST_TIME",
                }],
            }]
        });

        let url = format!("{}/v1/{}/documents:commit", self.base_url, self.database());
        let token = self.credentials.access_token().await?;
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::upstream("firestore", status, body));
        }
        Ok(())
    }
}

fn parse_paragraphs(document: &Value) -> Result<Vec<String>> {
    let values = document
        .pointer("/fields/paragraphs/arrayValue/values")
        .and_then(Value::as_array);

    let Some(values) = values else {
        // Firestore omits `values` for an empty array
        return Ok(Vec::new());
    };

    values
        .iter()
        .map(|v| {
            v.get("stringValue")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| BotError::ProcessingError {
                    message: format!("unexpected paragraph value: {}", v),
                })
        })
        .collect()
}

#[async_trait]
impl StoryStore for FirestoreStore {
    async fn save_chat(&self, user_id: &str, role: Role, text: &str) -> Result<()> {
        let path = format!("users/{}/chat/{}", user_id, auto_id());
        let fields = json!({
            "role": string_value(role.as_str()),
            "text": string_value(text),
        });
        self.commit_set(&path, fields, "timestamp").await
    }

    async fn save_story_summary(&self, user_id: &str, paragraphs: &[String]) -> Result<()> {
        let path = format!("users/{}/story/{}", user_id, SUMMARY_DOCUMENT);
        let values: Vec<Value> = paragraphs.iter().map(|p| string_value(p)).collect();
        let fields = json!({
            "paragraphs": { "arrayValue": { "values": values } },
        });
        self.commit_set(&path, fields, "updated_at").await
    }

    async fn load_latest_paragraphs(&self, user_id: &str) -> Result<Option<Vec<String>>> {
        let url = format!(
            "{}/v1/{}",
            self.base_url,
            self.document_name(&format!("users/{}/story/{}", user_id, SUMMARY_DOCUMENT))
        );
        let token = self.credentials.access_token().await?;
        let response = self.client.get(&url).bearer_auth(token).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::upstream("firestore", status, body));
        }

        let document: Value = response.json().await?;
        parse_paragraphs(&document).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    struct StaticCredentials;

    #[async_trait]
    impl GoogleCredentials for StaticCredentials {
        async fn access_token(&self) -> Result<String> {
            Ok("ya29.static".to_string())
        }

        async fn service_account_email(&self) -> Result<String> {
            Ok("bot@proj.iam.gserviceaccount.com".to_string())
        }

        async fn sign_blob(&self, data: &[u8]) -> Result<Vec<u8>> {
            Ok(data.to_vec())
        }

        async fn project_id(&self) -> Option<String> {
            Some("proj".to_string())
        }
    }

    fn store(server: &MockServer) -> FirestoreStore {
        FirestoreStore::with_base_url(server.base_url(), "proj", Arc::new(StaticCredentials))
    }

    const COMMIT_PATH: &str = "/v1/projects/proj/databases/(default)/documents:commit";

    #[test]
    fn test_auto_id_shape() {
        let id = auto_id();
        assert_eq!(id.len(), 20);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, auto_id());
    }

    #[tokio::test]
    async fn test_save_chat_commits_with_server_timestamp() {
        let server = MockServer::start();
        let commit_mock = server.mock(|when, then| {
            when.method(POST)
                .path(COMMIT_PATH)
                .header("authorization", "Bearer ya29.static")
                .body_contains("projects/proj/databases/(default)/documents/users/U1/chat/")
                .body_contains(r#""role":{"stringValue":"user"}"#)
                .body_contains(r#""text":{"stringValue":"小狐狸"}"#)
                .body_contains(r#""fieldPath":"timestamp""#)
                .body_contains(r#""setToServerValue":"REQUEST_TIME""#);
            then.status(200)
                .json_body(serde_json::json!({"commitTime": "2026-01-01T00:00:00Z"}));
        });

        store(&server).save_chat("U1", Role::User, "小狐狸").await.unwrap();
        commit_mock.assert();
    }

    #[tokio::test]
    async fn test_save_story_summary_writes_array() {
        let server = MockServer::start();
        let commit_mock = server.mock(|when, then| {
            when.method(POST)
                .path(COMMIT_PATH)
                .json_body(serde_json::json!({
                    "writes": [{
                        "update": {
                            "name": "projects/proj/databases/(default)/documents/users/U1/story/latest_summary",
                            "fields": {
                                "paragraphs": {"arrayValue": {"values": [
                                    {"stringValue": "森林"},
                                    {"stringValue": "城堡"}
                                ]}}
                            }
                        },
                        "updateTransforms": [{
                            "fieldPath": "updated_at",
                            "setToServerValue": "REQUEST_TIME"
                        }]
                    }]
                }));
            then.status(200).json_body(serde_json::json!({}));
        });

        store(&server)
            .save_story_summary("U1", &["森林".to_string(), "城堡".to_string()])
            .await
            .unwrap();
        commit_mock.assert();
    }

    #[tokio::test]
    async fn test_load_latest_paragraphs_returns_every_stored_paragraph() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(
                "/v1/projects/proj/databases/(default)/documents/users/U1/story/latest_summary",
            );
            then.status(200).json_body(serde_json::json!({
                "name": "projects/proj/databases/(default)/documents/users/U1/story/latest_summary",
                "fields": {
                    "paragraphs": {"arrayValue": {"values": [
                        {"stringValue": "1"}, {"stringValue": "2"}, {"stringValue": "3"},
                        {"stringValue": "4"}, {"stringValue": "5"}, {"stringValue": "6"}
                    ]}},
                    "updated_at": {"timestampValue": "2026-01-01T00:00:00Z"}
                }
            }));
        });

        let paragraphs = store(&server).load_latest_paragraphs("U1").await.unwrap();
        assert_eq!(
            paragraphs,
            Some(vec!["1", "2", "3", "4", "5", "6"].into_iter().map(String::from).collect())
        );
    }

    #[tokio::test]
    async fn test_load_missing_document_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path(
                "/v1/projects/proj/databases/(default)/documents/users/U2/story/latest_summary",
            );
            then.status(404)
                .json_body(serde_json::json!({"error": {"code": 404, "status": "NOT_FOUND"}}));
        });

        assert_eq!(store(&server).load_latest_paragraphs("U2").await.unwrap(), None);
    }

    #[test]
    fn test_parse_empty_array() {
        let document = serde_json::json!({"fields": {"paragraphs": {"arrayValue": {}}}});
        assert!(parse_paragraphs(&document).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_error_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(COMMIT_PATH);
            then.status(403).body("PERMISSION_DENIED");
        });

        let err = store(&server)
            .save_chat("U1", Role::Assistant, "引導")
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::UpstreamError { status: 403, .. }));
    }
}
