use crate::config::toml_config::{ChatSettings, ImageSettings};
use crate::domain::model::ChatMessage;
use crate::domain::ports::LanguageModel;
use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const IMAGE_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    n: u8,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
    url: Option<String>,
}

/// Chat completions and image generation over the OpenAI REST API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    image_model: String,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let chat = ChatSettings::default();
        let image = ImageSettings::default();
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            chat_model: chat.model,
            image_model: image.model,
        }
    }

    pub fn with_models(mut self, chat_model: impl Into<String>, image_model: impl Into<String>) -> Self {
        self.chat_model = chat_model.into();
        self.image_model = image_model.into();
        self
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).bearer_auth(&self.api_key).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("OpenAI {} failed: status_code={} response body={}", path, status, body);
            return Err(BotError::upstream("openai", status, body));
        }
        Ok(response)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).timeout(IMAGE_TIMEOUT).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::upstream("image download", status, body));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.chat_model,
            messages,
            temperature,
        };
        let response: ChatCompletionResponse = self
            .post_json("/chat/completions", &request, None)
            .await?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| BotError::ProcessingError {
                message: "chat completion returned no content".to_string(),
            })
    }

    async fn generate_image(&self, prompt: &str, size: &str) -> Result<Vec<u8>> {
        let request = ImageRequest {
            model: &self.image_model,
            prompt,
            size,
            n: 1,
        };
        let response: ImageResponse = self
            .post_json("/images/generations", &request, Some(IMAGE_TIMEOUT))
            .await?
            .json()
            .await?;

        let image = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| BotError::ProcessingError {
                message: "image generation returned no data".to_string(),
            })?;

        match (image.b64_json, image.url) {
            (Some(b64), _) => STANDARD.decode(b64.trim()).map_err(|e| BotError::ProcessingError {
                message: format!("invalid base64 image payload: {}", e),
            }),
            (None, Some(url)) => self.download(&url).await,
            (None, None) => Err(BotError::ProcessingError {
                message: "image generation returned neither b64_json nor url".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_chat_returns_trimmed_content() {
        let server = MockServer::start();
        let chat_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer sk-test")
                .json_body_partial(r#"{"model": "gpt-4o-mini", "temperature": 0.5}"#);
            then.status(200).json_body(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "  1. 森林\n2. 城堡 \n"}}]
            }));
        });

        let client = OpenAiClient::new(server.base_url(), "sk-test");
        let content = client
            .chat(&[ChatMessage::user("故事")], 0.5)
            .await
            .unwrap();

        chat_mock.assert();
        assert_eq!(content, "1. 森林\n2. 城堡");
    }

    #[tokio::test]
    async fn test_chat_error_status_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(429)
                .json_body(serde_json::json!({"error": {"message": "Rate limit reached"}}));
        });

        let client = OpenAiClient::new(server.base_url(), "sk-test");
        let err = client.chat(&[ChatMessage::user("hi")], 0.5).await.unwrap_err();

        assert!(matches!(err, BotError::UpstreamError { status: 429, .. }));
        assert!(err.to_string().contains("Rate limit reached"));
    }

    #[tokio::test]
    async fn test_generate_image_decodes_b64() {
        let server = MockServer::start();
        let png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a];
        let image_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/images/generations")
                .json_body_partial(r#"{"model": "gpt-image-1", "size": "1024x1024"}"#);
            then.status(200).json_body(serde_json::json!({
                "created": 1,
                "data": [{"b64_json": STANDARD.encode(&png)}]
            }));
        });

        let client = OpenAiClient::new(server.base_url(), "sk-test");
        let bytes = client.generate_image("a fox", "1024x1024").await.unwrap();

        image_mock.assert();
        assert_eq!(bytes, png);
    }

    #[tokio::test]
    async fn test_generate_image_downloads_url_payload() {
        let server = MockServer::start();
        let image_url = server.url("/files/fox.png");
        server.mock(|when, then| {
            when.method(POST).path("/images/generations");
            then.status(200)
                .json_body(serde_json::json!({"data": [{"url": image_url}]}));
        });
        let download_mock = server.mock(|when, then| {
            when.method(GET).path("/files/fox.png");
            then.status(200).body(b"png-bytes".as_slice());
        });

        let client = OpenAiClient::new(server.base_url(), "sk-test");
        let bytes = client.generate_image("a fox", "1024x1024").await.unwrap();

        download_mock.assert();
        assert_eq!(bytes, b"png-bytes");
    }

    #[tokio::test]
    async fn test_generate_image_empty_data_is_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/images/generations");
            then.status(200).json_body(serde_json::json!({"data": []}));
        });

        let client = OpenAiClient::new(server.base_url(), "sk-test").with_models("m", "img");
        assert!(client.generate_image("a fox", "1024x1024").await.is_err());
    }
}
