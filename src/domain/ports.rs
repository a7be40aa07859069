use crate::domain::model::{ChatMessage, ReplyMessage, Role};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Durable record of conversations and the latest story summary.
#[async_trait]
pub trait StoryStore: Send + Sync {
    async fn save_chat(&self, user_id: &str, role: Role, text: &str) -> Result<()>;
    async fn save_story_summary(&self, user_id: &str, paragraphs: &[String]) -> Result<()>;
    async fn load_latest_paragraphs(&self, user_id: &str) -> Result<Option<Vec<String>>>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<String>;
    /// Returns encoded PNG bytes.
    async fn generate_image(&self, prompt: &str, size: &str) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Stores `data` under `object` and returns a time-limited GET URL.
    async fn upload_signed(
        &self,
        object: &str,
        data: Vec<u8>,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String>;
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn reply(&self, reply_token: &str, messages: &[ReplyMessage]) -> Result<()>;
}
