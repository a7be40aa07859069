use crate::config::BotSettings;
use crate::core::command::parse_command;
use crate::core::session::SessionStore;
use crate::core::story::{build_scene_prompt, extract_paragraphs, preview, PLACEHOLDER_SUMMARY};
use crate::domain::model::{ChatMessage, Command, ReplyMessage, Role, Session};
use crate::domain::ports::{ImageStorage, LanguageModel, Messenger, StoryStore};
use crate::utils::error::Result;
use std::sync::Arc;

pub const GUIDANCE_REPLY: &str = "我懂了！想再補充一點嗎？\n主角是誰？在哪裡？想發生什麼？";
pub const NEED_MORE_STORY_REPLY: &str = "我需要再多一點故事內容，才能開始畫喔～";
pub const IMAGE_FAILED_REPLY: &str = "圖片生成暫時失敗了，稍後再試一次可以嗎？";
pub const UPLOAD_FAILED_REPLY: &str = "上傳圖片時出了點狀況，等等再請我重畫一次～";
pub const DRAW_ERROR_REPLY: &str = "生成中遇到小狀況，等等再試一次可以嗎？";
const SUMMARY_DONE_PREFIX: &str = "✨ 故事總結完成：\n";

/// Drives one conversation turn: remembers the message, recognises the
/// command and answers through the messenger.
pub struct StoryBot {
    model: Arc<dyn LanguageModel>,
    images: Arc<dyn ImageStorage>,
    messenger: Arc<dyn Messenger>,
    store: Option<Arc<dyn StoryStore>>,
    sessions: SessionStore,
    settings: BotSettings,
}

impl StoryBot {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        images: Arc<dyn ImageStorage>,
        messenger: Arc<dyn Messenger>,
        store: Option<Arc<dyn StoryStore>>,
        settings: BotSettings,
    ) -> Self {
        Self {
            model,
            images,
            messenger,
            store,
            sessions: SessionStore::new(settings.story.max_history),
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[tracing::instrument(skip(self, reply_token, text))]
    pub async fn handle_text(&self, user_id: &str, reply_token: &str, text: &str) -> Result<()> {
        let text = text.trim();
        tracing::info!("📩 {}: {}", user_id, text);

        self.sessions
            .push_message(user_id, ChatMessage::user(text))
            .await;
        self.save_chat(user_id, Role::User, text).await;

        match parse_command(text) {
            Command::Summarize => self.summarize_and_reply(user_id, reply_token).await,
            Command::Draw { index, extra } => {
                self.draw_and_reply(user_id, reply_token, index, &extra).await;
                Ok(())
            }
            Command::Chat => {
                self.messenger
                    .reply(reply_token, &[ReplyMessage::text(GUIDANCE_REPLY)])
                    .await?;
                self.save_chat(user_id, Role::Assistant, "引導").await;
                Ok(())
            }
        }
    }

    async fn summarize_and_reply(&self, user_id: &str, reply_token: &str) -> Result<()> {
        let session = self.sessions.ensure(user_id).await;
        let recent = session.recent_user_texts(self.settings.story.summary_window);

        let summary = self
            .generate_story_summary(&recent)
            .await
            .unwrap_or_else(|| PLACEHOLDER_SUMMARY.to_string());
        let paragraphs = extract_paragraphs(&summary, self.settings.story.max_paragraphs);

        self.sessions
            .set_paragraphs(user_id, paragraphs.clone())
            .await;
        self.save_story_summary(user_id, &paragraphs).await;

        self.messenger
            .reply(
                reply_token,
                &[ReplyMessage::text(format!("{}{}", SUMMARY_DONE_PREFIX, summary))],
            )
            .await?;
        self.save_chat(user_id, Role::Assistant, &summary).await;
        Ok(())
    }

    /// Asks the model for a numbered five-part story. `None` when the model
    /// call fails or answers with nothing.
    async fn generate_story_summary(&self, user_texts: &[String]) -> Option<String> {
        let messages = [
            ChatMessage::system(self.settings.prompts.summary_system.clone()),
            ChatMessage::user(user_texts.join("\n")),
        ];

        match self
            .model
            .chat(&messages, self.settings.chat.temperature)
            .await
        {
            Ok(summary) if !summary.trim().is_empty() => Some(summary),
            Ok(_) => {
                tracing::warn!("⚠️ OpenAI chat returned an empty summary");
                None
            }
            Err(e) => {
                tracing::error!("❌ OpenAI chat error: {}", e);
                None
            }
        }
    }

    async fn draw_and_reply(&self, user_id: &str, reply_token: &str, index: usize, extra: &str) {
        if let Err(e) = self.try_draw(user_id, reply_token, index, extra).await {
            tracing::error!("❌ drawing paragraph {} failed: {}", index + 1, e);
            if let Err(reply_err) = self
                .messenger
                .reply(reply_token, &[ReplyMessage::text(DRAW_ERROR_REPLY)])
                .await
            {
                tracing::debug!("fallback reply failed: {}", reply_err);
            }
        }
    }

    async fn try_draw(
        &self,
        user_id: &str,
        reply_token: &str,
        index: usize,
        extra: &str,
    ) -> Result<()> {
        let session = self.sessions.ensure(user_id).await;
        let paragraphs = self.paragraphs_for_user(user_id, &session).await;

        let Some(scene) = paragraphs.get(index) else {
            self.messenger
                .reply(reply_token, &[ReplyMessage::text(NEED_MORE_STORY_REPLY)])
                .await?;
            return Ok(());
        };

        let prompt = build_scene_prompt(
            &self.settings.prompts.base_style,
            &format!("Scene: {}", scene),
            extra,
        );
        tracing::info!(seed = session.seed, "🖼️ images.generate prompt: {}", preview(&prompt, 500));

        let image = match self
            .model
            .generate_image(&prompt, &self.settings.image.size)
            .await
        {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                tracing::error!("💥 images.generate returned no image data");
                return self.reply_text(reply_token, IMAGE_FAILED_REPLY).await;
            }
            Err(e) => {
                tracing::error!("💥 images.generate error: {}", e);
                return self.reply_text(reply_token, IMAGE_FAILED_REPLY).await;
            }
        };

        let object = self.object_name(user_id, index);
        let signed_url = match self
            .images
            .upload_signed(&object, image, "image/png", self.settings.signed_url_ttl())
            .await
        {
            Ok(url) => {
                tracing::info!("✅ uploaded & signed: {}", object);
                url
            }
            Err(e) => {
                tracing::error!("❌ storage error: {}", e);
                return self.reply_text(reply_token, UPLOAD_FAILED_REPLY).await;
            }
        };

        self.messenger
            .reply(
                reply_token,
                &[
                    ReplyMessage::text(format!("第 {} 段完成了！", index + 1)),
                    ReplyMessage::image(signed_url.clone()),
                ],
            )
            .await?;
        self.save_chat(user_id, Role::Assistant, &format!("[image]{}", signed_url))
            .await;
        Ok(())
    }

    /// Stored summary first, then session memory, then a fresh summary of
    /// the recent conversation.
    async fn paragraphs_for_user(&self, user_id: &str, session: &Session) -> Vec<String> {
        if let Some(stored) = self.load_latest_paragraphs(user_id).await {
            if !stored.is_empty() {
                return stored;
            }
        }
        if !session.paragraphs.is_empty() {
            return session.paragraphs.clone();
        }

        let recent = session.recent_user_texts(self.settings.story.summary_window);
        if recent.is_empty() {
            return Vec::new();
        }

        let summary = self.generate_story_summary(&recent).await.unwrap_or_default();
        let paragraphs = extract_paragraphs(&summary, self.settings.story.max_paragraphs);
        self.sessions
            .set_paragraphs(user_id, paragraphs.clone())
            .await;
        self.save_story_summary(user_id, &paragraphs).await;
        paragraphs
    }

    fn object_name(&self, user_id: &str, index: usize) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "{}/{}-{}_s{}.png",
            self.settings.image.object_prefix,
            user_id,
            &suffix[..6],
            index + 1
        )
    }

    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<()> {
        self.messenger
            .reply(reply_token, &[ReplyMessage::text(text)])
            .await
    }

    async fn save_chat(&self, user_id: &str, role: Role, text: &str) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_chat(user_id, role, text).await {
                tracing::warn!("⚠️ save_chat failed: {}", e);
            }
        }
    }

    async fn save_story_summary(&self, user_id: &str, paragraphs: &[String]) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_story_summary(user_id, paragraphs).await {
                tracing::warn!("⚠️ save_story_summary failed: {}", e);
            }
        }
    }

    async fn load_latest_paragraphs(&self, user_id: &str) -> Option<Vec<String>> {
        let store = self.store.as_ref()?;
        match store.load_latest_paragraphs(user_id).await {
            Ok(paragraphs) => paragraphs.map(|mut p| {
                p.truncate(self.settings.story.max_paragraphs);
                p
            }),
            Err(e) => {
                tracing::warn!("⚠️ load_latest_paragraphs failed: {}", e);
                None
            }
        }
    }
}
