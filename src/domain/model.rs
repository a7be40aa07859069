use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Per-user conversation memory kept by the bot process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub messages: Vec<ChatMessage>,
    pub paragraphs: Vec<String>,
    pub seed: u32,
}

impl Session {
    pub fn new(seed: u32) -> Self {
        Self {
            messages: Vec::new(),
            paragraphs: Vec::new(),
            seed,
        }
    }

    /// The newest `window` user messages, oldest first.
    pub fn recent_user_texts(&self, window: usize) -> Vec<String> {
        let texts: Vec<&ChatMessage> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .collect();
        let start = texts.len().saturating_sub(window);
        texts[start..].iter().map(|m| m.content.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Summarize,
    /// `index` is zero-based.
    Draw { index: usize, extra: String },
    Chat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMessage {
    Text(String),
    Image {
        original_url: String,
        preview_url: String,
    },
}

impl ReplyMessage {
    pub fn text(text: impl Into<String>) -> Self {
        ReplyMessage::Text(text.into())
    }

    pub fn image(url: impl Into<String>) -> Self {
        let url = url.into();
        ReplyMessage::Image {
            original_url: url.clone(),
            preview_url: url,
        }
    }
}
