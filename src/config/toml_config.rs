use crate::utils::error::{BotError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_range, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BASE_STYLE: &str = "watercolor storybook illustration, warm earthy palette, soft brush textures, \
clean composition, child-friendly shapes, consistent character design. \
No text, letters, logos, watermarks, signage, or brand names.";

pub const DEFAULT_SUMMARY_SYSTEM_PROMPT: &str = "請將以下對話整理成 5 段完整故事，每段 2–3 句（約 60–120 字），\
每段需自然呈現場景、角色、主要動作與關鍵物件，不要列點外的額外說明。\
輸出以 1.~5. 條列。";

/// Bot tuning loaded from an optional TOML file. Every key has a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    pub story: StorySettings,
    pub chat: ChatSettings,
    pub image: ImageSettings,
    pub prompts: PromptSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorySettings {
    pub max_history: usize,
    pub summary_window: usize,
    pub max_paragraphs: usize,
}

impl Default for StorySettings {
    fn default() -> Self {
        Self {
            max_history: 60,
            summary_window: 8,
            max_paragraphs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f32,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub model: String,
    pub size: String,
    pub object_prefix: String,
    pub signed_url_ttl_minutes: u64,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            model: "gpt-image-1".to_string(),
            size: "1024x1024".to_string(),
            object_prefix: "line_images".to_string(),
            signed_url_ttl_minutes: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub base_style: String,
    pub summary_system: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            base_style: DEFAULT_BASE_STYLE.to_string(),
            summary_system: DEFAULT_SUMMARY_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl BotSettings {
    /// 從 TOML 檔案載入設定
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BotError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析設定
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BotError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${IMAGE_MODEL})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| BotError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn signed_url_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.image.signed_url_ttl_minutes * 60)
    }
}

impl Validate for BotSettings {
    fn validate(&self) -> Result<()> {
        validate_range("story.max_history", self.story.max_history, 1, 1000)?;
        validate_range("story.summary_window", self.story.summary_window, 1, 100)?;
        validate_range("story.max_paragraphs", self.story.max_paragraphs, 1, 20)?;
        validate_range("chat.temperature", self.chat.temperature, 0.0, 2.0)?;
        validate_non_empty_string("chat.model", &self.chat.model)?;
        validate_non_empty_string("image.model", &self.image.model)?;
        validate_non_empty_string("image.size", &self.image.size)?;
        // V4 signed URLs expire after at most seven days
        validate_range(
            "image.signed_url_ttl_minutes",
            self.image.signed_url_ttl_minutes,
            1,
            7 * 24 * 60,
        )?;
        Ok(())
    }
}
