pub mod toml_config;

use crate::utils::error::Result;
use crate::utils::logger::LogFormat;
use crate::utils::validation::{validate_range, validate_secret, validate_url, Validate};
use clap::Parser;
use std::path::PathBuf;

pub use toml_config::BotSettings;

#[derive(Debug, Clone, Parser)]
#[command(name = "line-storybot")]
#[command(about = "LINE webhook that turns chats into illustrated stories")]
pub struct AppConfig {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "LINE_CHANNEL_ACCESS_TOKEN", hide_env_values = true)]
    pub line_channel_access_token: Option<String>,

    #[arg(long, env = "LINE_CHANNEL_SECRET", hide_env_values = true)]
    pub line_channel_secret: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "GCS_BUCKET", default_value = "storybotimage")]
    pub gcs_bucket: String,

    /// Inline service account JSON.
    #[arg(long, env = "FIREBASE_CREDENTIALS", hide_env_values = true)]
    pub firebase_credentials: Option<String>,

    #[arg(long, env = "FIREBASE_PROJECT_ID")]
    pub firebase_project_id: Option<String>,

    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    pub google_cloud_project: Option<String>,

    /// Optional TOML file with bot tuning.
    #[arg(long, env = "STORYBOT_CONFIG")]
    pub config_file: Option<PathBuf>,

    #[arg(long, env = "LINE_API_BASE_URL", default_value = "https://api.line.me")]
    pub line_api_base_url: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "compact")]
    pub log_format: LogFormat,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl AppConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Firestore project: explicit setting first, then the Cloud Run project.
    pub fn project_id(&self) -> Option<&str> {
        self.firebase_project_id
            .as_deref()
            .or(self.google_cloud_project.as_deref())
            .filter(|p| !p.trim().is_empty())
    }

    pub fn load_settings(&self) -> Result<BotSettings> {
        let settings = match &self.config_file {
            Some(path) => BotSettings::from_file(path)?,
            None => BotSettings::default(),
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_secret("line_channel_access_token", &self.line_channel_access_token)?;
        validate_secret("line_channel_secret", &self.line_channel_secret)?;
        validate_secret("openai_api_key", &self.openai_api_key)?;
        validate_range("port", self.port, 1, u16::MAX)?;
        validate_url("line_api_base_url", &self.line_api_base_url)?;
        validate_url("openai_base_url", &self.openai_base_url)?;
        crate::utils::validation::validate_non_empty_string("gcs_bucket", &self.gcs_bucket)?;
        Ok(())
    }
}
