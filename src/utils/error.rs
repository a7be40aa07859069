use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("{service} responded with {status}: {body}")]
    UpstreamError {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Authentication error: {message}")]
    AuthError { message: String },

    #[error("Invalid webhook signature")]
    SignatureError,

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Authentication,
    Data,
}

impl BotError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BotError::ApiError(_) | BotError::UpstreamError { .. } | BotError::IoError(_) => {
                ErrorCategory::Network
            }
            BotError::ConfigError { .. }
            | BotError::InvalidConfigValueError { .. }
            | BotError::MissingConfigError { .. } => ErrorCategory::Configuration,
            BotError::AuthError { .. } | BotError::SignatureError => {
                ErrorCategory::Authentication
            }
            BotError::SerializationError(_) | BotError::ProcessingError { .. } => {
                ErrorCategory::Data
            }
        }
    }

    /// Message shown on the console when startup fails.
    pub fn user_friendly_message(&self) -> String {
        match self {
            BotError::MissingConfigError { field } => {
                format!("缺少必要設定 {}，請透過環境變數或參數提供", field)
            }
            BotError::InvalidConfigValueError { field, reason, .. } => {
                format!("設定 {} 無效：{}", field, reason)
            }
            other => other.to_string(),
        }
    }

    pub(crate) fn upstream(service: &'static str, status: reqwest::StatusCode, body: String) -> Self {
        BotError::UpstreamError {
            service,
            status: status.as_u16(),
            body,
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
