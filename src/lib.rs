pub mod adapters;
pub mod api;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{AppConfig, BotSettings};
pub use core::bot::StoryBot;
pub use utils::error::{BotError, Result};
