use crate::core::bot::StoryBot;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub bot: Arc<StoryBot>,
    pub channel_secret: Arc<str>,
}

impl AppState {
    pub fn new(bot: StoryBot, channel_secret: &str) -> Self {
        Self {
            bot: Arc::new(bot),
            channel_secret: Arc::from(channel_secret),
        }
    }
}
