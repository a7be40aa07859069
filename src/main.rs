use anyhow::Context;
use clap::Parser;
use line_storybot::adapters::google_auth::{resolve_credentials, GoogleCredentials};
use line_storybot::adapters::{FirestoreStore, GcsStorage, LineClient, OpenAiClient};
use line_storybot::api::{self, context::AppState};
use line_storybot::domain::ports::StoryStore;
use line_storybot::utils::{logger, validation::Validate};
use line_storybot::{AppConfig, StoryBot};
use std::sync::Arc;

/// Firestore is optional: without a resolvable project the bot runs on
/// in-memory sessions only.
async fn init_story_store(
    config: &AppConfig,
    credentials: &Arc<dyn GoogleCredentials>,
) -> Option<Arc<dyn StoryStore>> {
    let project_id = match config.project_id() {
        Some(project) => Some(project.to_string()),
        None => credentials.project_id().await,
    };

    match project_id {
        Some(project_id) => {
            tracing::info!("✅ Firestore enabled for project {}", project_id);
            Some(Arc::new(FirestoreStore::new(project_id, credentials.clone())))
        }
        None => {
            tracing::error!("❌ Firestore init failed, running WITHOUT Firestore: no project id");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();

    logger::init_logger(config.log_format, config.verbose);
    tracing::info!("Starting line-storybot");

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed ({:?}): {}", e.category(), e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let settings = match config.load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ Bot settings invalid: {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    // validated above
    let access_token = config.line_channel_access_token.clone().unwrap_or_default();
    let channel_secret = config.line_channel_secret.clone().unwrap_or_default();
    let openai_key = config.openai_api_key.clone().unwrap_or_default();

    let credentials = resolve_credentials(config.firebase_credentials.as_deref());
    let store = init_story_store(&config, &credentials).await;

    let model = OpenAiClient::new(&config.openai_base_url, openai_key)
        .with_models(&settings.chat.model, &settings.image.model);
    let images = GcsStorage::new(&config.gcs_bucket, credentials);
    let messenger = LineClient::new(&config.line_api_base_url, access_token);

    tracing::info!(
        bucket = %config.gcs_bucket,
        firestore = store.is_some(),
        "🚀 app boot: signed-url mode active"
    );

    let bot = StoryBot::new(
        Arc::new(model),
        Arc::new(images),
        Arc::new(messenger),
        store,
        settings,
    );

    api::serve(&config.bind_address(), AppState::new(bot, &channel_secret))
        .await
        .context("server terminated")
}
