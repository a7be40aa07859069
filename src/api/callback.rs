use crate::adapters::line::{verify_signature, WebhookPayload, SIGNATURE_HEADER};
use crate::api::context::AppState;
use crate::utils::error::BotError;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

impl IntoResponse for BotError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            BotError::SignatureError | BotError::SerializationError(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// LINE webhook endpoint. The batch is handled on one background task so the
/// platform gets its 200 without waiting for model calls, and events keep
/// their delivery order.
#[tracing::instrument(skip_all)]
pub async fn callback_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, BotError> {
    let Some(signature) = headers.get(SIGNATURE_HEADER) else {
        tracing::warn!("⚠️ Missing X-Line-Signature, non-LINE request ignored");
        return Ok("OK");
    };

    let Ok(signature) = signature.to_str() else {
        tracing::warn!("invalid webhook signature encoding");
        return Err(BotError::SignatureError);
    };

    if !verify_signature(&state.channel_secret, &body, signature) {
        tracing::warn!("invalid webhook signature");
        return Err(BotError::SignatureError);
    }

    let payload = WebhookPayload::parse(&body)?;
    tracing::debug!(
        destination = payload.destination.as_deref().unwrap_or_default(),
        "received {} event(s)",
        payload.events.len()
    );

    let events: Vec<_> = payload.text_messages().collect();
    if events.is_empty() {
        return Ok("OK");
    }

    let bot = state.bot.clone();
    tokio::spawn(async move {
        for event in events {
            if let Err(e) = bot
                .handle_text(&event.user_id, &event.reply_token, &event.text)
                .await
            {
                tracing::error!(
                    "❌ handling message from {} failed ({:?}): {}",
                    event.user_id,
                    e.category(),
                    e
                );
            }
        }
    });

    Ok("OK")
}
