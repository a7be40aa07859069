use base64::{engine::general_purpose::STANDARD, Engine as _};
use httpmock::prelude::*;
use line_storybot::adapters::google_auth::{
    GoogleCredentials, ServiceAccountCredentials, ServiceAccountKey,
};
use line_storybot::adapters::{FirestoreStore, GcsStorage, LineClient, OpenAiClient};
use line_storybot::domain::ports::StoryStore;
use line_storybot::{BotSettings, StoryBot};
use std::sync::Arc;

const SERVICE_ACCOUNT: &str = include_str!("fixtures/service_account.json");

const SUMMARY: &str = "1. 小狐狸在森林醒來。\n2. 她撿到一把會發光的鑰匙。\n3. 鑰匙打開了老橡樹的樹洞。\n4. 樹洞裡藏著一座小小的城市。\n5. 她成為了城市的守護者。";

struct Stack {
    server: MockServer,
    bot: StoryBot,
}

fn credentials(server: &MockServer) -> Arc<dyn GoogleCredentials> {
    let mut key: ServiceAccountKey = serde_json::from_str(SERVICE_ACCOUNT).unwrap();
    key.token_uri = server.url("/token");
    Arc::new(ServiceAccountCredentials::new(key).unwrap())
}

/// Every upstream (LINE, OpenAI, OAuth2, GCS, Firestore) served by one mock server.
fn stack(with_firestore: bool) -> Stack {
    let server = MockServer::start();
    let credentials = credentials(&server);

    let store = with_firestore.then(|| {
        Arc::new(FirestoreStore::with_base_url(
            server.base_url(),
            "storybot-test",
            credentials.clone(),
        )) as Arc<dyn StoryStore>
    });

    let bot = StoryBot::new(
        Arc::new(OpenAiClient::new(server.base_url(), "sk-test")),
        Arc::new(GcsStorage::with_base_url(
            server.base_url(),
            "storybotimage",
            credentials,
        )),
        Arc::new(LineClient::new(server.base_url(), "line-token")),
        store,
        BotSettings::default(),
    );

    Stack { server, bot }
}

fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/token");
        then.status(200).json_body(serde_json::json!({
            "access_token": "ya29.integration",
            "expires_in": 3600,
            "token_type": "Bearer"
        }));
    })
}

#[tokio::test]
async fn test_guidance_reply_without_persistence() {
    let Stack { server, bot } = stack(false);

    let reply_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/bot/message/reply")
            .header("authorization", "Bearer line-token")
            .body_contains("主角是誰？在哪裡？想發生什麼？");
        then.status(200).json_body(serde_json::json!({}));
    });

    bot.handle_text("U1", "reply-1", "從前從前有一隻小狐狸")
        .await
        .unwrap();

    reply_mock.assert();
}

#[tokio::test]
async fn test_summarize_then_draw_end_to_end() {
    let Stack { server, bot } = stack(true);

    let token_mock = mock_token(&server);
    let commit_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/projects/storybot-test/databases/(default)/documents:commit")
            .header("authorization", "Bearer ya29.integration");
        then.status(200)
            .json_body(serde_json::json!({"commitTime": "2026-01-01T00:00:00Z"}));
    });
    let summary_doc_mock = server.mock(|when, then| {
        when.method(GET).path(
            "/v1/projects/storybot-test/databases/(default)/documents/users/U1/story/latest_summary",
        );
        then.status(404).json_body(serde_json::json!({"error": {"code": 404}}));
    });
    let chat_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/chat/completions")
            .header("authorization", "Bearer sk-test");
        then.status(200).json_body(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": SUMMARY}}]
        }));
    });
    let intro_reply_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/bot/message/reply")
            .body_contains("reply-intro");
        then.status(200).json_body(serde_json::json!({}));
    });
    let summary_reply_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/bot/message/reply")
            .body_contains("reply-summary")
            .body_contains("✨ 故事總結完成");
        then.status(200).json_body(serde_json::json!({}));
    });

    bot.handle_text("U1", "reply-intro", "小狐狸住在森林裡")
        .await
        .unwrap();
    bot.handle_text("U1", "reply-summary", "請幫我整理")
        .await
        .unwrap();

    intro_reply_mock.assert();
    chat_mock.assert_hits(1);
    summary_reply_mock.assert();
    // user + assistant for the intro, user + assistant summary, one story summary
    assert_eq!(commit_mock.hits(), 5);

    let image_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/images/generations")
            .body_contains("Scene: 鑰匙打開了老橡樹的樹洞。 下雪的夜晚");
        then.status(200).json_body(serde_json::json!({
            "data": [{"b64_json": STANDARD.encode(b"\x89PNG fake")}]
        }));
    });
    let upload_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/upload/storage/v1/b/storybotimage/o")
            .query_param("uploadType", "media")
            .query_param_exists("name")
            .header("content-type", "image/png");
        then.status(200).json_body(serde_json::json!({}));
    });
    let image_reply_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/bot/message/reply")
            .body_contains("reply-draw")
            .body_contains("第 3 段完成了！")
            .body_contains("https://storage.googleapis.com/storybotimage/line_images/U1-")
            .body_contains("X-Goog-Signature=");
        then.status(200).json_body(serde_json::json!({}));
    });

    bot.handle_text("U1", "reply-draw", "幫我畫第三段，下雪的夜晚")
        .await
        .unwrap();

    summary_doc_mock.assert();
    image_mock.assert();
    upload_mock.assert();
    image_reply_mock.assert();
    // the summary was remembered in the session; no second chat call
    chat_mock.assert_hits(1);
    token_mock.assert_hits(1);
}

#[tokio::test]
async fn test_draw_image_failure_tells_user() {
    let Stack { server, bot } = stack(false);

    bot.sessions()
        .set_paragraphs("U1", vec!["小狐狸在森林醒來。".to_string()])
        .await;

    server.mock(|when, then| {
        when.method(POST).path("/images/generations");
        then.status(400).json_body(serde_json::json!({
            "error": {"message": "Your request was rejected by the safety system."}
        }));
    });
    let reply_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/bot/message/reply")
            .body_contains("圖片生成暫時失敗了");
        then.status(200).json_body(serde_json::json!({}));
    });

    bot.handle_text("U1", "reply-1", "畫第一段").await.unwrap();

    reply_mock.assert();
}

#[tokio::test]
async fn test_draw_upload_failure_tells_user() {
    let Stack { server, bot } = stack(false);

    bot.sessions()
        .set_paragraphs("U1", vec!["小狐狸在森林醒來。".to_string()])
        .await;

    mock_token(&server);
    server.mock(|when, then| {
        when.method(POST).path("/images/generations");
        then.status(200).json_body(serde_json::json!({
            "data": [{"b64_json": STANDARD.encode(b"png")}]
        }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/upload/storage/v1/b/storybotimage/o");
        then.status(403).body("AccessDenied");
    });
    let reply_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/bot/message/reply")
            .body_contains("上傳圖片時出了點狀況");
        then.status(200).json_body(serde_json::json!({}));
    });

    bot.handle_text("U1", "reply-1", "請畫第1段").await.unwrap();

    reply_mock.assert();
}

#[tokio::test]
async fn test_persistence_failures_do_not_block_replies() {
    let Stack { server, bot } = stack(true);

    mock_token(&server);
    let commit_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/projects/storybot-test/databases/(default)/documents:commit");
        then.status(503).body("UNAVAILABLE");
    });
    let reply_mock = server.mock(|when, then| {
        when.method(POST).path("/v2/bot/message/reply");
        then.status(200).json_body(serde_json::json!({}));
    });

    bot.handle_text("U1", "reply-1", "哈囉").await.unwrap();

    reply_mock.assert();
    commit_mock.assert_hits(2);
}
