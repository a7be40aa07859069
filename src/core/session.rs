use crate::domain::model::{ChatMessage, Session};
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-process conversation memory keyed by LINE user id.
///
/// The lock is only held for map updates; callers take snapshots before
/// doing any network work.
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    max_history: usize,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_history,
        }
    }

    fn new_seed() -> u32 {
        rand::thread_rng().gen_range(100_000..=999_999)
    }

    /// Creates the session on first use and returns a snapshot of it.
    pub async fn ensure(&self, user_id: &str) -> Session {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Session::new(Self::new_seed()))
            .clone()
    }

    pub async fn push_message(&self, user_id: &str, message: ChatMessage) {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Session::new(Self::new_seed()));

        session.messages.push(message);
        if session.messages.len() > self.max_history {
            let overflow = session.messages.len() - self.max_history;
            session.messages.drain(..overflow);
        }
    }

    pub async fn set_paragraphs(&self, user_id: &str, paragraphs: Vec<String>) {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Session::new(Self::new_seed()))
            .paragraphs = paragraphs;
    }

    pub async fn get(&self, user_id: &str) -> Option<Session> {
        self.sessions.lock().await.get(user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
