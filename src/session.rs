use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::search::SearchResult;

pub const DEFAULT_SESSION_ID: &str = "default_session";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Default)]
struct SessionData {
    search_results: Vec<SearchResult>,
    history: Vec<Exchange>,
}

/// Per-session search sources and conversation history, in memory only
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionData>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the search results remembered for a session
    pub async fn record_search(&self, session_id: &str, results: Vec<SearchResult>) {
        let mut sessions = self.sessions.write().await;
        sessions.entry(session_id.to_string()).or_default().search_results = results;
    }

    pub async fn search_results(&self, session_id: &str) -> Vec<SearchResult> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.search_results.clone())
            .unwrap_or_default()
    }

    pub async fn record_exchange(&self, session_id: &str, question: String, answer: String) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .history
            .push(Exchange { question, answer });
    }

    pub async fn history(&self, session_id: &str) -> Vec<Exchange> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    /// Forget a session. Returns whether it existed.
    pub async fn clear(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
