pub mod duckduckgo;

pub use duckduckgo::DuckDuckGoSearch;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Source;

/// One web hit, kept for both the prompt context and the response sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }

    pub fn to_source(&self) -> Source {
        Source {
            filename: self.title.clone(),
            path: self.url.clone(),
            source_type: "web".to_string(),
            is_table: false,
            chunks_used: 1,
        }
    }
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<SearchResult>>;
}

/// Numbered result blocks handed to the model as context
pub fn format_for_prompt(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[{}] {}\nURL: {}\nSummary: {}\n", i + 1, r.title, r.url, r.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn to_sources(results: &[SearchResult]) -> Vec<Source> {
    results.iter().map(SearchResult::to_source).collect()
}
