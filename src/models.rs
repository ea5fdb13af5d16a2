use serde::{Deserialize, Serialize};

use crate::session::Exchange;

/// Request payload for the ask endpoint
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl AskRequest {
    /// Validates if the question is not empty or just whitespace
    pub fn is_valid(&self) -> bool {
        !self.question.trim().is_empty()
    }
}

/// A document or web page the answer drew on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub filename: String,
    pub path: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub is_table: bool,
    pub chunks_used: u32,
}

/// Response payload for the ask endpoint
#[derive(Debug, Default, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub has_tables: bool,
    pub num_sources: usize,
    pub table_count: usize,
    pub doc_count: usize,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AskResponse {
    pub fn new(answer: String, sources: Vec<Source>, cached: bool) -> Self {
        let doc_count = sources.iter().filter(|s| s.source_type == "web").count();
        Self {
            answer,
            num_sources: sources.len(),
            doc_count,
            sources,
            cached,
            ..Default::default()
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Response payload for the health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: "Service is healthy".to_string(),
        }
    }
}

/// Response payload for the API health endpoint
#[derive(Debug, Serialize)]
pub struct ServiceHealthResponse {
    pub status: String,
    pub llm: String,
    pub cache_enabled: bool,
    pub web_search: bool,
    pub sessions: usize,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn success(message: Option<&str>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<Exchange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_request_validation() {
        let valid = AskRequest {
            question: "What is DAX?".to_string(),
            session_id: None,
        };
        let blank = AskRequest {
            question: " \t".to_string(),
            session_id: None,
        };
        assert!(valid.is_valid());
        assert!(!blank.is_valid());
    }

    #[test]
    fn test_ask_response_counts() {
        let web = Source {
            filename: "a".to_string(),
            path: "https://a".to_string(),
            source_type: "web".to_string(),
            is_table: false,
            chunks_used: 1,
        };
        let doc = Source {
            source_type: "file".to_string(),
            ..web.clone()
        };
        let response = AskResponse::new("answer".to_string(), vec![web, doc], false);
        assert_eq!(response.num_sources, 2);
        assert_eq!(response.doc_count, 1);
        assert_eq!(response.table_count, 0);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["sources"][0]["type"], "web");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failed_response() {
        let json = serde_json::to_value(AskResponse::failed("boom".to_string())).unwrap();
        assert_eq!(json["answer"], "");
        assert_eq!(json["error"], "boom");
        assert_eq!(json["num_sources"], 0);
    }
}
