use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{ResponseCache, request_key};
use crate::config::Config;
use crate::llm::{LlmRequest, LlmResponse, ModelPipeline, config_keys};
use crate::search::{SearchResult, WebSearch, format_for_prompt};
use crate::session::SessionStore;

pub const AGENT_NAME: &str = "HelpDeskCoordinator";

pub const FALLBACK_ANSWER: &str = "I apologize, but I couldn't generate a response.";

const COORDINATOR_INSTRUCTION: &str = r#"You are a friendly and helpful Power BI assistant.
Answer greetings and simple questions directly.
When web search results are provided, ground your answer in them and cite the URLs you used.
Indicate when information might be outdated.
If a question is unclear, ask a specific follow-up question instead of guessing.
"#;

/// Result of one question
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchResult>,
    pub cached: bool,
}

/// Answers questions: optional web search, then one model call through the pipeline.
///
/// A cached answer skips the search too. The sources an answer was built from
/// are kept under the same fingerprint so a hit returns the sources it cites.
pub struct Assistant {
    pipeline: Arc<ModelPipeline>,
    search: Option<Arc<dyn WebSearch>>,
    answer_sources: ResponseCache<Vec<SearchResult>>,
    sessions: Arc<SessionStore>,
    model: String,
    max_output_tokens: u64,
    search_max_results: usize,
}

impl Assistant {
    pub fn new(
        config: &Config,
        pipeline: Arc<ModelPipeline>,
        search: Option<Arc<dyn WebSearch>>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            pipeline,
            search,
            answer_sources: ResponseCache::new(config.cache),
            sessions,
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            search_max_results: config.search_max_results,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_web_search(&self) -> bool {
        self.search.is_some()
    }

    /// Drop the sources remembered for cached answers.
    pub fn clear_sources(&self) {
        self.answer_sources.clear();
    }

    pub async fn ask(&self, session_id: &str, question: &str) -> anyhow::Result<Answer> {
        let request = LlmRequest::new(&self.model, question)
            .with_instruction(COORDINATOR_INSTRUCTION)
            .with_config(config_keys::AGENT, AGENT_NAME)
            .with_config(config_keys::MAX_OUTPUT_TOKENS, self.max_output_tokens);
        let key = request_key(&request).ok();

        if let Some(hit) = self.pipeline.lookup(&request) {
            let sources = key
                .as_ref()
                .and_then(|key| self.answer_sources.get(key))
                .unwrap_or_default();
            self.sessions.record_search(session_id, sources.clone()).await;
            return Ok(self.finish(session_id, question, hit, sources).await);
        }

        let sources = self.gather_sources(question).await;
        self.sessions.record_search(session_id, sources.clone()).await;

        let request = if sources.is_empty() {
            request
        } else {
            request.with_context(format!(
                "Web search results:\n{}",
                format_for_prompt(&sources)
            ))
        };

        let response = self.pipeline.complete(&request).await?;
        if let Some(key) = key.filter(|_| has_text(&response)) {
            self.answer_sources.put(key, sources.clone());
        }
        Ok(self.finish(session_id, question, response, sources).await)
    }

    async fn finish(
        &self,
        session_id: &str,
        question: &str,
        response: LlmResponse,
        sources: Vec<SearchResult>,
    ) -> Answer {
        let cached = response.cached;
        let text = response
            .text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_ANSWER.to_string());

        self.sessions
            .record_exchange(session_id, question.to_string(), text.clone())
            .await;

        Answer {
            text,
            sources,
            cached,
        }
    }

    // Search problems never fail the question, they just mean no sources.
    async fn gather_sources(&self, question: &str) -> Vec<SearchResult> {
        let Some(search) = &self.search else {
            return Vec::new();
        };
        match search.search(question, self.search_max_results).await {
            Ok(results) => {
                info!("Web search returned {} results", results.len());
                results
            }
            Err(e) => {
                warn!("Web search failed, answering without sources: {:#}", e);
                Vec::new()
            }
        }
    }
}

fn has_text(response: &LlmResponse) -> bool {
    response.text.as_deref().is_some_and(|t| !t.trim().is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::{CacheHook, ResponseCache};
    use crate::llm::pipeline::tests::{CountingBackend, FailingBackend};
    use crate::llm::{CompletionBackend, LlmResponse};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct StubSearch {
        pub results: Vec<SearchResult>,
        pub fail: bool,
    }

    #[async_trait]
    impl WebSearch for StubSearch {
        async fn search(
            &self,
            _query: &str,
            max_results: usize,
        ) -> anyhow::Result<Vec<SearchResult>> {
            if self.fail {
                anyhow::bail!("search offline");
            }
            Ok(self.results.iter().take(max_results).cloned().collect())
        }
    }

    /// Returns a different single result on every call
    struct RotatingSearch {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WebSearch for RotatingSearch {
        async fn search(
            &self,
            _query: &str,
            _max_results: usize,
        ) -> anyhow::Result<Vec<SearchResult>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SearchResult::new(
                format!("Result {n}"),
                format!("https://r{n}.example"),
                "snippet",
            )])
        }
    }

    /// Records the last request it saw
    struct RecordingBackend {
        last: Mutex<Option<LlmRequest>>,
        reply: Option<String>,
    }

    #[async_trait]
    impl CompletionBackend for RecordingBackend {
        async fn complete(&self, request: &LlmRequest) -> anyhow::Result<LlmResponse> {
            *self.last.lock().unwrap() = Some(request.clone());
            Ok(LlmResponse {
                text: self.reply.clone(),
                cached: false,
            })
        }
    }

    pub(crate) fn sample_results() -> Vec<SearchResult> {
        vec![
            SearchResult::new(
                "DAX overview",
                "https://learn.microsoft.com/dax",
                "Formula language",
            ),
            SearchResult::new("DAX guide", "https://dax.guide", "Function reference"),
        ]
    }

    fn assistant(
        backend: Arc<dyn CompletionBackend>,
        search: Option<Arc<dyn WebSearch>>,
    ) -> (Assistant, Arc<ResponseCache>, Arc<SessionStore>) {
        let config = Config::default();
        let cache = Arc::new(ResponseCache::new(config.cache));
        let pipeline = Arc::new(
            ModelPipeline::new(backend).with_hook(Arc::new(CacheHook::new(cache.clone()))),
        );
        let sessions = Arc::new(SessionStore::new());
        (
            Assistant::new(&config, pipeline, search, sessions.clone()),
            cache,
            sessions,
        )
    }

    #[tokio::test]
    async fn test_repeat_question_is_served_from_cache() {
        let backend = Arc::new(CountingBackend::new("Hi there"));
        let (assistant, cache, _) = assistant(backend.clone(), None);

        let first = assistant.ask("s1", "Hello").await.unwrap();
        assert_eq!(first.text, "Hi there");
        assert!(!first.cached);

        let second = assistant.ask("s1", "Hello").await.unwrap();
        assert_eq!(second.text, "Hi there");
        assert!(second.cached);
        assert_eq!(backend.calls(), 1);
        assert_eq!(cache.stats().size, 1);
    }

    #[tokio::test]
    async fn test_search_results_become_context_and_sources() {
        let backend = Arc::new(RecordingBackend {
            last: Mutex::new(None),
            reply: Some("DAX is a formula language [1]".to_string()),
        });
        let search: Arc<dyn WebSearch> = Arc::new(StubSearch {
            results: sample_results(),
            fail: false,
        });
        let (assistant, _, sessions) = assistant(backend.clone(), Some(search));

        let answer = assistant.ask("s1", "What is DAX?").await.unwrap();
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(sessions.search_results("s1").await.len(), 2);

        let request = backend.last.lock().unwrap().clone().unwrap();
        let context = request.context.clone().unwrap();
        assert!(context.contains("[1] DAX overview"));
        assert!(context.contains("URL: https://dax.guide"));
        assert_eq!(request.config[config_keys::AGENT], AGENT_NAME);
        assert_eq!(request.max_output_tokens(), Some(1024));
    }

    #[tokio::test]
    async fn test_cached_answer_skips_search_and_keeps_its_sources() {
        let backend = Arc::new(CountingBackend::new("See [1]"));
        let search = Arc::new(RotatingSearch {
            calls: AtomicUsize::new(0),
        });
        let dyn_search: Arc<dyn WebSearch> = search.clone();
        let (assistant, _, sessions) = assistant(backend.clone(), Some(dyn_search));

        let first = assistant.ask("s1", "What is DAX?").await.unwrap();
        assert_eq!(first.sources[0].url, "https://r0.example");

        let second = assistant.ask("s2", "What is DAX?").await.unwrap();
        assert!(second.cached);
        assert_eq!(second.sources, first.sources);
        assert_eq!(search.calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.calls(), 1);
        assert_eq!(sessions.search_results("s2").await, first.sources);
    }

    #[tokio::test]
    async fn test_cleared_sources_leave_cached_answer_without_sources() {
        let backend = Arc::new(CountingBackend::new("See [1]"));
        let search: Arc<dyn WebSearch> = Arc::new(StubSearch {
            results: sample_results(),
            fail: false,
        });
        let (assistant, _, _) = assistant(backend, Some(search));

        assistant.ask("s1", "What is DAX?").await.unwrap();
        assistant.clear_sources();

        let again = assistant.ask("s1", "What is DAX?").await.unwrap();
        assert!(again.cached);
        assert!(again.sources.is_empty());
    }

    #[tokio::test]
    async fn test_search_failure_still_answers() {
        let backend = Arc::new(CountingBackend::new("No sources needed"));
        let search: Arc<dyn WebSearch> = Arc::new(StubSearch {
            results: Vec::new(),
            fail: true,
        });
        let (assistant, _, _) = assistant(backend.clone(), Some(search));

        let answer = assistant.ask("s1", "Hello").await.unwrap();
        assert_eq!(answer.text, "No sources needed");
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn test_empty_model_text_uses_fallback() {
        let backend = Arc::new(RecordingBackend {
            last: Mutex::new(None),
            reply: None,
        });
        let (assistant, cache, sessions) = assistant(backend, None);

        let answer = assistant.ask("s1", "Hello").await.unwrap();
        assert_eq!(answer.text, FALLBACK_ANSWER);
        assert!(cache.is_empty());
        assert_eq!(sessions.history("s1").await[0].answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_backend_failure_is_an_error() {
        let (assistant, _, sessions) = assistant(Arc::new(FailingBackend), None);
        assert!(assistant.ask("s1", "Hello").await.is_err());
        assert!(sessions.history("s1").await.is_empty());
    }
}
