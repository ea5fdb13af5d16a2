use crate::app::AppState;
use crate::cache::CacheStats;
use crate::error::{AppError, AppResult};
use crate::models::{
    AskRequest, AskResponse, HealthResponse, HistoryResponse, ServiceHealthResponse, SessionQuery,
    StatusResponse,
};
use crate::search::to_sources;
use crate::session::DEFAULT_SESSION_ID;
use axum::{
    Extension,
    extract::{Json, Query},
    response::Json as ResponseJson,
};
use tracing::{debug, error, info};

fn session_or_default(session_id: Option<String>) -> String {
    session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string())
}

/// Health check handler
/// Returns the service status and health information
pub async fn health_check() -> AppResult<ResponseJson<HealthResponse>> {
    debug!("Health check endpoint called");

    let response = HealthResponse::ok();

    info!("Health check successful");
    Ok(ResponseJson(response))
}

/// Reports whether the model backend is wired up, plus cache and session state
pub async fn service_health(
    Extension(state): Extension<AppState>,
) -> AppResult<ResponseJson<ServiceHealthResponse>> {
    let (status, web_search) = match &state.assistant {
        Some(assistant) => ("healthy", assistant.has_web_search()),
        None => ("unhealthy", false),
    };

    Ok(ResponseJson(ServiceHealthResponse {
        status: status.to_string(),
        llm: state.config.model.clone(),
        cache_enabled: state.cache.is_enabled(),
        web_search,
        sessions: state.sessions.session_count().await,
    }))
}

/// Answers a question through the cached model pipeline.
/// Model failures are reported in the `error` field rather than as an HTTP error.
pub async fn ask_handler(
    Extension(state): Extension<AppState>,
    Json(payload): Json<AskRequest>,
) -> AppResult<ResponseJson<AskResponse>> {
    info!("Ask endpoint called with question: {}", payload.question);

    if !payload.is_valid() {
        return Err(AppError::ValidationError(
            "Question cannot be empty or only whitespace".to_string(),
        ));
    }

    let assistant = state
        .assistant
        .as_ref()
        .ok_or_else(|| AppError::ServiceUnavailable("Agent not initialized".to_string()))?;

    let session_id = session_or_default(payload.session_id);

    match assistant.ask(&session_id, &payload.question).await {
        Ok(answer) => {
            info!(
                cached = answer.cached,
                sources = answer.sources.len(),
                "Successfully processed question"
            );
            Ok(ResponseJson(AskResponse::new(
                answer.text,
                to_sources(&answer.sources),
                answer.cached,
            )))
        }
        Err(e) => {
            error!("Failed to answer question: {:#}", e);
            Ok(ResponseJson(AskResponse::failed(format!("{:#}", e))))
        }
    }
}

/// Forgets a session's history and search sources
pub async fn clear_session(
    Extension(state): Extension<AppState>,
    Query(query): Query<SessionQuery>,
) -> AppResult<ResponseJson<StatusResponse>> {
    let session_id = session_or_default(query.session_id);
    let existed = state.sessions.clear(&session_id).await;
    info!("Cleared session {} (existed: {})", session_id, existed);
    Ok(ResponseJson(StatusResponse::success(None)))
}

pub async fn session_history(
    Extension(state): Extension<AppState>,
    Query(query): Query<SessionQuery>,
) -> AppResult<ResponseJson<HistoryResponse>> {
    let session_id = session_or_default(query.session_id);
    let history = state.sessions.history(&session_id).await;
    Ok(ResponseJson(HistoryResponse { history }))
}

pub async fn cache_stats(
    Extension(state): Extension<AppState>,
) -> AppResult<ResponseJson<CacheStats>> {
    Ok(ResponseJson(state.cache.stats()))
}

pub async fn clear_cache(
    Extension(state): Extension<AppState>,
) -> AppResult<ResponseJson<StatusResponse>> {
    state.cache.clear();
    if let Some(assistant) = &state.assistant {
        assistant.clear_sources();
    }
    info!("Response cache cleared");
    Ok(ResponseJson(StatusResponse::success(Some("Cache cleared"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::Assistant;
    use crate::assistant::tests::{StubSearch, sample_results};
    use crate::cache::{CacheHook, ResponseCache};
    use crate::config::Config;
    use crate::llm::pipeline::tests::{CountingBackend, FailingBackend};
    use crate::llm::{CompletionBackend, ModelPipeline};
    use crate::search::WebSearch;
    use crate::session::SessionStore;
    use std::sync::Arc;

    fn state_with(backend: Arc<dyn CompletionBackend>) -> AppState {
        build_state(Some(backend))
    }

    fn build_state(backend: Option<Arc<dyn CompletionBackend>>) -> AppState {
        let config = Config::default();
        let cache = Arc::new(ResponseCache::new(config.cache));
        let sessions = Arc::new(SessionStore::new());
        let search: Arc<dyn WebSearch> = Arc::new(StubSearch {
            results: sample_results(),
            fail: false,
        });
        let assistant = backend.map(|backend| {
            let pipeline = Arc::new(
                ModelPipeline::new(backend).with_hook(Arc::new(CacheHook::new(cache.clone()))),
            );
            Arc::new(Assistant::new(&config, pipeline, Some(search), sessions.clone()))
        });
        AppState {
            config: Arc::new(config),
            cache,
            sessions,
            assistant,
        }
    }

    fn ask(question: &str, session_id: Option<&str>) -> Json<AskRequest> {
        Json(AskRequest {
            question: question.to_string(),
            session_id: session_id.map(str::to_string),
        })
    }

    #[tokio::test]
    async fn test_health_check() {
        let result = health_check().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_ask_then_cached_ask() {
        let backend = Arc::new(CountingBackend::new("Hi there"));
        let state = state_with(backend.clone());

        let first = ask_handler(Extension(state.clone()), ask("Hello", None))
            .await
            .unwrap()
            .0;
        assert_eq!(first.answer, "Hi there");
        assert!(!first.cached);
        assert_eq!(first.num_sources, 2);
        assert_eq!(first.doc_count, 2);
        assert!(first.error.is_none());

        let second = ask_handler(Extension(state.clone()), ask("Hello", None))
            .await
            .unwrap()
            .0;
        assert!(second.cached);
        assert_eq!(second.num_sources, 2);
        assert_eq!(backend.calls(), 1);

        let stats = cache_stats(Extension(state)).await.unwrap().0;
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_ask_rejects_blank_question() {
        let state = state_with(Arc::new(CountingBackend::new("x")));
        let result = ask_handler(Extension(state), ask("   ", None)).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_ask_without_backend_is_unavailable() {
        let state = build_state(None);
        let result = ask_handler(Extension(state.clone()), ask("Hello", None)).await;
        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));

        let health = service_health(Extension(state)).await.unwrap().0;
        assert_eq!(health.status, "unhealthy");
    }

    #[tokio::test]
    async fn test_model_failure_is_reported_in_body() {
        let state = state_with(Arc::new(FailingBackend));
        let response = ask_handler(Extension(state), ask("Hello", None))
            .await
            .unwrap()
            .0;
        assert_eq!(response.answer, "");
        assert_eq!(response.num_sources, 0);
        assert!(response.error.unwrap().contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn test_history_and_clear_session() {
        let state = state_with(Arc::new(CountingBackend::new("Hello!")));
        ask_handler(Extension(state.clone()), ask("Hi", Some("s1")))
            .await
            .unwrap();

        let query = || {
            Query(SessionQuery {
                session_id: Some("s1".to_string()),
            })
        };
        let history = session_history(Extension(state.clone()), query())
            .await
            .unwrap()
            .0;
        assert_eq!(history.history.len(), 1);
        assert_eq!(history.history[0].answer, "Hello!");

        let default_history = session_history(
            Extension(state.clone()),
            Query(SessionQuery { session_id: None }),
        )
        .await
        .unwrap()
        .0;
        assert!(default_history.history.is_empty());

        clear_session(Extension(state.clone()), query()).await.unwrap();
        let history = session_history(Extension(state), query()).await.unwrap().0;
        assert!(history.history.is_empty());
    }

    #[tokio::test]
    async fn test_clear_cache_endpoint() {
        let backend = Arc::new(CountingBackend::new("Hi there"));
        let state = state_with(backend.clone());
        ask_handler(Extension(state.clone()), ask("Hello", None))
            .await
            .unwrap();

        let status = clear_cache(Extension(state.clone())).await.unwrap().0;
        assert_eq!(status.status, "success");
        assert_eq!(status.message.as_deref(), Some("Cache cleared"));
        assert_eq!(state.cache.stats().size, 0);

        ask_handler(Extension(state), ask("Hello", None))
            .await
            .unwrap();
        assert_eq!(backend.calls(), 2);
    }
}
