use std::sync::Arc;
use tracing::{debug, info};

use super::{CacheError, CacheKey, ResponseCache, compute_key};
use crate::llm::{LlmRequest, LlmResponse, ModelHook};

/// Fingerprint of a request: its prompt (or last message), model and config.
/// Context is left out, so the key is known before any context is gathered.
pub fn request_key(request: &LlmRequest) -> Result<CacheKey, CacheError> {
    let prompt = request
        .cache_prompt()
        .ok_or(CacheError::InvalidInput("request has no prompt"))?;
    compute_key(prompt, &request.model, Some(&request.config))
}

/// Pipeline hook that answers repeated requests from a [`ResponseCache`]
/// and stores fresh responses after the model call.
#[derive(Clone)]
pub struct CacheHook {
    cache: Arc<ResponseCache>,
}

impl CacheHook {
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self { cache }
    }

    fn lookup(&self, request: &LlmRequest) -> Result<Option<String>, CacheError> {
        let key = request_key(request)?;
        let hit = self.cache.get(&key);
        if hit.is_some() {
            info!(key = %key.short(), model = %request.model, "Cache hit, skipping model call");
        }
        Ok(hit)
    }

    fn store(&self, request: &LlmRequest, response: &LlmResponse) -> Result<(), CacheError> {
        let Some(text) = response.text.as_deref().filter(|t| !t.trim().is_empty()) else {
            debug!("Response has no text content, not caching");
            return Ok(());
        };
        let key = request_key(request)?;
        self.cache.put(key, text.to_string());
        Ok(())
    }
}

impl ModelHook for CacheHook {
    fn before_call(&self, request: &LlmRequest) -> Option<LlmResponse> {
        if !self.cache.is_enabled() {
            return None;
        }
        match self.lookup(request) {
            Ok(hit) => hit.map(LlmResponse::from_cache),
            Err(e) => {
                debug!("Cache lookup skipped: {}", e);
                None
            }
        }
    }

    fn after_call(&self, request: &LlmRequest, response: &LlmResponse) {
        if !self.cache.is_enabled() || response.cached {
            return;
        }
        if let Err(e) = self.store(request, response) {
            debug!("Cache store skipped: {}", e);
        }
    }
}
