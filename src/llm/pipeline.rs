use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{LlmRequest, LlmResponse};

/// Interceptor around a model call.
///
/// `before_call` may answer the request itself, in which case the backend is
/// skipped. `after_call` sees every response the pipeline returns. Hooks must
/// not fail: they log and carry on.
pub trait ModelHook: Send + Sync {
    fn before_call(&self, request: &LlmRequest) -> Option<LlmResponse>;

    fn after_call(&self, request: &LlmRequest, response: &LlmResponse);
}

/// The expensive downstream call (a hosted model)
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> anyhow::Result<LlmResponse>;
}

/// Backend call wrapped by an ordered list of hooks
#[derive(Clone)]
pub struct ModelPipeline {
    backend: Arc<dyn CompletionBackend>,
    hooks: Vec<Arc<dyn ModelHook>>,
}

impl ModelPipeline {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn ModelHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Run the hooks, then the backend unless a hook answered first.
    pub async fn dispatch(&self, request: &LlmRequest) -> anyhow::Result<LlmResponse> {
        if let Some(response) = self.lookup(request) {
            return Ok(response);
        }
        self.complete(request).await
    }

    /// Ask the `before_call` hooks only. `None` means the backend must be called.
    pub fn lookup(&self, request: &LlmRequest) -> Option<LlmResponse> {
        let response = self.hooks.iter().find_map(|hook| hook.before_call(request))?;
        debug!(model = %request.model, "Request answered by hook");
        Some(response)
    }

    /// Call the backend and show the response to every `after_call` hook.
    pub async fn complete(&self, request: &LlmRequest) -> anyhow::Result<LlmResponse> {
        info!(model = %request.model, "Calling model backend");
        let response = self
            .backend
            .complete(request)
            .await
            .with_context(|| format!("model call to {} failed", request.model))?;

        for hook in &self.hooks {
            hook.after_call(request, &response);
        }
        Ok(response)
    }
}
