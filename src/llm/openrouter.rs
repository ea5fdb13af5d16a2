use anyhow::anyhow;
use async_trait::async_trait;
use rig::completion::Prompt;
use rig::providers::openrouter;
use tracing::debug;

use super::{CompletionBackend, LlmRequest, LlmResponse};

/// Hosted model reached through OpenRouter
pub struct OpenRouterBackend {
    client: openrouter::Client,
}

impl OpenRouterBackend {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: openrouter::Client::new(api_key),
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| anyhow!("OPENROUTER_API_KEY not set"))?;
        Ok(Self::new(&api_key))
    }
}

#[async_trait]
impl CompletionBackend for OpenRouterBackend {
    async fn complete(&self, request: &LlmRequest) -> anyhow::Result<LlmResponse> {
        let prompt = request
            .rendered_prompt()
            .ok_or_else(|| anyhow!("request has no prompt"))?;

        let mut builder = self
            .client
            .agent(&request.model)
            .preamble(&request.instruction);
        if let Some(max_tokens) = request.max_output_tokens() {
            builder = builder.max_tokens(max_tokens);
        }
        let agent = builder.build();

        debug!("Prompting {} with {} chars", request.model, prompt.len());
        let text = agent.prompt(prompt).await?;
        Ok(LlmResponse::text(text))
    }
}
