pub mod openrouter;
pub mod pipeline;

pub use openrouter::OpenRouterBackend;
pub use pipeline::{CompletionBackend, ModelHook, ModelPipeline};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::ExtraConfig;

pub mod config_keys {
    pub const AGENT: &str = "agent";
    pub const MAX_OUTPUT_TOKENS: &str = "max_output_tokens";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Outbound model request as seen by the pipeline and its hooks
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub model: String,
    /// System instruction (agent preamble)
    pub instruction: String,
    /// Retrieved material shown to the model ahead of the question
    pub context: Option<String>,
    pub prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub config: ExtraConfig,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Text used to fingerprint the request: the explicit prompt, otherwise the
    /// content of the last message.
    pub fn cache_prompt(&self) -> Option<&str> {
        self.prompt
            .as_deref()
            .filter(|p| !p.is_empty())
            .or_else(|| self.messages.last().map(|m| m.content.as_str()))
            .filter(|p| !p.is_empty())
    }

    /// Full text sent to the model, context first.
    pub fn rendered_prompt(&self) -> Option<String> {
        let question = self.cache_prompt()?;
        Some(match &self.context {
            Some(context) if !context.trim().is_empty() => {
                format!("{}\n\nUser question:\n{}", context, question)
            }
            _ => question.to_string(),
        })
    }

    pub fn max_output_tokens(&self) -> Option<u64> {
        self.config
            .get(config_keys::MAX_OUTPUT_TOKENS)
            .and_then(Value::as_u64)
    }
}

/// Model response; `cached` marks answers served by a hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResponse {
    pub text: Option<String>,
    pub cached: bool,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            cached: false,
        }
    }

    pub fn from_cache(text: String) -> Self {
        Self {
            text: Some(text),
            cached: true,
        }
    }
}
