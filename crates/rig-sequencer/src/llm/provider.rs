//! LLM Provider trait definition
//!
//! The agent runtime talks to models only through this trait, so tests can
//! swap in a scripted provider and production code wraps rig-core agents
//! (see `compat::RigAgentAdapter`).

use async_trait::async_trait;

use crate::error::SequenceError;
use crate::state::Message;
use crate::tools::ToolDefinition;
use super::config::{LLMConfig, TokenUsage};

/// LLM completion response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub message: Message,
    /// Token usage statistics (if available from provider)
    pub usage: Option<TokenUsage>,
}

impl LLMResponse {
    pub fn new(message: Message) -> Self {
        Self { message, usage: None }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Core LLM Provider trait
///
/// # Arguments
/// * `messages` - Conversation so far, system preamble first
/// * `tools` - Tools the model may call
/// * `config` - Optional per-call sampling overrides
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, SequenceError>;

    /// Provider name for logging (e.g. "openai")
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;
}
