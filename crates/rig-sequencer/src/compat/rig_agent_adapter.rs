//! Adapter for using Rig Agents as `LLMProvider`
//!
//! # Architecture Note
//!
//! Rig configures tools at agent build time and runs its own tool loop inside
//! `PromptRequest`. Sequence agents get their tools per run (context-bound
//! wrappers, sub-agent tools), so `ReactAgent` owns the loop instead:
//!
//! 1. The whole transcript plus the tool schemas is rendered into one prompt
//! 2. The Rig agent answers either with a `tool_calls` JSON object or text
//! 3. `ReactAgent` executes the calls and asks again
//!
//! ```rust,ignore
//! use rig::client::{CompletionClient, ProviderClient};
//!
//! let agent = rig::providers::openai::Client::from_env()
//!     .agent("gpt-4.1")
//!     .temperature(0.0)
//!     .build();
//! let provider = RigAgentAdapter::with_names(agent, "openai", "gpt-4.1");
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use rig::agent::Agent;
use rig::completion::{CompletionModel, Prompt};

use crate::error::SequenceError;
use crate::llm::{LLMConfig, LLMProvider, LLMResponse};
use crate::state::{Message, Role, ToolCall};
use crate::tools::ToolDefinition;

/// Adapter that wraps a Rig `Agent<M>` to implement `LLMProvider`.
pub struct RigAgentAdapter<M>
where
    M: CompletionModel + Send + Sync,
{
    agent: Arc<Agent<M>>,
    provider_name: String,
    model_name: String,
}

impl<M> RigAgentAdapter<M>
where
    M: CompletionModel + Send + Sync,
{
    pub fn new(agent: Agent<M>) -> Self {
        Self::with_names(agent, "rig", "rig-agent")
    }

    /// Create adapter with provider/model names for logging.
    pub fn with_names(
        agent: Agent<M>,
        provider_name: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self {
            agent: Arc::new(agent),
            provider_name: provider_name.into(),
            model_name: model_name.into(),
        }
    }
}

#[async_trait]
impl<M> LLMProvider for RigAgentAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        _config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, SequenceError> {
        // Sampling settings are fixed when the Rig agent is built
        let prompt = build_prompt_with_tools(messages, tools);

        tracing::debug!(
            provider = %self.provider_name,
            model = %self.model_name,
            prompt_chars = prompt.len(),
            "Calling Rig agent"
        );

        let response = self
            .agent
            .prompt(&prompt)
            .await
            .map_err(|e| SequenceError::Llm(format!("Rig agent error: {}", e)))?;

        Ok(LLMResponse::new(parse_response_for_tool_calls(&response)))
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn default_model(&self) -> &str {
        &self.model_name
    }
}

/// Render the full transcript (and tool schemas) as a single prompt.
fn build_prompt_with_tools(messages: &[Message], tools: &[ToolDefinition]) -> String {
    let mut prompt_parts = Vec::new();

    if !tools.is_empty() {
        prompt_parts.push(build_tools_section(tools));
    }

    for message in messages {
        let part = match message.role {
            Role::System => format!("System:\n{}", message.content),
            Role::User => format!("User:\n{}", message.content),
            Role::Assistant => match &message.tool_calls {
                Some(calls) if !calls.is_empty() => format!(
                    "Assistant (tool calls):\n{}",
                    serde_json::json!({ "tool_calls": calls })
                ),
                _ => format!("Assistant:\n{}", message.content),
            },
            Role::Tool => format!(
                "Tool result ({}):\n{}",
                message.tool_call_id.as_deref().unwrap_or("unknown"),
                message.content
            ),
        };
        prompt_parts.push(part);
    }

    prompt_parts.join("\n\n")
}

/// Build a tools description section for the prompt.
fn build_tools_section(tools: &[ToolDefinition]) -> String {
    let mut section = String::from("You have access to the following tools:\n\n");

    for tool in tools {
        section.push_str(&format!(
            "**{}**: {}\nParameters: {}\n\n",
            tool.name,
            tool.description,
            serde_json::to_string_pretty(&tool.parameters).unwrap_or_default()
        ));
    }

    section.push_str(
        "To use a tool, respond with a JSON object in this format:\n\
         {\"tool_calls\": [{\"id\": \"unique_id\", \"name\": \"tool_name\", \"arguments\": {...}}]}\n\n\
         Or respond normally if no tool is needed.",
    );

    section
}

/// Parse LLM response for potential tool calls.
///
/// A `tool_calls` object (optionally inside a ```json fence) becomes tool
/// calls, anything else is a normal text answer.
fn parse_response_for_tool_calls(response: &str) -> Message {
    let body = crate::runtime::strip_code_fence(response);
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(tool_calls_val) = parsed.get("tool_calls") {
            if let Ok(tool_calls) = serde_json::from_value::<Vec<ToolCallJson>>(tool_calls_val.clone()) {
                if !tool_calls.is_empty() {
                    let calls: Vec<ToolCall> = tool_calls
                        .into_iter()
                        .enumerate()
                        .map(|(i, tc)| ToolCall {
                            id: tc.id.unwrap_or_else(|| format!("call_{i}")),
                            name: tc.name,
                            arguments: tc.arguments,
                        })
                        .collect();
                    return Message::assistant_with_tool_calls("", calls);
                }
            }
        }
    }

    Message::assistant(response)
}

#[derive(serde::Deserialize)]
struct ToolCallJson {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

impl<M> std::fmt::Debug for RigAgentAdapter<M>
where
    M: CompletionModel + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigAgentAdapter")
            .field("provider_name", &self.provider_name)
            .field("model_name", &self.model_name)
            .finish()
    }
}
