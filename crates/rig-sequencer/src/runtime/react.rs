// src/runtime/react.rs
//! ReAct 에이전트 - LLM 호출 및 도구 실행 루프
//!
//! 1. 출력 계약 지시문을 시스템 프롬프트에 덧붙임
//! 2. LLM 호출
//! 3. 도구 호출이 있으면 정규화 계층을 통해 실행하고 결과를 대화에 추가
//! 4. 도구 호출 없는 답변이 나오거나 max_iterations에 도달할 때까지 반복
//! 5. 최종 답변을 출력 계약에 따라 디코드

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::SequenceError;
use crate::llm::{LLMConfig, LLMProvider, TokenUsage};
use crate::prompt::value_to_text;
use crate::state::{Message, Role, ToolCall};
use crate::tools::{invoke, CallableTool, ToolDefinition};
use super::models::{ModelResolver, RigModelResolver};
use super::{decode_final_answer, AgentBlueprint, AgentInput, AgentResponse, AgentRuntime, RunnableAgent};

const DEFAULT_MAX_ITERATIONS: usize = 10;

/// LLMProvider 위에서 도구 호출 루프를 돌리는 런타임
#[derive(Clone)]
pub struct ReactAgentRuntime {
    resolver: Arc<dyn ModelResolver>,
    config: LLMConfig,
    max_iterations: usize,
}

impl ReactAgentRuntime {
    pub fn new(resolver: Arc<dyn ModelResolver>) -> Self {
        Self {
            resolver,
            config: LLMConfig::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// rig-core 제공자를 쓰는 기본 런타임
    pub fn with_rig_models() -> Self {
        Self::new(Arc::new(RigModelResolver::new()))
    }

    /// 모든 에이전트 호출에 적용할 샘플링 설정
    pub fn with_config(mut self, config: LLMConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }
}

impl AgentRuntime for ReactAgentRuntime {
    fn build(&self, blueprint: AgentBlueprint) -> Result<Arc<dyn RunnableAgent>, SequenceError> {
        let llm = self.resolver.resolve(&blueprint.model, &self.config)?;
        let config = self.config.for_model(llm.default_model().to_string());
        Ok(Arc::new(ReactAgent::new(blueprint, llm)
            .with_config(config)
            .with_max_iterations(self.max_iterations)))
    }
}

/// 조립이 끝난 ReAct 에이전트
pub struct ReactAgent {
    blueprint: AgentBlueprint,
    llm: Arc<dyn LLMProvider>,
    config: Option<LLMConfig>,
    max_iterations: usize,
}

impl ReactAgent {
    pub fn new(blueprint: AgentBlueprint, llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            blueprint,
            llm,
            config: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_config(mut self, config: LLMConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// 출력 계약 지시문을 첫 시스템 메시지에 붙이거나 새로 추가
    fn with_output_instructions(&self, mut messages: Vec<Message>) -> Vec<Message> {
        let Some(instructions) = self.blueprint.output.instructions() else {
            return messages;
        };
        match messages.iter_mut().find(|m| m.role == Role::System) {
            Some(system) => {
                system.content.push_str("\n\n");
                system.content.push_str(&instructions);
            }
            None => messages.insert(0, Message::system(&instructions)),
        }
        messages
    }

    /// 도구 호출 실행 (에러는 모델에게 텍스트로 돌려줍니다)
    async fn execute_tool_call(&self, call: &ToolCall) -> String {
        let tool = self.blueprint.tools.iter().find(|t| t.name() == call.name);

        match tool {
            Some(t) => {
                let args = match &call.arguments {
                    Value::Object(map) => map.clone(),
                    Value::Null => Map::new(),
                    other => {
                        return format!("Tool error: arguments for {} must be a JSON object, got {}", call.name, other)
                    }
                };
                match invoke(t, &args).await {
                    Ok(result) => value_to_text(&result),
                    Err(e) => format!("Tool error: {}", e),
                }
            }
            None => format!("Unknown tool: {}", call.name),
        }
    }
}

#[async_trait]
impl RunnableAgent for ReactAgent {
    fn agent_id(&self) -> &str {
        &self.blueprint.agent_id
    }

    async fn run(&self, input: AgentInput) -> Result<AgentResponse, SequenceError> {
        let agent_id = self.blueprint.agent_id.as_str();
        let mut messages = self.with_output_instructions(input.messages);
        let tool_definitions: Vec<ToolDefinition> =
            self.blueprint.tools.iter().map(|t| t.definition().clone()).collect();
        let mut usage = TokenUsage::default();
        let mut final_answer = None;

        tracing::info!(
            agent_id = %agent_id,
            provider = %self.llm.name(),
            tools = tool_definitions.len(),
            "Agent run starting"
        );

        for iteration in 0..self.max_iterations {
            tracing::debug!(agent_id = %agent_id, iteration, "Agent iteration");

            let llm_response = self
                .llm
                .complete(&messages, &tool_definitions, self.config.as_ref())
                .await?;
            if let Some(u) = llm_response.usage {
                usage += u;
            }

            let response = llm_response.message;
            messages.push(response.clone());

            // 도구 호출이 없으면 종료
            if !response.has_tool_calls() {
                final_answer = Some(response.content);
                break;
            }

            if let Some(tool_calls) = &response.tool_calls {
                for call in tool_calls {
                    tracing::debug!(agent_id = %agent_id, tool_name = %call.name, "Agent tool call");
                    let result = self.execute_tool_call(call).await;
                    messages.push(Message::tool(&result, &call.id));
                }
            }
        }

        let Some(answer) = final_answer else {
            return Err(SequenceError::agent_execution(
                agent_id,
                format!("no final answer after {} iterations", self.max_iterations),
            ));
        };

        let structured = decode_final_answer(&answer, &self.blueprint.output)
            .map_err(|reason| SequenceError::agent_execution(agent_id, reason))?;

        tracing::info!(
            agent_id = %agent_id,
            total_tokens = usage.total_tokens,
            "Agent run finished"
        );

        Ok(AgentResponse {
            structured,
            messages,
            usage,
        })
    }
}
