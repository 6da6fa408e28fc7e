// src/runtime/mod.rs
//! 에이전트 런타임 경계
//!
//! 컴포저는 모델 id, 도구 집합, 출력 계약을 `AgentBlueprint`로 넘기고,
//! 런타임은 "이 메시지로 실행" 가능한 `RunnableAgent`를 돌려줍니다.
//! 기본 구현은 `react::ReactAgentRuntime` (LLMProvider 위의 도구 호출 루프).

pub mod models;
pub mod react;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::SequenceError;
use crate::llm::TokenUsage;
use crate::schema::OutputContract;
use crate::state::Message;
use crate::tools::CallableTool;

pub use models::{parse_model_id, ModelProvider, ModelResolver, RigModelResolver};
pub use react::{ReactAgent, ReactAgentRuntime};

/// 런타임에 넘기는 조립 결과
#[derive(Debug, Clone)]
pub struct AgentBlueprint {
    pub agent_id: String,
    pub name: String,
    pub model: String,
    /// 컨텍스트가 묶인 도구와 하위 에이전트 도구
    pub tools: Vec<CallableTool>,
    pub output: OutputContract,
}

/// 한 번의 에이전트 실행 입력
#[derive(Debug, Clone, Default)]
pub struct AgentInput {
    /// 렌더링된 프롬프트 메시지
    pub messages: Vec<Message>,
    /// 에이전트의 최종 컨텍스트
    pub context: Map<String, Value>,
}

/// 에이전트의 구조화된 응답
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredResponse {
    /// 계약에 맞게 디코드된 JSON
    Json(Value),
    /// 디코드할 수 없는 자유 형식 텍스트
    Text(String),
}

impl StructuredResponse {
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => Value::String(text),
        }
    }
}

/// 에이전트 실행 결과
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub structured: StructuredResponse,
    /// 실행 중 누적된 전체 대화
    pub messages: Vec<Message>,
    pub usage: TokenUsage,
}

impl AgentResponse {
    pub fn new(structured: StructuredResponse) -> Self {
        Self {
            structured,
            messages: Vec::new(),
            usage: TokenUsage::default(),
        }
    }
}

/// 실행 가능한 에이전트
#[async_trait]
pub trait RunnableAgent: Send + Sync {
    fn agent_id(&self) -> &str;

    async fn run(&self, input: AgentInput) -> Result<AgentResponse, SequenceError>;
}

/// 에이전트 런타임
pub trait AgentRuntime: Send + Sync {
    fn build(&self, blueprint: AgentBlueprint) -> Result<Arc<dyn RunnableAgent>, SequenceError>;
}

/// ```json ... ``` 펜스 제거
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // 첫 줄의 언어 태그 제거
    match body.split_once('\n') {
        Some((tag, inner)) if !tag.trim().contains(['{', '[']) => inner.trim(),
        _ => body.trim(),
    }
}

/// 모델의 최종 답변을 출력 계약에 따라 디코드
pub fn decode_final_answer(text: &str, contract: &OutputContract) -> Result<StructuredResponse, String> {
    let body = strip_code_fence(text);

    if !contract.is_structured() {
        return Ok(match serde_json::from_str::<Value>(body) {
            Ok(value @ Value::Object(_)) => StructuredResponse::Json(value),
            _ => StructuredResponse::Text(text.to_string()),
        });
    }

    let value: Value = serde_json::from_str(body).map_err(|e| format!("final answer is not valid JSON: {e}"))?;
    contract.validate(&value)?;
    Ok(StructuredResponse::Json(value))
}
