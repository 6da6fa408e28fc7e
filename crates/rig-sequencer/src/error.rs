// src/error.rs
//! 에러 타입 정의
//!
//! 시퀀스 실행 중 발생하는 모든 치명적 에러는 `SequenceError` 하나로 모입니다.
//! 도구 구현은 `ToolError`를 반환하고, 호출 측에서 도구 이름과 함께
//! `SequenceError::ToolExecution`으로 감쌉니다.

use thiserror::Error;

/// 도구 구현이 반환하는 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Blocking task failed: {0}")]
    Join(String),
}

impl ToolError {
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}

/// 시퀀스 엔진 최상위 에러
#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("Sequence {0} not found")]
    SequenceNotFound(String),

    #[error("Agent {0} not found")]
    AgentNotFound(String),

    #[error("Tool {0} not found")]
    ToolNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Missing key '{key}' in state for argument '{argument}'")]
    MissingContextKey { key: String, argument: String },

    #[error("Missing key '{key}' in context for agent {agent_id}")]
    MissingPromptKey { key: String, agent_id: String },

    #[error("Tool {0} has no ainvoke/arun/invoke entrypoint")]
    ToolInterface(String),

    #[error("Unknown step type: {0}")]
    UnknownStepType(String),

    #[error("Cyclic agent dependency: {}", .0.join(" -> "))]
    CyclicAgentDependency(Vec<String>),

    #[error("Tool {tool} failed: {source}")]
    ToolExecution {
        tool: String,
        #[source]
        source: ToolError,
    },

    #[error("Agent {agent_id} failed: {message}")]
    AgentExecution { agent_id: String, message: String },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Must call load_configurations() first")]
    NotLoaded,

    #[error("Run cancelled before step {0}")]
    Cancelled(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SequenceError {
    pub fn tool_execution(tool: impl Into<String>, source: ToolError) -> Self {
        Self::ToolExecution { tool: tool.into(), source }
    }

    pub fn agent_execution(agent_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AgentExecution {
            agent_id: agent_id.into(),
            message: message.into(),
        }
    }

    /// 선언된 설정 자체가 잘못된 경우 (재시도해도 소용없음)
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::SequenceNotFound(_)
                | Self::AgentNotFound(_)
                | Self::ToolNotFound(_)
                | Self::InvalidConfiguration(_)
                | Self::CyclicAgentDependency(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SequenceError>;
