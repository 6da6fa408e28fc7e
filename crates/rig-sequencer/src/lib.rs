//! rig-sequencer: declarative tool/agent sequences for Rig
//!
//! 설정으로 선언된 스텝 목록(도구 호출, LLM 에이전트)을 순서대로 실행합니다.
//! - Context Resolver: 클라이언트 설정 < 실행 상태 < 스텝 인자
//! - Invocation Normalizer: 네 가지 도구 호출 형태를 하나의 async 계약으로
//! - AgentComposer: 프롬프트 렌더링, 도구 바인딩, 하위 에이전트를 도구로 래핑
//! - WorkflowCompiler: 스텝 목록 → START → ... → END 선형 그래프
//! - SequenceRunner: 로드 → 세션 열기 → 컴파일 → 실행 → 세션 닫기
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rig_sequencer::{
//!     handle, HandlerDeps, InMemoryConfigLoader, ReactAgentRuntime,
//!     SequenceRunnerPayload, StaticToolTransport,
//! };
//!
//! let deps = HandlerDeps::new(
//!     Arc::new(InMemoryConfigLoader::demo()?),
//!     Arc::new(StaticToolTransport::new(my_tools)),
//!     Arc::new(ReactAgentRuntime::with_rig_models()),
//! );
//! let response = handle(payload, &deps).await;
//! println!("{}", response.body);
//! ```

pub mod error;
pub mod state;
pub mod sequence;
pub mod agent;
pub mod prompt;
pub mod context;
pub mod tools;
pub mod schema;
pub mod llm;
pub mod compat;
pub mod runtime;
pub mod composer;
pub mod workflow;
pub mod loader;
pub mod runner;
pub mod handler;
pub mod config;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-exports for convenience
pub use error::{SequenceError, ToolError, Result};
pub use state::{Message, Role, SessionState, ToolCall};
pub use sequence::{Argument, Arguments, Sequence, SkipConditions, Step, StepKind};
pub use agent::{AgentDefinition, Dependency, PromptMessage, PromptRole};
pub use prompt::{render_prompt, render_template, TemplateError};
pub use context::{resolve_arguments, resolve_context, resolve_dynamic};
pub use tools::{
    decode_tool_output, invoke,
    AcceptedArguments, AsyncInvoke, BlockingInvoke, CallableTool, DualInvoke, Invocation,
    LegacyRun, StaticToolTransport, ToolCapabilities, ToolDefinition, ToolRegistry,
    ToolSession, ToolShape, ToolTransport,
};
pub use schema::OutputContract;
pub use runtime::{
    AgentBlueprint, AgentInput, AgentResponse, AgentRuntime, ModelResolver, ReactAgent,
    ReactAgentRuntime, RigModelResolver, RunnableAgent, StructuredResponse,
};
pub use composer::{AgentComposer, BuildContext, ComposedAgent};
pub use workflow::{CompiledSequence, StepNode, WorkflowCompiler};
pub use loader::{Catalog, ConfigLoader, FileConfigLoader, InMemoryConfigLoader};
pub use runner::{RunRequest, SequenceRunner};
pub use handler::{handle, handle_with_cancellation, HandlerDeps, SequenceRunnerPayload, SequenceRunnerResponse};
pub use config::RunnerConfig;

// LLM Provider exports
pub use llm::{LLMConfig, LLMProvider, LLMResponse, TokenUsage};

// Rig compatibility layer exports
pub use compat::{RigAgentAdapter, RigToolAdapter};
