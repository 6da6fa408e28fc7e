// src/testing.rs
//! 테스트 유틸리티
//!
//! 실제 API 호출 없이 시퀀스를 끝까지 돌리기 위한 대역들:
//! - `ScriptedLLM`: 미리 정한 응답을 순서대로 돌려주는 LLMProvider
//! - `FixedModelResolver`: 모든 모델 id를 같은 provider로 해석
//! - `StubAgentRuntime`: 에이전트별 고정 응답을 돌려주고 실행 기록을 남기는 런타임

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::SequenceError;
use crate::llm::{LLMConfig, LLMProvider, LLMResponse};
use crate::runtime::{
    AgentBlueprint, AgentInput, AgentResponse, AgentRuntime, ModelResolver, RunnableAgent, StructuredResponse,
};
use crate::state::Message;
use crate::tools::{invoke, ToolDefinition};

/// 순서대로 응답하는 LLM. 응답이 떨어지면 마지막 응답을 반복합니다.
#[derive(Debug)]
pub struct ScriptedLLM {
    responses: Vec<Message>,
    call_count: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLLM {
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 항상 같은 JSON 답변을 돌려주는 LLM
    pub fn answering(answer: Value) -> Self {
        Self::new(vec![Message::assistant(&answer.to_string())])
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// 호출마다 전달된 메시지 목록
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLLM {
    async fn complete(
        &self,
        messages: &[Message],
        _tools: &[ToolDefinition],
        _config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, SequenceError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let message = self
            .responses
            .get(count)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_else(|| Message::assistant("Default response"));
        Ok(LLMResponse::new(message))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }
}

/// 모델 id와 무관하게 같은 provider를 돌려주는 해석기
pub struct FixedModelResolver {
    llm: Arc<dyn LLMProvider>,
    resolved: Mutex<Vec<String>>,
}

impl FixedModelResolver {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            llm,
            resolved: Mutex::new(Vec::new()),
        }
    }

    /// 해석 요청된 모델 id 목록
    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ModelResolver for FixedModelResolver {
    fn resolve(&self, model_id: &str, _config: &LLMConfig) -> Result<Arc<dyn LLMProvider>, SequenceError> {
        if let Ok(mut resolved) = self.resolved.lock() {
            resolved.push(model_id.to_string());
        }
        Ok(Arc::clone(&self.llm))
    }
}

/// 스텁 에이전트 한 번의 실행 기록
#[derive(Debug, Clone)]
pub struct RecordedRun {
    pub agent_id: String,
    pub messages: Vec<Message>,
    pub context: Map<String, Value>,
    /// 실행 중 호출한 도구와 그 결과
    pub tool_results: Vec<(String, Result<Value, String>)>,
}

/// 빌드된 에이전트 요약
#[derive(Debug, Clone)]
pub struct RecordedBuild {
    pub agent_id: String,
    pub model: String,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Default)]
struct StubState {
    responses: HashMap<String, VecDeque<Value>>,
    tool_calls: HashMap<String, Vec<(String, Map<String, Value>)>>,
    runs: Vec<RecordedRun>,
    builds: Vec<RecordedBuild>,
}

/// 에이전트 id별 고정 응답을 돌려주는 런타임
///
/// 응답이 여러 개면 순서대로, 마지막 하나는 계속 반복합니다. 응답이 등록되지
/// 않은 에이전트는 `AgentExecution` 에러로 실패합니다.
#[derive(Clone, Default)]
pub struct StubAgentRuntime {
    state: Arc<Mutex<StubState>>,
}

impl StubAgentRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, agent_id: impl Into<String>, response: Value) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.responses.entry(agent_id.into()).or_default().push_back(response);
        }
        self
    }

    /// 답하기 전에 지정한 도구를 호출하게 합니다
    pub fn with_tool_call(self, agent_id: impl Into<String>, tool_name: impl Into<String>, args: Value) -> Self {
        let args = args.as_object().cloned().unwrap_or_default();
        if let Ok(mut state) = self.state.lock() {
            state
                .tool_calls
                .entry(agent_id.into())
                .or_default()
                .push((tool_name.into(), args));
        }
        self
    }

    pub fn runs(&self) -> Vec<RecordedRun> {
        self.state.lock().map(|s| s.runs.clone()).unwrap_or_default()
    }

    pub fn runs_of(&self, agent_id: &str) -> Vec<RecordedRun> {
        self.runs().into_iter().filter(|r| r.agent_id == agent_id).collect()
    }

    pub fn builds(&self) -> Vec<RecordedBuild> {
        self.state.lock().map(|s| s.builds.clone()).unwrap_or_default()
    }
}

impl AgentRuntime for StubAgentRuntime {
    fn build(&self, blueprint: AgentBlueprint) -> Result<Arc<dyn RunnableAgent>, SequenceError> {
        if let Ok(mut state) = self.state.lock() {
            state.builds.push(RecordedBuild {
                agent_id: blueprint.agent_id.clone(),
                model: blueprint.model.clone(),
                tools: blueprint.tools.iter().map(|t| t.definition().clone()).collect(),
            });
        }
        Ok(Arc::new(StubAgent {
            blueprint,
            state: Arc::clone(&self.state),
        }))
    }
}

struct StubAgent {
    blueprint: AgentBlueprint,
    state: Arc<Mutex<StubState>>,
}

impl StubAgent {
    fn next_response(&self) -> Option<Value> {
        let mut state = self.state.lock().ok()?;
        let queue = state.responses.get_mut(&self.blueprint.agent_id)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    fn scripted_tool_calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.tool_calls.get(&self.blueprint.agent_id).cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RunnableAgent for StubAgent {
    fn agent_id(&self) -> &str {
        &self.blueprint.agent_id
    }

    async fn run(&self, input: AgentInput) -> Result<AgentResponse, SequenceError> {
        let mut tool_results = Vec::new();
        for (tool_name, args) in self.scripted_tool_calls() {
            let result = match self.blueprint.tools.iter().find(|t| t.name() == tool_name) {
                Some(tool) => invoke(tool, &args).await.map_err(|e| e.to_string()),
                None => Err(format!("Unknown tool: {tool_name}")),
            };
            tool_results.push((tool_name, result));
        }

        if let Ok(mut state) = self.state.lock() {
            state.runs.push(RecordedRun {
                agent_id: self.blueprint.agent_id.clone(),
                messages: input.messages.clone(),
                context: input.context.clone(),
                tool_results,
            });
        }

        let response = self.next_response().ok_or_else(|| {
            SequenceError::agent_execution(&self.blueprint.agent_id, "no stub response configured")
        })?;
        let structured = match response {
            Value::String(text) => StructuredResponse::Text(text),
            other => StructuredResponse::Json(other),
        };

        Ok(AgentResponse {
            structured,
            messages: input.messages,
            usage: Default::default(),
        })
    }
}
