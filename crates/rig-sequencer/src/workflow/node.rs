// src/workflow/node.rs
//! 스텝 노드 - 선언된 스텝 하나를 `(state) -> state` 변환으로 실행
//!
//! 1. 스킵 조건이 하나라도 맞으면 상태를 그대로 반환
//! 2. tool: 도구 조회 → 컨텍스트 해석 → 호출 → 문자열 결과 JSON 파싱
//! 3. agent: 컴포저로 조립 → 실행 → 구조화 응답 추출
//! 4. 결과 병합: output_key / 객체 병합 / `<id>_result`

use serde_json::Value;
use std::sync::Arc;

use crate::composer::AgentComposer;
use crate::context::resolve_context;
use crate::error::SequenceError;
use crate::sequence::{Step, StepKind};
use crate::state::SessionState;
use crate::tools::{decode_tool_output, invoke, ToolRegistry};

/// 컴파일된 그래프의 노드 하나
#[derive(Clone)]
pub struct StepNode {
    name: String,
    step: Step,
    tools: Arc<ToolRegistry>,
    composer: Arc<AgentComposer>,
}

impl std::fmt::Debug for StepNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepNode")
            .field("name", &self.name)
            .field("step", &self.step)
            .finish()
    }
}

impl StepNode {
    pub fn new(
        name: impl Into<String>,
        step: Step,
        tools: Arc<ToolRegistry>,
        composer: Arc<AgentComposer>,
    ) -> Self {
        Self {
            name: name.into(),
            step,
            tools,
            composer,
        }
    }

    /// 그래프 안에서의 노드 이름 (중복 id면 `#n` 접미사)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step(&self) -> &Step {
        &self.step
    }

    /// 맞는 스킵 조건이 있으면 그 키
    pub fn skip_reason(&self, state: &SessionState) -> Option<&str> {
        self.step
            .skip_conditions
            .iter()
            .find(|(key, expected)| state.matches_flag(key, **expected))
            .map(|(key, _)| key.as_str())
    }

    pub async fn execute(&self, mut state: SessionState) -> Result<SessionState, SequenceError> {
        let step_id = self.step.id.as_str();
        let kind = self.step.kind.as_str();

        if let Some(key) = self.skip_reason(&state) {
            tracing::info!(step_id = %step_id, kind = %kind, condition = %key, "Skipping step");
            return Ok(state);
        }

        tracing::info!(step_id = %step_id, kind = %kind, node = %self.name, "Executing step");

        let output = match &self.step.kind {
            StepKind::Tool => self.run_tool(&state).await?,
            StepKind::Agent => self.run_agent(&state).await?,
            StepKind::Unknown(other) => return Err(SequenceError::UnknownStepType(other.clone())),
        };

        let written = merge_output(&mut state, &self.step, output);
        tracing::info!(step_id = %step_id, kind = %kind, written = ?written, "Step finished");

        Ok(state)
    }

    async fn run_tool(&self, state: &SessionState) -> Result<Value, SequenceError> {
        let tool = self
            .tools
            .get(&self.step.id)
            .ok_or_else(|| SequenceError::ToolNotFound(self.step.id.clone()))?;
        let context = resolve_context(&self.step.arguments, state, self.composer.client_config())?;
        let raw = invoke(tool, &context).await?;
        Ok(decode_tool_output(raw))
    }

    async fn run_agent(&self, state: &SessionState) -> Result<Value, SequenceError> {
        let composed = self
            .composer
            .create_agent(&self.step.id, &self.tools, state, &self.step.arguments)?;
        let response = composed.agent.run(composed.input()).await?;
        Ok(response.structured.into_value())
    }
}

/// 스텝 결과를 상태에 반영하고 쓴 키 목록을 돌려줍니다
///
/// 객체 결과의 키가 기존 상태 키와 겹치면 덮어씁니다.
pub fn merge_output(state: &mut SessionState, step: &Step, output: Value) -> Vec<String> {
    if let Some(key) = &step.output_key {
        state.insert(key.clone(), output);
        return vec![key.clone()];
    }

    match output {
        Value::Object(map) => {
            let keys: Vec<String> = map.keys().cloned().collect();
            state.merge(map);
            keys
        }
        other => {
            let key = step.default_result_key();
            state.insert(key.clone(), other);
            vec![key]
        }
    }
}
