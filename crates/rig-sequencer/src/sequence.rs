// src/sequence.rs
//! 시퀀스 / 스텝 선언 모델
//!
//! 설정 저장소에서 읽어 온 그대로의 불변 선언입니다. 실행 가능한 그래프로의
//! 변환은 `workflow::WorkflowCompiler`가 담당합니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// 스텝 인자 하나
///
/// ```json
/// {"type": "static", "value": "bobola-dealership"}
/// {"type": "dynamic", "value": "incoming_message[content]"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Argument {
    /// 그대로 사용되는 리터럴
    Static(Value),
    /// 실행 시점에 상태에서 해석되는 경로 표현식 또는 `{path}` 템플릿
    Dynamic(String),
}

impl Argument {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }
}

/// 인자 이름 → 인자 (선언 순서와 무관하게 결정적으로 순회)
pub type Arguments = BTreeMap<String, Argument>;

/// 상태 키 → 기대값. 하나라도 일치하면 스텝을 건너뜁니다.
pub type SkipConditions = BTreeMap<String, bool>;

/// 스텝 종류
///
/// 알 수 없는 문자열도 로드 단계에서는 보존하고, 실행 시점에
/// `UnknownStepType`으로 보고합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepKind {
    Tool,
    Agent,
    Unknown(String),
}

impl StepKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Tool => "tool",
            Self::Agent => "agent",
            Self::Unknown(other) => other,
        }
    }
}

impl From<String> for StepKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "tool" => Self::Tool,
            "agent" => Self::Agent,
            _ => Self::Unknown(value),
        }
    }
}

impl From<StepKind> for String {
    fn from(kind: StepKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 선언된 스텝
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "type")]
    pub kind: StepKind,

    /// 호출할 도구 또는 에이전트 id
    pub id: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: Arguments,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub skip_conditions: SkipConditions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

impl Step {
    fn new(kind: StepKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            arguments: Arguments::new(),
            skip_conditions: SkipConditions::new(),
            output_key: None,
        }
    }

    pub fn tool(id: impl Into<String>) -> Self {
        Self::new(StepKind::Tool, id)
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self::new(StepKind::Agent, id)
    }

    pub fn with_static_arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(name.into(), Argument::Static(value));
        self
    }

    pub fn with_dynamic_arg(mut self, name: impl Into<String>, expr: impl Into<String>) -> Self {
        self.arguments.insert(name.into(), Argument::Dynamic(expr.into()));
        self
    }

    pub fn skip_when(mut self, key: impl Into<String>, expected: bool) -> Self {
        self.skip_conditions.insert(key.into(), expected);
        self
    }

    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// 결과 병합 시 사용하는 기본 키
    pub fn default_result_key(&self) -> String {
        format!("{}_result", self.id)
    }
}

/// 이름 붙은 스텝 목록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub id: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Sequence {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }
}
