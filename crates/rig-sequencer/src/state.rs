// src/state.rs
//! 실행 상태 정의
//!
//! - `SessionState`: 한 번의 시퀀스 실행 동안 모든 스텝이 공유하는 키-값 상태
//! - `Message`: 에이전트 런타임에 전달되는 대화 메시지
//!
//! 상태 키는 경로 표현식(`incoming_message[content]`, `reply.body`)으로도
//! 조회할 수 있습니다.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 메시지 역할
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

/// 도구 호출 정보
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// 메시지
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    fn with_role(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn user(content: &str) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::with_role(Role::Assistant, content)
        }
    }

    pub fn system(content: &str) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn tool(content: &str, tool_call_id: &str) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.to_string()),
            ..Self::with_role(Role::Tool, content)
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|tc| !tc.is_empty())
    }
}

/// 경로 표현식을 세그먼트로 분해
///
/// `root[seg][seg]` 와 `root.seg` 형식을 모두 받습니다. 대괄호가 닫히지 않는 등
/// 형식이 깨진 경우 전체 문자열을 단일 키로 취급합니다.
pub fn parse_path(expr: &str) -> Vec<String> {
    let expr = expr.trim();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = expr.chars();

    while let Some(c) = chars.next() {
        match c {
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed {
                    return vec![expr.to_string()];
                }
                let inner = inner.trim().trim_matches(|c| c == '\'' || c == '"');
                segments.push(inner.to_string());
            }
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    if segments.is_empty() {
        vec![expr.to_string()]
    } else {
        segments
    }
}

/// 맵에서 경로 표현식으로 값 조회
///
/// 정확히 일치하는 최상위 키가 있으면 그것을 우선합니다.
pub fn lookup_path<'a>(map: &'a Map<String, Value>, expr: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(expr) {
        return Some(value);
    }

    let segments = parse_path(expr);
    let (root, rest) = segments.split_first()?;
    let mut current = map.get(root)?;
    for segment in rest {
        current = match current {
            Value::Object(obj) => obj.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// 시퀀스 실행 상태
/// 한 번의 실행 동안 오케스트레이터가 소유하며, 각 노드가 읽고 갱신합니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionState(Map<String, Value>);

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// JSON 객체로부터 생성 (객체가 아니면 None)
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// 경로 표현식 조회 (`incoming_message[content]`)
    pub fn lookup(&self, expr: &str) -> Option<&Value> {
        lookup_path(&self.0, expr)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// 키가 없을 때만 삽입
    pub fn set_default(&mut self, key: impl Into<String>, value: Value) {
        self.0.entry(key.into()).or_insert(value);
    }

    /// 매핑의 모든 키를 덮어쓰며 병합
    pub fn merge(&mut self, other: Map<String, Value>) {
        for (key, value) in other {
            self.0.insert(key, value);
        }
    }

    /// 스킵 조건 한 쌍이 현재 상태와 일치하는지
    pub fn matches_flag(&self, key: &str, expected: bool) -> bool {
        matches!(self.lookup(key), Some(Value::Bool(actual)) if *actual == expected)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for SessionState {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
