// src/tools/mod.rs
//! 도구 정의, 레지스트리, 호출 정규화
//!
//! - `shape`: 네 가지 호출 형태와 `CallableTool`
//! - `invoker`: 인자 필터링 후 형태별 디스패치
//! - `transport`: 실행 단위의 도구 세션

pub mod invoker;
pub mod shape;
pub mod transport;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use invoker::{decode_tool_output, invoke};
pub use shape::{
    AcceptedArguments, AsyncInvoke, BlockingInvoke, CallableTool, DualInvoke, Invocation,
    KeywordArgs, LegacyRun, ToolCapabilities, ToolShape,
};
pub use transport::{StaticToolTransport, ToolSession, ToolTransport};

/// 도구 정의
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// 이름으로 도구를 찾는 레지스트리
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, CallableTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools(tools: impl IntoIterator<Item = CallableTool>) -> Self {
        let mut registry = Self::new();
        registry.register_all(tools);
        registry
    }

    /// 같은 이름이 있으면 덮어씁니다
    pub fn register(&mut self, tool: CallableTool) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn register_all(&mut self, tools: impl IntoIterator<Item = CallableTool>) {
        for tool in tools {
            self.register(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<&CallableTool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// LLM에 전달할 도구 스키마 목록
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition().clone()).collect()
    }

    /// 정렬된 도구 이름
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
