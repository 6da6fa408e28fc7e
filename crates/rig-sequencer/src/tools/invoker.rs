// src/tools/invoker.rs
//! 도구 호출 정규화
//!
//! 어떤 형태의 도구든 하나의 async 호출 계약으로 맞춥니다. 호출 전에
//! 컨텍스트를 도구가 선언한 인자 키로 걸러냅니다.

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{SequenceError, ToolError};
use super::shape::{CallableTool, Invocation, ToolShape};

/// 도구 호출
///
/// 동기 도구는 tokio blocking 풀에서 실행되므로 같은 런타임의 다른 실행을
/// 막지 않습니다.
pub async fn invoke(tool: &CallableTool, context: &Map<String, Value>) -> Result<Value, SequenceError> {
    let (args, dropped) = tool.accepted().filter(context);

    tracing::debug!(
        tool_name = %tool.name(),
        shape = tool.shape().kind(),
        forwarded = args.len(),
        dropped,
        "Invoking tool"
    );

    let result = match tool.shape() {
        ToolShape::NativeAsync(entry) => entry.ainvoke(args).await,
        ToolShape::LegacyAsync(entry) => entry.arun(args).await.map(Value::String),
        ToolShape::Coroutine(entry) => match entry.invoke(args) {
            Invocation::Ready(result) => result,
            Invocation::Pending(future) => future.await,
        },
        ToolShape::Blocking(entry) => {
            let entry = Arc::clone(entry);
            tokio::task::spawn_blocking(move || entry.invoke_blocking(args))
                .await
                .unwrap_or_else(|e| Err(ToolError::Join(e.to_string())))
        }
    };

    result.map_err(|e| SequenceError::tool_execution(tool.name(), e))
}

/// 문자열 결과를 JSON으로 해석, 실패하면 원래 문자열 유지
pub fn decode_tool_output(value: Value) -> Value {
    match value {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or_else(|_| Value::String(raw)),
        other => other,
    }
}
