// src/context.rs
//! 스텝 컨텍스트 해석
//!
//! 우선순위 (낮음 → 높음): 클라이언트 설정 < 실행 상태 < 스텝 인자.
//! 부수 효과 없는 순수 함수입니다.

use serde_json::{Map, Value};

use crate::error::SequenceError;
use crate::prompt::{render_template, TemplateError};
use crate::sequence::{Argument, Arguments};
use crate::state::SessionState;

/// 동적 인자 하나를 상태에 대해 해석
///
/// - `{`가 없으면 경로 표현식: 찾은 JSON 값을 타입 그대로 반환
/// - `{path}` 자리표시자가 있으면 템플릿: 문자열로 렌더링
pub fn resolve_dynamic(argument: &str, expr: &str, state: &SessionState) -> Result<Value, SequenceError> {
    let missing = |key: String| SequenceError::MissingContextKey {
        key,
        argument: argument.to_string(),
    };

    if expr.contains('{') || expr.contains('}') {
        return render_template(expr, state.as_map())
            .map(Value::String)
            .map_err(|e| match e {
                TemplateError::MissingKey(key) => missing(key),
                malformed => SequenceError::InvalidConfiguration(format!(
                    "dynamic argument '{argument}': {malformed}"
                )),
            });
    }

    state
        .lookup(expr)
        .cloned()
        .ok_or_else(|| missing(expr.trim().to_string()))
}

/// 인자만 해석 (상태/클라이언트 설정 병합 없이)
pub fn resolve_arguments(arguments: &Arguments, state: &SessionState) -> Result<Map<String, Value>, SequenceError> {
    let mut resolved = Map::new();
    for (name, argument) in arguments {
        let value = match argument {
            Argument::Static(value) => value.clone(),
            Argument::Dynamic(expr) => resolve_dynamic(name, expr, state)?,
        };
        resolved.insert(name.clone(), value);
    }
    Ok(resolved)
}

/// 스텝의 유효 입력 컨텍스트 계산
pub fn resolve_context(
    arguments: &Arguments,
    state: &SessionState,
    client_config: &Map<String, Value>,
) -> Result<Map<String, Value>, SequenceError> {
    let overrides = resolve_arguments(arguments, state)?;

    let mut context = client_config.clone();
    for (key, value) in state.as_map() {
        context.insert(key.clone(), value.clone());
    }
    for (key, value) in overrides {
        context.insert(key, value);
    }

    tracing::trace!(keys = context.len(), "Resolved step context");
    Ok(context)
}
