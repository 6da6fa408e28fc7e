// src/schema.rs
//! 에이전트 출력 계약
//!
//! 에이전트 정의의 `output_schema`(JSON Schema 문자열 또는 객체)를 읽어
//! 최종 응답을 검증하고, 모델에게 줄 출력 지시문을 만듭니다.
//! 검증은 `jsonschema` 검증기가 수행합니다.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::agent::AgentDefinition;
use crate::error::SequenceError;

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 루트가 객체 스키마인지 확인 (`type: object` 또는 `properties` 보유)
fn is_object_schema(schema: &Value) -> bool {
    match schema.get("type") {
        Some(Value::String(ty)) => ty == "object",
        Some(Value::Array(types)) => types.iter().any(|t| t == "object"),
        _ => schema.get("properties").is_some(),
    }
}

struct Compiled {
    schema: Value,
    validator: jsonschema::Validator,
}

/// 에이전트 최종 응답의 계약
#[derive(Clone)]
pub struct OutputContract {
    compiled: Option<Arc<Compiled>>,
}

impl fmt::Debug for OutputContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputContract")
            .field("schema", &self.schema())
            .finish()
    }
}

impl PartialEq for OutputContract {
    fn eq(&self, other: &Self) -> bool {
        self.schema() == other.schema()
    }
}

impl OutputContract {
    /// 제약 없는 자유 형식 응답
    pub fn free_form() -> Self {
        Self { compiled: None }
    }

    /// JSON Schema 값(문자열이면 파싱)에서 생성
    pub fn from_schema(schema: &Value) -> Result<Self, String> {
        let schema = match schema {
            Value::String(raw) => {
                serde_json::from_str::<Value>(raw).map_err(|e| format!("not valid JSON: {e}"))?
            }
            Value::Object(_) => schema.clone(),
            other => return Err(format!("expected a JSON Schema, got {}", kind_of(other))),
        };

        if !is_object_schema(&schema) {
            return Err("root must be an object schema".to_string());
        }

        let validator = jsonschema::Validator::new(&schema).map_err(|e| format!("invalid JSON Schema: {e}"))?;
        Ok(Self {
            compiled: Some(Arc::new(Compiled { schema, validator })),
        })
    }

    /// 에이전트 정의에서 생성 (스키마가 없으면 자유 형식)
    pub fn for_agent(agent: &AgentDefinition) -> Result<Self, SequenceError> {
        match &agent.output_schema {
            None => Ok(Self::free_form()),
            Some(schema) => Self::from_schema(schema).map_err(|reason| {
                SequenceError::InvalidConfiguration(format!(
                    "output_schema of agent {}: {reason}",
                    agent.id
                ))
            }),
        }
    }

    pub fn is_structured(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn schema(&self) -> Option<&Value> {
        self.compiled.as_ref().map(|c| &c.schema)
    }

    /// 최상위 `properties`의 키 (정렬됨)
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .schema()
            .and_then(|s| s.get("properties"))
            .and_then(Value::as_object)
            .map(|props| props.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    /// 최종 응답 검증. 위반 사항은 `; `로 이어 붙여 돌려줍니다.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let Some(compiled) = &self.compiled else {
            return Ok(());
        };
        if compiled.validator.is_valid(value) {
            return Ok(());
        }
        let errors: Vec<String> = compiled
            .validator
            .iter_errors(value)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{path}: {e}")
                }
            })
            .collect();
        Err(errors.join("; "))
    }

    /// 시스템 프롬프트에 덧붙일 출력 지시문
    pub fn instructions(&self) -> Option<String> {
        let schema = self.schema()?;
        Some(format!(
            "When you have the final answer, respond with only a JSON object that matches this JSON Schema \
             (no prose, no markdown):\n{}",
            serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel": {"type": "string"},
                "content": {
                    "type": "object",
                    "properties": {
                        "greeting": {"type": "string"},
                        "body": {"type": "string"}
                    },
                    "required": ["greeting", "body"]
                },
                "missing_information": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["channel", "content", "missing_information"]
        })
    }

    #[test]
    fn test_from_string_schema() {
        let contract = OutputContract::from_schema(&Value::String(reply_schema().to_string())).unwrap();
        assert!(contract.is_structured());
        assert_eq!(contract.field_names(), vec!["channel", "content", "missing_information"]);
        assert_eq!(contract, OutputContract::from_schema(&reply_schema()).unwrap());
    }

    #[test]
    fn test_validate_nested() {
        let contract = OutputContract::from_schema(&reply_schema()).unwrap();

        let good = json!({
            "channel": "email",
            "content": {"greeting": "Hi", "body": "We're checking."},
            "missing_information": ["trim"]
        });
        assert!(contract.validate(&good).is_ok());

        let missing_body = json!({
            "channel": "email",
            "content": {"greeting": "Hi"},
            "missing_information": []
        });
        let err = contract.validate(&missing_body).unwrap_err();
        assert!(err.starts_with("/content"));
        assert!(err.contains("body"));

        let wrong_item = json!({
            "channel": "email",
            "content": {"greeting": "Hi", "body": "b"},
            "missing_information": [1]
        });
        assert!(contract.validate(&wrong_item).unwrap_err().contains("/missing_information/0"));
    }

    #[test]
    fn test_enum_and_additional_properties_enforced() {
        let contract = OutputContract::from_schema(&json!({
            "type": "object",
            "properties": {"tone": {"type": "string", "enum": ["polite", "casual"]}},
            "required": ["tone"],
            "additionalProperties": false
        }))
        .unwrap();

        assert!(contract.validate(&json!({"tone": "polite"})).is_ok());

        let err = contract.validate(&json!({"tone": "furious", "extra": 1})).unwrap_err();
        assert!(err.contains("/tone"));
        assert!(err.contains("extra"));
        assert_eq!(err.split("; ").count(), 2);
    }

    #[test]
    fn test_nullable_fields() {
        let contract = OutputContract::from_schema(&json!({
            "type": "object",
            "properties": {
                "a": {"anyOf": [{"type": "string"}, {"type": "null"}]},
                "b": {"type": ["integer", "null"]}
            }
        }))
        .unwrap();

        assert!(contract.validate(&json!({"a": null, "b": null})).is_ok());
        assert!(contract.validate(&json!({"a": "x", "b": 3})).is_ok());
        assert!(contract.validate(&json!({"b": 1.5})).is_err());
        assert!(contract.validate(&json!("not an object")).is_err());
    }

    #[test]
    fn test_invalid_schemas() {
        assert!(OutputContract::from_schema(&json!("{not json")).is_err());
        assert!(OutputContract::from_schema(&json!({"type": "string"})).is_err());
        assert!(OutputContract::from_schema(&json!(42)).is_err());

        let err = OutputContract::from_schema(&json!({"type": "object", "properties": {"a": {"type": "strng"}}}))
            .unwrap_err();
        assert!(err.starts_with("invalid JSON Schema"));
    }

    #[test]
    fn test_for_agent_names_agent_in_error() {
        let agent = AgentDefinition::new("broken", "openai:gpt-4.1").with_output_schema(json!("[]"));
        let err = OutputContract::for_agent(&agent).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(err.to_string().contains("broken"));

        let agent = AgentDefinition::new("bad-keyword", "openai:gpt-4.1")
            .with_output_schema(json!({"type": "object", "required": "tone"}));
        let err = OutputContract::for_agent(&agent).unwrap_err();
        assert!(matches!(err, SequenceError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("bad-keyword"));
    }

    #[test]
    fn test_free_form_accepts_anything() {
        let contract = OutputContract::free_form();
        assert!(contract.validate(&json!("text")).is_ok());
        assert!(contract.instructions().is_none());
        assert!(contract.field_names().is_empty());
    }
}
