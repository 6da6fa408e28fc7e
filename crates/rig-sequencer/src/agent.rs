// src/agent.rs
//! 에이전트 정의 모델
//!
//! 프롬프트 템플릿, 사용할 도구, 하위 에이전트, 컨텍스트 의존성, 출력 스키마를
//! 선언합니다. 실제 조립은 `composer::AgentComposer`가 합니다.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 프롬프트 메시지 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    #[serde(alias = "human")]
    User,
    #[serde(alias = "ai")]
    Assistant,
}

/// (역할, 템플릿) 한 쌍
///
/// `["system", "..."]` 배열 형식과 `{role, template}` 객체 형식 모두 읽습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PromptMessageRepr")]
pub struct PromptMessage {
    pub role: PromptRole,
    pub template: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PromptMessageRepr {
    Pair(PromptRole, String),
    Named { role: PromptRole, template: String },
}

impl From<PromptMessageRepr> for PromptMessage {
    fn from(repr: PromptMessageRepr) -> Self {
        match repr {
            PromptMessageRepr::Pair(role, template) | PromptMessageRepr::Named { role, template } => {
                Self { role, template }
            }
        }
    }
}

impl PromptMessage {
    pub fn system(template: impl Into<String>) -> Self {
        Self { role: PromptRole::System, template: template.into() }
    }

    pub fn user(template: impl Into<String>) -> Self {
        Self { role: PromptRole::User, template: template.into() }
    }
}

/// 에이전트가 필요로 하는 컨텍스트 키
///
/// - `default_value`만 있으면 상태에 키가 없을 때의 기본값 (optional default)
/// - `override = true`면 상태 값을 무시하고 항상 기본값 사용 (required default)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,

    #[serde(rename = "override", default)]
    pub override_state: bool,
}

impl Dependency {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            default_value: None,
            override_state: false,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn overriding(mut self) -> Self {
        self.override_state = true;
        self
    }
}

/// 에이전트 정의
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// `openai:gpt-4.1` 같은 모델 식별자
    pub model: String,

    #[serde(default)]
    pub prompt: Vec<PromptMessage>,

    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default, alias = "sub-agents")]
    pub sub_agents: Vec<String>,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// JSON Schema 문자열 또는 인라인 객체
    #[serde(default, alias = "output-schema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl AgentDefinition {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            model: model.into(),
            prompt: Vec::new(),
            tools: Vec::new(),
            sub_agents: Vec::new(),
            dependencies: Vec::new(),
            output_schema: None,
        }
    }

    pub fn with_prompt(mut self, message: PromptMessage) -> Self {
        self.prompt.push(message);
        self
    }

    pub fn with_tool(mut self, tool_id: impl Into<String>) -> Self {
        self.tools.push(tool_id.into());
        self
    }

    pub fn with_sub_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.sub_agents.push(agent_id.into());
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// 표시 이름 (비어 있으면 id)
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// 의존성 기본값을 (optional, required) 두 맵으로 나눕니다.
    /// 기본값이 null이거나 없는 의존성은 어느 쪽에도 들어가지 않습니다.
    pub fn partition_defaults(&self) -> (Map<String, Value>, Map<String, Value>) {
        let mut optional = Map::new();
        let mut required = Map::new();

        for dep in &self.dependencies {
            let Some(value) = dep.default_value.as_ref().filter(|v| !v.is_null()) else {
                continue;
            };
            if dep.override_state {
                required.insert(dep.key.clone(), value.clone());
            } else {
                optional.insert(dep.key.clone(), value.clone());
            }
        }

        (optional, required)
    }

    pub fn dependency_keys(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|d| d.key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_message_both_forms() {
        let pair: PromptMessage = serde_json::from_value(json!(["system", "You are {name}"])).unwrap();
        let named: PromptMessage =
            serde_json::from_value(json!({"role": "user", "template": "{incoming_message}"})).unwrap();

        assert_eq!(pair.role, PromptRole::System);
        assert_eq!(pair.template, "You are {name}");
        assert_eq!(named.role, PromptRole::User);
    }

    #[test]
    fn test_dependency_override_field_name() {
        let dep: Dependency = serde_json::from_value(json!({
            "key": "preferred_tone",
            "default_value": "polite",
            "override": true
        }))
        .unwrap();
        assert!(dep.override_state);
        assert_eq!(dep.default_value, Some(json!("polite")));

        let dep: Dependency = serde_json::from_value(json!({"key": "incoming_message", "default_value": null})).unwrap();
        assert!(!dep.override_state);
        assert!(dep.default_value.is_none());
    }

    #[test]
    fn test_hyphenated_catalogue_keys() {
        let agent: AgentDefinition = serde_json::from_value(json!({
            "id": "mock-customer",
            "model": "openai:gpt-4.1",
            "sub-agents": ["detect-tone"],
            "output-schema": "{\"type\": \"object\", \"properties\": {\"reply\": {\"type\": \"string\"}}}"
        }))
        .unwrap();

        assert_eq!(agent.sub_agents, vec!["detect-tone"]);
        assert!(agent.output_schema.as_ref().unwrap().is_string());

        // 직렬화는 snake_case 이름을 유지
        let round = serde_json::to_value(&agent).unwrap();
        assert!(round.get("sub_agents").is_some());
        assert!(round.get("output_schema").is_some());
    }

    #[test]
    fn test_partition_defaults() {
        let agent = AgentDefinition::new("reply_agent", "openai:gpt-4.1")
            .with_dependency(Dependency::new("preferred_tone").with_default(json!("polite")).overriding())
            .with_dependency(Dependency::new("signature").with_default(json!("Sales team")))
            .with_dependency(Dependency::new("incoming_message"));

        let (optional, required) = agent.partition_defaults();
        assert_eq!(optional.get("signature"), Some(&json!("Sales team")));
        assert_eq!(required.get("preferred_tone"), Some(&json!("polite")));
        assert!(!optional.contains_key("incoming_message"));
        assert!(!required.contains_key("incoming_message"));
    }

    #[test]
    fn test_agent_definition_defaults() {
        let agent: AgentDefinition = serde_json::from_value(json!({
            "id": "detect-tone",
            "model": "openai:gpt-4.1-mini",
            "output_schema": "{\"type\": \"object\"}"
        }))
        .unwrap();

        assert!(agent.tools.is_empty());
        assert!(agent.sub_agents.is_empty());
        assert_eq!(agent.display_name(), "detect-tone");
        assert_eq!(agent.output_schema, Some(json!("{\"type\": \"object\"}")));
    }
}
