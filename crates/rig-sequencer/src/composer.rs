// src/composer.rs
//! 에이전트 조립
//!
//! 에이전트 id 하나로부터 실행 가능한 에이전트를 만든다:
//! 컨텍스트 해석 → 의존성 기본값 병합 → 프롬프트 렌더링 → 도구 래핑 →
//! 하위 에이전트를 도구로 래핑 (재귀) → 출력 계약 → 런타임에 전달.
//!
//! 재귀는 `BuildContext`의 조상 체인으로 순환을 검출합니다.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::AgentDefinition;
use crate::context::resolve_context;
use crate::error::{SequenceError, ToolError};
use crate::prompt::render_prompt;
use crate::runtime::{AgentBlueprint, AgentInput, AgentRuntime, RunnableAgent};
use crate::schema::OutputContract;
use crate::sequence::Arguments;
use crate::state::{Message, SessionState};
use crate::tools::{invoke, AsyncInvoke, CallableTool, ToolDefinition, ToolRegistry};

/// 재귀 조립 중의 조상 체인
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildContext {
    chain: Vec<String>,
}

impl BuildContext {
    pub fn root() -> Self {
        Self::default()
    }

    /// 하위 에이전트로 한 단계 내려갑니다. 이미 체인에 있으면 순환.
    pub fn enter(&self, agent_id: &str) -> Result<Self, SequenceError> {
        let mut chain = self.chain.clone();
        chain.push(agent_id.to_string());
        if self.chain.iter().any(|id| id == agent_id) {
            return Err(SequenceError::CyclicAgentDependency(chain));
        }
        Ok(Self { chain })
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn depth(&self) -> usize {
        self.chain.len()
    }
}

/// 조립 결과
#[derive(Clone)]
pub struct ComposedAgent {
    pub agent: Arc<dyn RunnableAgent>,
    /// 렌더링된 초기 메시지
    pub messages: Vec<Message>,
    /// 에이전트의 최종 컨텍스트
    pub context: Map<String, Value>,
}

impl ComposedAgent {
    pub fn input(&self) -> AgentInput {
        AgentInput {
            messages: self.messages.clone(),
            context: self.context.clone(),
        }
    }
}

/// 에이전트 조립기
#[derive(Clone)]
pub struct AgentComposer {
    agents: Arc<HashMap<String, AgentDefinition>>,
    client_config: Arc<Map<String, Value>>,
    runtime: Arc<dyn AgentRuntime>,
}

impl AgentComposer {
    pub fn new(
        agents: Arc<HashMap<String, AgentDefinition>>,
        client_config: Arc<Map<String, Value>>,
        runtime: Arc<dyn AgentRuntime>,
    ) -> Self {
        Self {
            agents,
            client_config,
            runtime,
        }
    }

    pub fn client_config(&self) -> &Map<String, Value> {
        &self.client_config
    }

    pub fn definition(&self, agent_id: &str) -> Result<&AgentDefinition, SequenceError> {
        self.agents
            .get(agent_id)
            .ok_or_else(|| SequenceError::AgentNotFound(agent_id.to_string()))
    }

    /// 에이전트 조립
    pub fn create_agent(
        &self,
        agent_id: &str,
        tools: &ToolRegistry,
        state: &SessionState,
        arguments: &Arguments,
    ) -> Result<ComposedAgent, SequenceError> {
        self.build(agent_id, tools, state, arguments, BuildContext::root())
    }

    /// 에이전트를 호출 가능한 도구로 래핑. `context`가 하위 에이전트의 상태가 됩니다.
    pub fn create_agent_tool(
        &self,
        agent_id: &str,
        tools: &ToolRegistry,
        context: &Map<String, Value>,
    ) -> Result<CallableTool, SequenceError> {
        self.sub_agent_tool(agent_id, tools, context, BuildContext::root())
    }

    fn build(
        &self,
        agent_id: &str,
        tools: &ToolRegistry,
        state: &SessionState,
        arguments: &Arguments,
        ctx: BuildContext,
    ) -> Result<ComposedAgent, SequenceError> {
        let ctx = ctx.enter(agent_id)?;
        let definition = self.definition(agent_id)?;

        // optional < base < required
        let (mut context, required) = definition.partition_defaults();
        let base = resolve_context(arguments, state, &self.client_config)?;
        context.extend(base);
        context.extend(required);

        let messages = render_prompt(&definition.prompt, &context, agent_id)?;

        let mut agent_tools = Vec::with_capacity(definition.tools.len() + definition.sub_agents.len());
        for tool_name in &definition.tools {
            let tool = tools
                .get(tool_name)
                .ok_or_else(|| SequenceError::ToolNotFound(tool_name.clone()))?;
            agent_tools.push(ContextBoundTool::wrap(tool.clone(), context.clone()));
        }
        for sub_agent_id in &definition.sub_agents {
            agent_tools.push(self.sub_agent_tool(sub_agent_id, tools, &context, ctx.clone())?);
        }

        let output = OutputContract::for_agent(definition)?;

        tracing::debug!(
            agent_id = %agent_id,
            depth = ctx.depth(),
            tools = agent_tools.len(),
            context_keys = context.len(),
            "Composed agent"
        );

        let agent = self.runtime.build(AgentBlueprint {
            agent_id: agent_id.to_string(),
            name: definition.display_name().to_string(),
            model: definition.model.clone(),
            tools: agent_tools,
            output,
        })?;

        Ok(ComposedAgent {
            agent,
            messages,
            context,
        })
    }

    /// 부모의 최종 컨텍스트를 상태로 삼아 하위 에이전트를 조립하고 도구로 감쌉니다
    ///
    /// 부모 스텝 인자는 이미 부모 컨텍스트에 해석되어 들어 있으므로 다시 해석하지 않습니다.
    fn sub_agent_tool(
        &self,
        agent_id: &str,
        tools: &ToolRegistry,
        parent_context: &Map<String, Value>,
        ctx: BuildContext,
    ) -> Result<CallableTool, SequenceError> {
        let sub_state = SessionState::from_map(parent_context.clone());
        let composed = self.build(agent_id, tools, &sub_state, &Arguments::new(), ctx)?;
        let definition = self.definition(agent_id)?;

        let tool_definition = ToolDefinition::new(
            agent_id,
            format!("Agent wrapper for {agent_id}"),
            dependency_input_schema(definition),
        );
        Ok(CallableTool::native(tool_definition, SubAgentTool { composed }))
    }
}

/// 하위 에이전트 도구의 입력 스키마: 의존성 키마다 타입 없는 선택 필드
pub fn dependency_input_schema(definition: &AgentDefinition) -> Value {
    let properties: Map<String, Value> = definition
        .dependency_keys()
        .map(|key| (key.to_string(), json!({})))
        .collect();
    json!({
        "type": "object",
        "title": "DynamicInputSchema",
        "properties": properties,
    })
}

fn into_tool_error(err: SequenceError) -> ToolError {
    match err {
        SequenceError::ToolExecution { source, .. } => source,
        other => ToolError::execution(other.to_string()),
    }
}

/// 에이전트 컨텍스트를 호출 인자 아래에 깔아 주는 도구 래퍼 (호출 인자가 우선)
struct ContextBoundTool {
    inner: CallableTool,
    context: Map<String, Value>,
}

impl ContextBoundTool {
    fn wrap(inner: CallableTool, context: Map<String, Value>) -> CallableTool {
        let definition = inner.definition().clone();
        let accepted = inner.accepted().clone();
        CallableTool::native(definition, Self { inner, context }).with_accepted_arguments(accepted)
    }
}

#[async_trait]
impl AsyncInvoke for ContextBoundTool {
    async fn ainvoke(&self, input: Map<String, Value>) -> Result<Value, ToolError> {
        let mut merged = self.context.clone();
        merged.extend(input);
        invoke(&self.inner, &merged).await.map_err(into_tool_error)
    }
}

/// 하위 에이전트를 실행하는 도구
struct SubAgentTool {
    composed: ComposedAgent,
}

#[async_trait]
impl AsyncInvoke for SubAgentTool {
    async fn ainvoke(&self, input: Map<String, Value>) -> Result<Value, ToolError> {
        let mut agent_input = self.composed.input();
        if !input.is_empty() {
            agent_input
                .messages
                .push(Message::user(&format!("Arguments: {}", Value::Object(input.clone()))));
        }
        agent_input.context.extend(input);

        let response = self
            .composed
            .agent
            .run(agent_input)
            .await
            .map_err(|e| ToolError::execution(e.to_string()))?;
        Ok(response.structured.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Dependency, PromptMessage};
    use crate::sequence::Argument;
    use crate::state::Role;
    use crate::testing::StubAgentRuntime;

    fn composer(agents: Vec<AgentDefinition>, client: Value, runtime: StubAgentRuntime) -> AgentComposer {
        AgentComposer::new(
            Arc::new(agents.into_iter().map(|a| (a.id.clone(), a)).collect()),
            Arc::new(client.as_object().cloned().unwrap_or_default()),
            Arc::new(runtime),
        )
    }

    fn tone_agent() -> AgentDefinition {
        AgentDefinition::new("toned", "openai:gpt-4.1")
            .with_prompt(PromptMessage::system("Reply in a {tone} tone."))
            .with_dependency(Dependency::new("tone").with_default(json!("polite")))
            .with_dependency(Dependency::new("brand").with_default(json!("Waterloo Honda")).overriding())
    }

    fn echo_tool() -> CallableTool {
        CallableTool::from_async_fn(
            ToolDefinition::new(
                "demo-get_inventory_information",
                "Inventory",
                json!({"type": "object", "properties": {"model": {}, "client_id": {}}}),
            ),
            |input| async move { Ok(Value::Object(input)) },
        )
    }

    #[test]
    fn test_build_context_detects_cycle() {
        let ctx = BuildContext::root().enter("a").unwrap().enter("b").unwrap();
        assert_eq!(ctx.depth(), 2);
        match ctx.enter("a").unwrap_err() {
            SequenceError::CyclicAgentDependency(chain) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_optional_default_used_when_absent() {
        let c = composer(vec![tone_agent()], json!({}), StubAgentRuntime::new());
        let composed = c
            .create_agent("toned", &ToolRegistry::new(), &SessionState::new(), &Arguments::new())
            .unwrap();

        assert_eq!(composed.context["tone"], json!("polite"));
        assert_eq!(composed.context["brand"], json!("Waterloo Honda"));
        assert_eq!(composed.messages[0].content, "Reply in a polite tone.");
    }

    #[test]
    fn test_state_beats_optional_but_not_required_default() {
        let c = composer(vec![tone_agent()], json!({"tone": "angelic"}), StubAgentRuntime::new());
        let state = SessionState::from_value(json!({"tone": "casual", "brand": "Other Motors"})).unwrap();

        let composed = c
            .create_agent("toned", &ToolRegistry::new(), &state, &Arguments::new())
            .unwrap();

        assert_eq!(composed.context["tone"], json!("casual"));
        assert_eq!(composed.context["brand"], json!("Waterloo Honda"));
    }

    #[test]
    fn test_missing_prompt_key() {
        let agent = AgentDefinition::new("needy", "openai:gpt-4.1")
            .with_prompt(PromptMessage::user("{incoming_message}"));
        let c = composer(vec![agent], json!({}), StubAgentRuntime::new());

        let err = c
            .create_agent("needy", &ToolRegistry::new(), &SessionState::new(), &Arguments::new())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Missing key 'incoming_message' in context for agent needy");
    }

    #[test]
    fn test_unknown_agent_and_tool() {
        let agent = AgentDefinition::new("tooled", "openai:gpt-4.1").with_tool("demo-missing");
        let c = composer(vec![agent], json!({}), StubAgentRuntime::new());

        let err = c
            .create_agent("ghost", &ToolRegistry::new(), &SessionState::new(), &Arguments::new())
            .err()
            .unwrap();
        assert!(matches!(err, SequenceError::AgentNotFound(id) if id == "ghost"));

        let err = c
            .create_agent("tooled", &ToolRegistry::new(), &SessionState::new(), &Arguments::new())
            .err()
            .unwrap();
        assert!(matches!(err, SequenceError::ToolNotFound(id) if id == "demo-missing"));
    }

    #[test]
    fn test_cyclic_sub_agents() {
        let a = AgentDefinition::new("a", "openai:gpt-4.1").with_sub_agent("b");
        let b = AgentDefinition::new("b", "openai:gpt-4.1").with_sub_agent("a");
        let c = composer(vec![a, b], json!({}), StubAgentRuntime::new());

        let err = c
            .create_agent("a", &ToolRegistry::new(), &SessionState::new(), &Arguments::new())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Cyclic agent dependency: a -> b -> a");
    }

    #[test]
    fn test_diamond_sub_agents_are_not_cycles() {
        let top = AgentDefinition::new("top", "m").with_sub_agent("left").with_sub_agent("right");
        let left = AgentDefinition::new("left", "m").with_sub_agent("leaf");
        let right = AgentDefinition::new("right", "m").with_sub_agent("leaf");
        let leaf = AgentDefinition::new("leaf", "m");
        let c = composer(vec![top, left, right, leaf], json!({}), StubAgentRuntime::new());

        assert!(c
            .create_agent("top", &ToolRegistry::new(), &SessionState::new(), &Arguments::new())
            .is_ok());
    }

    #[test]
    fn test_sub_agent_tool_schema_lists_dependencies() {
        let runtime = StubAgentRuntime::new();
        let parent = AgentDefinition::new("mock-customer", "openai:gpt-4.1").with_sub_agent("detect-tone");
        let child = AgentDefinition::new("detect-tone", "openai:gpt-4.1")
            .with_dependency(Dependency::new("incoming_message"))
            .with_dependency(Dependency::new("reply[missing_information]"));
        let c = composer(vec![parent, child], json!({}), runtime.clone());

        c.create_agent("mock-customer", &ToolRegistry::new(), &SessionState::new(), &Arguments::new())
            .unwrap();

        let parent_build = runtime.builds().into_iter().find(|b| b.agent_id == "mock-customer").unwrap();
        let tool = &parent_build.tools[0];
        assert_eq!(tool.name, "detect-tone");
        assert_eq!(tool.description, "Agent wrapper for detect-tone");
        assert_eq!(
            tool.parameters,
            json!({
                "type": "object",
                "title": "DynamicInputSchema",
                "properties": {"incoming_message": {}, "reply[missing_information]": {}}
            })
        );
    }

    #[tokio::test]
    async fn test_context_bound_tool_call_args_win() {
        let runtime = StubAgentRuntime::new()
            .with_tool_call("shopper", "demo-get_inventory_information", json!({"model": "Civic", "client_id": "override"}))
            .with_response("shopper", json!({"done": true}));
        let agent = AgentDefinition::new("shopper", "openai:gpt-4.1").with_tool("demo-get_inventory_information");
        let c = composer(vec![agent], json!({"client_id": "client-123", "model": "Accord"}), runtime.clone());
        let registry = ToolRegistry::from_tools(vec![echo_tool()]);

        let composed = c
            .create_agent("shopper", &registry, &SessionState::new(), &Arguments::new())
            .unwrap();
        composed.agent.run(composed.input()).await.unwrap();

        let run = &runtime.runs_of("shopper")[0];
        let (_, result) = &run.tool_results[0];
        assert_eq!(result.as_ref().unwrap(), &json!({"model": "Civic", "client_id": "override"}));
    }

    #[tokio::test]
    async fn test_context_bound_tool_fills_missing_args() {
        let runtime = StubAgentRuntime::new()
            .with_tool_call("shopper", "demo-get_inventory_information", json!({}))
            .with_response("shopper", json!({"done": true}));
        let agent = AgentDefinition::new("shopper", "openai:gpt-4.1").with_tool("demo-get_inventory_information");
        let c = composer(vec![agent], json!({"client_id": "client-123", "preferred_tone": "angelic"}), runtime.clone());
        let registry = ToolRegistry::from_tools(vec![echo_tool()]);

        let composed = c
            .create_agent("shopper", &registry, &SessionState::new(), &Arguments::new())
            .unwrap();
        composed.agent.run(composed.input()).await.unwrap();

        let (_, result) = &runtime.runs_of("shopper")[0].tool_results[0];
        // preferred_tone 등 선언되지 않은 키는 걸러집니다
        assert_eq!(result.as_ref().unwrap(), &json!({"client_id": "client-123"}));
    }

    #[tokio::test]
    async fn test_sub_agent_tool_runs_child_with_arguments() {
        let runtime = StubAgentRuntime::new()
            .with_tool_call("mock-customer", "detect-tone", json!({"incoming_message": "This is ridiculous"}))
            .with_response("mock-customer", json!({"reply": "Oh, is it *ridiculous*?"}))
            .with_response("detect-tone", json!({"tone": "Annoyed"}));

        let parent = AgentDefinition::new("mock-customer", "openai:gpt-4.1")
            .with_prompt(PromptMessage::user("{incoming_message}"))
            .with_sub_agent("detect-tone")
            .with_dependency(Dependency::new("incoming_message"));
        let child = AgentDefinition::new("detect-tone", "openai:gpt-4.1")
            .with_prompt(PromptMessage::system("Detect the tone."))
            .with_prompt(PromptMessage::user("{incoming_message}"))
            .with_dependency(Dependency::new("incoming_message"));
        let c = composer(vec![parent, child], json!({}), runtime.clone());

        let mut arguments = Arguments::new();
        arguments.insert("incoming_message".into(), Argument::Dynamic("incoming_message[content]".into()));
        let state = SessionState::from_value(json!({"incoming_message": {"content": "This is ridiculous"}})).unwrap();

        let composed = c.create_agent("mock-customer", &ToolRegistry::new(), &state, &arguments).unwrap();
        let response = composed.agent.run(composed.input()).await.unwrap();
        assert_eq!(response.structured.into_value(), json!({"reply": "Oh, is it *ridiculous*?"}));

        let parent_run = &runtime.runs_of("mock-customer")[0];
        assert_eq!(parent_run.tool_results[0].1.as_ref().unwrap(), &json!({"tone": "Annoyed"}));

        let child_run = &runtime.runs_of("detect-tone")[0];
        assert_eq!(child_run.messages[1].content, "This is ridiculous");
        let last = child_run.messages.last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(last.content.starts_with("Arguments: "));
    }

    #[tokio::test]
    async fn test_sub_agent_text_answer_returned_as_is() {
        let runtime = StubAgentRuntime::new()
            .with_tool_call("mock-customer", "summarize", json!({"incoming_message": "Is the Civic in stock?"}))
            .with_response("mock-customer", json!({"reply": "Checking now."}))
            .with_response("summarize", json!("Customer asks about Civic stock"));

        let parent = AgentDefinition::new("mock-customer", "openai:gpt-4.1").with_sub_agent("summarize");
        let child = AgentDefinition::new("summarize", "openai:gpt-4.1").with_dependency(Dependency::new("incoming_message"));
        let c = composer(vec![parent, child], json!({}), runtime.clone());

        let composed = c
            .create_agent("mock-customer", &ToolRegistry::new(), &SessionState::new(), &Arguments::new())
            .unwrap();
        composed.agent.run(composed.input()).await.unwrap();

        let (tool_name, result) = &runtime.runs_of("mock-customer")[0].tool_results[0];
        assert_eq!(tool_name, "summarize");
        assert_eq!(result.as_ref().unwrap(), &json!("Customer asks about Civic stock"));
    }

    #[test]
    fn test_grandchild_build_failure_aborts_parent() {
        let runtime = StubAgentRuntime::new();
        let parent = AgentDefinition::new("parent", "openai:gpt-4.1").with_sub_agent("child");
        let child = AgentDefinition::new("child", "openai:gpt-4.1").with_sub_agent("grandchild");
        let grandchild = AgentDefinition::new("grandchild", "openai:gpt-4.1").with_tool("demo-missing");
        let c = composer(vec![parent, child, grandchild], json!({}), runtime.clone());

        let err = c
            .create_agent("parent", &ToolRegistry::new(), &SessionState::new(), &Arguments::new())
            .err()
            .unwrap();

        assert!(matches!(err, SequenceError::ToolNotFound(id) if id == "demo-missing"));
        // 실패 지점 위의 어떤 에이전트도 빌드되지 않습니다
        assert!(runtime.builds().is_empty());
    }
}
