//! Adapter for registering Rig tools as sequence tools
//!
//! | Aspect | Rig Tool | `CallableTool` |
//! |--------|----------|----------------|
//! | Args | Typed `Self::Args` | JSON object |
//! | Output | Typed `Self::Output` | JSON value |
//! | Definition | Async | Cached at registration |
//!
//! Rig tools are natively async, so they register with the native-async shape.
//!
//! ```rust,ignore
//! use rig::tools::think::ThinkTool;
//!
//! let think = RigToolAdapter::new(ThinkTool).await.into_callable();
//! transport = transport.with_tool(think);
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Debug;

use crate::error::ToolError;
use crate::tools::{AsyncInvoke, CallableTool, ToolDefinition};

/// Wraps a Rig `Tool` so it can be invoked through the normalizer.
pub struct RigToolAdapter<T>
where
    T: rig::tool::Tool + Send + Sync,
{
    inner: T,
    /// Computed once at construction
    cached_definition: ToolDefinition,
}

impl<T> RigToolAdapter<T>
where
    T: rig::tool::Tool + Send + Sync + 'static,
    T::Args: DeserializeOwned + Send + Sync,
    T::Output: Serialize + Send,
    T::Error: std::error::Error + Send + Sync + 'static,
{
    /// Async because Rig tool definitions are async.
    pub async fn new(tool: T) -> Self {
        let rig_def = tool.definition(String::new()).await;

        Self {
            cached_definition: ToolDefinition::new(rig_def.name, rig_def.description, rig_def.parameters),
            inner: tool,
        }
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.cached_definition
    }

    /// Register as a native-async `CallableTool`
    pub fn into_callable(self) -> CallableTool {
        let definition = self.cached_definition.clone();
        CallableTool::native(definition, self)
    }
}

#[async_trait]
impl<T> AsyncInvoke for RigToolAdapter<T>
where
    T: rig::tool::Tool + Send + Sync + 'static,
    T::Args: DeserializeOwned + Send + Sync,
    T::Output: Serialize + Send,
    T::Error: std::error::Error + Send + Sync + 'static,
{
    async fn ainvoke(&self, input: Map<String, Value>) -> Result<Value, ToolError> {
        let typed_args: T::Args = serde_json::from_value(Value::Object(input)).map_err(|e| {
            ToolError::invalid_arguments(format!(
                "Failed to deserialize args for tool '{}': {}",
                T::NAME,
                e
            ))
        })?;

        let result = self
            .inner
            .call(typed_args)
            .await
            .map_err(|e| ToolError::execution(format!("Tool '{}' execution failed: {}", T::NAME, e)))?;

        serde_json::to_value(&result).map_err(|e| {
            ToolError::execution(format!(
                "Failed to serialize output from tool '{}': {}",
                T::NAME,
                e
            ))
        })
    }
}

impl<T> Debug for RigToolAdapter<T>
where
    T: rig::tool::Tool + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigToolAdapter")
            .field("tool_name", &T::NAME)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SequenceError;
    use crate::tools::invoke;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct HoursArgs {
        weekday: String,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("Hours error: {0}")]
    struct HoursError(String);

    struct AppointmentHours;

    impl rig::tool::Tool for AppointmentHours {
        const NAME: &'static str = "demo-get_appointment_hours";

        type Error = HoursError;
        type Args = HoursArgs;
        type Output = Value;

        async fn definition(&self, _prompt: String) -> rig::completion::ToolDefinition {
            rig::completion::ToolDefinition {
                name: Self::NAME.to_string(),
                description: "Service department hours for a weekday".to_string(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {"weekday": {"type": "string"}},
                    "required": ["weekday"]
                }),
            }
        }

        async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
            match args.weekday.as_str() {
                "sunday" => Err(HoursError("closed".to_string())),
                day => Ok(serde_json::json!({"weekday": day, "open": "08:00", "close": "18:00"})),
            }
        }
    }

    #[tokio::test]
    async fn test_adapter_caches_definition() {
        let adapter = RigToolAdapter::new(AppointmentHours).await;
        assert_eq!(adapter.definition().name, "demo-get_appointment_hours");
        assert!(format!("{:?}", adapter).contains("demo-get_appointment_hours"));
    }

    #[tokio::test]
    async fn test_callable_filters_and_calls() {
        let tool = RigToolAdapter::new(AppointmentHours).await.into_callable();
        assert_eq!(tool.shape().kind(), "native_async");

        let context = serde_json::json!({"weekday": "monday", "client_id": "client-123"})
            .as_object()
            .cloned()
            .unwrap();
        let result = invoke(&tool, &context).await.unwrap();
        assert_eq!(result["open"], "08:00");
    }

    #[tokio::test]
    async fn test_invalid_args_and_tool_error() {
        let tool = RigToolAdapter::new(AppointmentHours).await.into_callable();

        let err = invoke(&tool, &Map::new()).await.unwrap_err();
        assert!(matches!(
            err,
            SequenceError::ToolExecution { source: ToolError::InvalidArguments(_), .. }
        ));

        let sunday = serde_json::json!({"weekday": "sunday"}).as_object().cloned().unwrap();
        let err = invoke(&tool, &sunday).await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
