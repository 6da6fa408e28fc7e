//! # Demo Tools Module
//!
//! In-process stand-ins for the dealership tool server used by the demo
//! catalogue. Every `demo-*` tool id referenced by `catalog/demo.yaml` is
//! served here, and together they cover all four invocation shapes the
//! sequence engine understands:
//!
//! | Tool | Shape |
//! |------|-------|
//! | `demo-get_inventory_information`, `demo-get_conversation_history` | native async |
//! | `demo-get_journey_instruction` | legacy `arun` (keyword args, text result) |
//! | `demo-detect_opt_out`, `demo-schedule_appointment` | coroutine (ready or pending) |
//! | `demo-append_signature`, `demo-send_reply`, `demo-get_appointment_hours` | blocking |
//! | `demo-get_current_time` | Rig `Tool` through `RigToolAdapter` |

use async_trait::async_trait;
use futures::FutureExt;
use rig::completion::ToolDefinition as RigToolDefinition;
use rig::tool::Tool;
use rig_sequencer::tools::KeywordArgs;
use rig_sequencer::{
    AsyncInvoke, BlockingInvoke, CallableTool, DualInvoke, Invocation, LegacyRun, RigToolAdapter,
    StaticToolTransport, ToolDefinition, ToolError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

// =============================================================================
// CUSTOM ERROR TYPE
// =============================================================================
/// Errors raised by the demo tools before they are handed to the engine.
///
/// The engine only sees `ToolError`; the `From` impl below decides which
/// failures count as bad arguments and which count as execution failures.
#[derive(Error, Debug)]
pub enum DemoToolError {
    #[error("missing argument '{0}'")]
    MissingArgument(&'static str),

    #[error("argument '{name}' must be {expected}")]
    InvalidArgument { name: &'static str, expected: &'static str },

    #[error("no appointment slot available at {0}")]
    SlotUnavailable(String),
}

impl From<DemoToolError> for ToolError {
    fn from(err: DemoToolError) -> Self {
        match err {
            DemoToolError::MissingArgument(_) | DemoToolError::InvalidArgument { .. } => {
                ToolError::invalid_arguments(err.to_string())
            }
            DemoToolError::SlotUnavailable(_) => ToolError::execution(err.to_string()),
        }
    }
}

fn required_str<'a>(input: &'a Map<String, Value>, name: &'static str) -> Result<&'a str, DemoToolError> {
    match input.get(name) {
        None | Some(Value::Null) => Err(DemoToolError::MissingArgument(name)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(DemoToolError::InvalidArgument { name, expected: "a string" }),
    }
}

/// `incoming_message`는 문자열이거나 `{"content": ...}` 객체
fn message_text(input: &Map<String, Value>) -> Option<&str> {
    match input.get("incoming_message")? {
        Value::String(s) => Some(s),
        Value::Object(obj) => obj.get("content").and_then(Value::as_str),
        _ => None,
    }
}

fn schema(properties: Value) -> Value {
    json!({"type": "object", "properties": properties})
}

// =============================================================================
// NATIVE ASYNC TOOLS
// =============================================================================
/// Inventory lookup against a tiny in-memory stock list.
pub struct InventoryTool {
    stock: Vec<(&'static str, u32)>,
}

impl Default for InventoryTool {
    fn default() -> Self {
        Self {
            stock: vec![("Civic", 3), ("Accord", 1), ("CR-V", 0), ("HR-V", 2)],
        }
    }
}

#[async_trait]
impl AsyncInvoke for InventoryTool {
    async fn ainvoke(&self, input: Map<String, Value>) -> Result<Value, ToolError> {
        let model = required_str(&input, "model")?;
        let found = self
            .stock
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(model));

        debug!(model = %model, found = found.is_some(), "Inventory lookup");

        Ok(match found {
            Some((name, count)) => json!({"model": name, "in_stock": count}),
            None => json!({"model": model, "in_stock": 0, "note": "model not carried"}),
        })
    }
}

struct ConversationHistoryTool;

#[async_trait]
impl AsyncInvoke for ConversationHistoryTool {
    async fn ainvoke(&self, input: Map<String, Value>) -> Result<Value, ToolError> {
        let client_id = input.get("client_id").and_then(Value::as_str).unwrap_or("unknown");
        Ok(json!({"client_id": client_id, "messages": []}))
    }
}

// =============================================================================
// LEGACY ARUN TOOL
// =============================================================================
/// Journey instructions per dealership, returned as plain text.
struct JourneyInstructionTool;

#[async_trait]
impl LegacyRun for JourneyInstructionTool {
    async fn arun(&self, kwargs: KeywordArgs) -> Result<String, ToolError> {
        let client_id = required_str(&kwargs, "client_id")?;
        let instruction = match client_id {
            "bobola-dealership" => "The customer came from a test-drive booking; offer to confirm the slot",
            _ => "Answer the inquiry and invite the customer to visit the showroom",
        };
        Ok(instruction.to_string())
    }
}

// =============================================================================
// COROUTINE TOOLS
// =============================================================================
const OPT_OUT_PHRASES: [&str; 4] = ["stop", "unsubscribe", "opt out", "opt-out"];

/// Keyword-based opt-out check. Always answers synchronously.
struct OptOutTool;

impl DualInvoke for OptOutTool {
    fn invoke(&self, input: Map<String, Value>) -> Invocation {
        let opted_out = message_text(&input)
            .map(|text| {
                let lower = text.to_lowercase();
                OPT_OUT_PHRASES.iter().any(|phrase| lower.contains(phrase))
            })
            .unwrap_or(false);
        Invocation::Ready(Ok(Value::Bool(opted_out)))
    }
}

/// Books an appointment. Argument errors are reported immediately,
/// the booking itself runs as a future.
struct ScheduleAppointmentTool {
    booked: Vec<&'static str>,
}

impl DualInvoke for ScheduleAppointmentTool {
    fn invoke(&self, input: Map<String, Value>) -> Invocation {
        let slot = match required_str(&input, "slot") {
            Ok(slot) => slot.to_string(),
            Err(e) => return Invocation::Ready(Err(e.into())),
        };
        let taken = self.booked.iter().any(|b| *b == slot);

        let booking = async move {
            if taken {
                return Err(ToolError::from(DemoToolError::SlotUnavailable(slot)));
            }
            info!(slot = %slot, "Appointment booked");
            Ok(json!({"booked": true, "slot": slot}))
        };
        Invocation::Pending(booking.boxed())
    }
}

// =============================================================================
// BLOCKING TOOLS
// =============================================================================
struct AppendSignatureTool;

impl BlockingInvoke for AppendSignatureTool {
    fn invoke_blocking(&self, input: Map<String, Value>) -> Result<Value, ToolError> {
        let dealership = match input.get("client_id").and_then(Value::as_str) {
            Some("client-123") | None => "Waterloo Honda",
            Some(other) => other,
        };
        Ok(Value::String(format!("Best regards,\n{dealership}")))
    }
}

/// Pretends to deliver the reply; reports what would be sent.
struct SendReplyTool;

impl BlockingInvoke for SendReplyTool {
    fn invoke_blocking(&self, input: Map<String, Value>) -> Result<Value, ToolError> {
        let body = input
            .get("reply")
            .and_then(|r| r.pointer("/content/body"))
            .and_then(Value::as_str);
        let signature = input.get("append_signature_result").and_then(Value::as_str);

        Ok(json!({
            "sent": body.is_some(),
            "channel": input.get("reply").and_then(|r| r.get("channel")).cloned().unwrap_or(Value::Null),
            "signature": signature,
        }))
    }
}

// =============================================================================
// RIG TOOL
// =============================================================================
#[derive(Debug, Deserialize, Serialize)]
pub struct CurrentTimeArgs {
    /// strftime 형식 (생략 시 RFC 3339)
    #[serde(default)]
    pub format: Option<String>,
}

/// Current local time, written as a plain Rig tool.
#[derive(Debug, Clone, Default)]
pub struct CurrentTimeTool;

impl Tool for CurrentTimeTool {
    const NAME: &'static str = "demo-get_current_time";

    type Args = CurrentTimeArgs;
    type Output = String;
    type Error = DemoToolError;

    async fn definition(&self, _prompt: String) -> RigToolDefinition {
        RigToolDefinition {
            name: Self::NAME.to_string(),
            description: "Returns the dealership's current local date and time".to_string(),
            parameters: schema(json!({
                "format": {
                    "type": "string",
                    "description": "Optional strftime format, e.g. %H:%M"
                }
            })),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let now = chrono::Local::now();
        Ok(match args.format {
            Some(format) => now.format(&format).to_string(),
            None => now.to_rfc3339(),
        })
    }
}

// =============================================================================
// REGISTRATION
// =============================================================================
/// All demo tools, ready to be served by a `StaticToolTransport`.
pub async fn demo_tools() -> Vec<CallableTool> {
    vec![
        CallableTool::native(
            ToolDefinition::new(
                "demo-get_inventory_information",
                "Looks up how many vehicles of a model are in stock",
                schema(json!({"model": {"type": "string"}, "client_id": {"type": "string"}})),
            ),
            InventoryTool::default(),
        ),
        CallableTool::native(
            ToolDefinition::new(
                "demo-get_conversation_history",
                "Returns the previous messages exchanged with the customer",
                schema(json!({"client_id": {"type": "string"}})),
            ),
            ConversationHistoryTool,
        ),
        CallableTool::legacy(
            ToolDefinition::new(
                "demo-get_journey_instruction",
                "Returns the journey-specific reply instructions for a dealership",
                schema(json!({"client_id": {"type": "string"}})),
            ),
            JourneyInstructionTool,
        ),
        CallableTool::coroutine(
            ToolDefinition::new(
                "demo-detect_opt_out",
                "Detects whether the customer asked to stop receiving messages",
                schema(json!({"incoming_message": {}})),
            ),
            OptOutTool,
        ),
        CallableTool::coroutine(
            ToolDefinition::new(
                "demo-schedule_appointment",
                "Books a showroom appointment",
                schema(json!({"slot": {"type": "string"}, "client_id": {"type": "string"}})),
            ),
            ScheduleAppointmentTool { booked: vec!["09:00"] },
        ),
        CallableTool::blocking(
            ToolDefinition::new(
                "demo-append_signature",
                "Builds the dealership signature for outgoing replies",
                schema(json!({"client_id": {"type": "string"}})),
            ),
            AppendSignatureTool,
        ),
        CallableTool::blocking(
            ToolDefinition::new(
                "demo-send_reply",
                "Sends the generated reply to the customer",
                schema(json!({"reply": {}, "append_signature_result": {}})),
            ),
            SendReplyTool,
        ),
        CallableTool::from_blocking_fn(
            ToolDefinition::new(
                "demo-get_appointment_hours",
                "Returns the showroom opening hours",
                json!({"type": "object"}),
            ),
            |_| Ok(json!({"weekdays": "09:00-18:00", "saturday": "09:00-16:00", "sunday": "closed"})),
        ),
        RigToolAdapter::new(CurrentTimeTool).await.into_callable(),
    ]
}

/// Transport serving the demo tools in-process
pub async fn demo_transport() -> StaticToolTransport {
    StaticToolTransport::new(demo_tools().await)
}
