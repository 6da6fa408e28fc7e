//! Compatibility layer for Rig framework integration
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    rig-sequencer                            │
//! │  ┌──────────────────┐       ┌──────────────────────────┐   │
//! │  │ CallableTool     │       │ LLMProvider trait        │   │
//! │  │ (JSON in/out)    │       │ (messages + tools)       │   │
//! │  └────────┬─────────┘       └────────────┬─────────────┘   │
//! │           │ adapts                       │ adapts           │
//! │           ▼                              ▼                  │
//! │  ┌──────────────────┐       ┌──────────────────────────┐   │
//! │  │ RigToolAdapter   │       │ RigAgentAdapter          │   │
//! │  │ (wraps Rig Tool) │       │ (wraps Rig Agent)        │   │
//! │  └────────┬─────────┘       └────────────┬─────────────┘   │
//! └───────────│──────────────────────────────│──────────────────┘
//!             ▼                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Rig Framework                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod rig_agent_adapter;
mod rig_tool_adapter;

pub use rig_agent_adapter::RigAgentAdapter;
pub use rig_tool_adapter::RigToolAdapter;
