//! LLM Provider abstractions
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        ReactAgent (runtime::react)      │
//! └─────────────────┬───────────────────────┘
//!                   │ uses
//!                   ▼
//! ┌─────────────────────────────────────────┐
//! │        LLMProvider (trait)              │
//! │  - complete(messages, tools, config)    │
//! └─────────────────┬───────────────────────┘
//!                   │ implemented by
//!                   ▼
//! ┌─────────────────────────────────────────┐
//! │         RigAgentAdapter                 │
//! │   (wraps any Rig Agent<M>)              │
//! └─────────────────────────────────────────┘
//! ```

mod config;
mod provider;

pub use config::{LLMConfig, TokenUsage};
pub use provider::{LLMProvider, LLMResponse};
