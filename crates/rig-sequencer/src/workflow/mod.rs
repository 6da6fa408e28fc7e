//! 워크플로우 컴파일러
//!
//! ```text
//! Sequence { steps }
//!        │ WorkflowCompiler::compile
//!        ▼
//! START ──▶ step_1 ──▶ step_2 ──▶ ... ──▶ END
//!            │
//!            └─ StepNode::execute(state) -> state
//!                 skip? → tool | agent → merge
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let compiler = WorkflowCompiler::new(composer);
//! let compiled = compiler.compile(&sequence, tools)?;
//! let final_state = compiled.run(initial_state).await?;
//! ```

pub mod compiler;
pub mod graph;
pub mod node;

pub use compiler::{node_names, WorkflowCompiler};
pub use graph::{CompiledSequence, GraphEdge, SequenceGraph, WorkflowBuildError, END, START};
pub use node::{merge_output, StepNode};
