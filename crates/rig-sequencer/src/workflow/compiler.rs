// src/workflow/compiler.rs
//! 시퀀스 → 선형 그래프 컴파일

use std::collections::HashMap;
use std::sync::Arc;

use crate::composer::AgentComposer;
use crate::error::SequenceError;
use crate::sequence::Sequence;
use crate::tools::ToolRegistry;
use super::graph::{CompiledSequence, SequenceGraph, END, START};
use super::node::StepNode;

/// 선언된 스텝 목록을 START → ... → END 체인으로 엮습니다
#[derive(Clone)]
pub struct WorkflowCompiler {
    composer: Arc<AgentComposer>,
}

impl WorkflowCompiler {
    pub fn new(composer: Arc<AgentComposer>) -> Self {
        Self { composer }
    }

    pub fn compile(&self, sequence: &Sequence, tools: Arc<ToolRegistry>) -> Result<CompiledSequence, SequenceError> {
        let names = node_names(sequence);

        let mut graph = SequenceGraph::new().name(&sequence.id);
        let mut previous = START.to_string();
        for (name, step) in names.iter().zip(&sequence.steps) {
            graph = graph
                .node(StepNode::new(
                    name.clone(),
                    step.clone(),
                    Arc::clone(&tools),
                    Arc::clone(&self.composer),
                ))
                .edge(previous, name.clone());
            previous = name.clone();
        }
        graph = graph.edge(previous, END);

        let compiled = graph.build()?;
        tracing::debug!(
            sequence_id = %sequence.id,
            nodes = ?compiled.node_names(),
            "Compiled sequence"
        );
        Ok(compiled)
    }
}

/// 스텝 id를 노드 이름으로. 두 번째 이후 등장은 `#n` 접미사.
pub fn node_names(sequence: &Sequence) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    sequence
        .steps
        .iter()
        .map(|step| {
            let count = seen.entry(step.id.as_str()).or_insert(0);
            *count += 1;
            if *count == 1 {
                step.id.clone()
            } else {
                format!("{}#{}", step.id, count)
            }
        })
        .collect()
}
