// src/workflow/graph.rs
//! 시퀀스 그래프 빌더와 컴파일된 실행 체인
//!
//! 노드와 간선을 선언한 뒤 `build()`가 START에서 END까지 분기 없는
//! 한 줄 체인인지 검증합니다. 실행은 체인 순서대로 노드를 하나씩 돌립니다.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::SequenceError;
use crate::sequence::StepKind;
use crate::state::SessionState;
use super::node::StepNode;

/// 진입 센티널
pub const START: &str = "START";
/// 종료 센티널
pub const END: &str = "END";

/// 간선
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

/// 그래프 검증 에러
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowBuildError {
    #[error("workflow entry point not set")]
    NoEntryPoint,
    #[error("unknown node id: {0}")]
    UnknownNode(String),
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),
    #[error("reserved node id: {0}")]
    ReservedName(String),
    #[error("node {0} has more than one outgoing edge")]
    Branching(String),
    #[error("node {0} is visited twice")]
    Cycle(String),
    #[error("node {0} has no outgoing edge")]
    DeadEnd(String),
    #[error("node {0} is not reachable from START")]
    Unreachable(String),
}

impl From<WorkflowBuildError> for SequenceError {
    fn from(err: WorkflowBuildError) -> Self {
        SequenceError::InvalidConfiguration(format!("invalid sequence graph: {err}"))
    }
}

/// 선형 시퀀스 그래프 빌더
#[derive(Debug, Default)]
pub struct SequenceGraph {
    name: String,
    nodes: Vec<StepNode>,
    edges: Vec<GraphEdge>,
}

impl SequenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn node(mut self, node: StepNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(GraphEdge {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    /// 검증 후 실행 순서가 정해진 체인으로 변환
    pub fn build(self) -> Result<CompiledSequence, WorkflowBuildError> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            let name = node.name();
            if name == START || name == END {
                return Err(WorkflowBuildError::ReservedName(name.to_string()));
            }
            if index.insert(name.to_string(), i).is_some() {
                return Err(WorkflowBuildError::DuplicateNode(name.to_string()));
            }
        }

        let mut next: HashMap<&str, &str> = HashMap::new();
        for edge in &self.edges {
            if edge.from != START && !index.contains_key(&edge.from) {
                return Err(WorkflowBuildError::UnknownNode(edge.from.clone()));
            }
            if edge.to != END && !index.contains_key(&edge.to) {
                return Err(WorkflowBuildError::UnknownNode(edge.to.clone()));
            }
            if next.insert(edge.from.as_str(), edge.to.as_str()).is_some() {
                return Err(WorkflowBuildError::Branching(edge.from.clone()));
            }
        }

        // START → ... → END
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited = HashSet::new();
        let mut current = *next.get(START).ok_or(WorkflowBuildError::NoEntryPoint)?;
        while current != END {
            if !visited.insert(current) {
                return Err(WorkflowBuildError::Cycle(current.to_string()));
            }
            order.push(index[current]);
            current = next
                .get(current)
                .copied()
                .ok_or_else(|| WorkflowBuildError::DeadEnd(current.to_string()))?;
        }

        if let Some(orphan) = self.nodes.iter().find(|n| !visited.contains(n.name())) {
            return Err(WorkflowBuildError::Unreachable(orphan.name().to_string()));
        }

        let mut slots: Vec<Option<StepNode>> = self.nodes.into_iter().map(Some).collect();
        let nodes = order.into_iter().filter_map(|i| slots[i].take()).collect();

        Ok(CompiledSequence { name: self.name, nodes })
    }
}

/// 실행 가능한 선형 체인
#[derive(Debug, Clone)]
pub struct CompiledSequence {
    name: String,
    nodes: Vec<StepNode>,
}

impl CompiledSequence {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[StepNode] {
        &self.nodes
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name()).collect()
    }

    /// START부터 END까지의 간선 목록
    pub fn edges(&self) -> Vec<GraphEdge> {
        let mut names = Vec::with_capacity(self.nodes.len() + 2);
        names.push(START);
        names.extend(self.node_names());
        names.push(END);

        names
            .windows(2)
            .map(|pair| GraphEdge {
                from: pair[0].to_string(),
                to: pair[1].to_string(),
            })
            .collect()
    }

    /// Mermaid flowchart 텍스트
    pub fn to_mermaid(&self) -> String {
        let mut lines = vec!["graph TD".to_string()];
        lines.push(format!("    {START}([{START}])"));
        for node in &self.nodes {
            let id = sanitize_id(node.name());
            let label = node.name();
            lines.push(match node.step().kind {
                StepKind::Tool => format!("    {id}[[{label}]]"),
                StepKind::Agent => format!("    {id}[{label}]"),
                StepKind::Unknown(_) => format!("    {id}({label})"),
            });
        }
        lines.push(format!("    {END}([{END}])"));

        for edge in self.edges() {
            lines.push(format!("    {} --> {}", sanitize_id(&edge.from), sanitize_id(&edge.to)));
        }
        lines.join("\n")
    }

    pub async fn run(&self, state: SessionState) -> Result<SessionState, SequenceError> {
        self.run_with_cancellation(state, &CancellationToken::new()).await
    }

    /// 스텝 사이마다 취소 여부를 확인하며 실행 (실행 중인 스텝은 끊지 않습니다)
    pub async fn run_with_cancellation(
        &self,
        mut state: SessionState,
        cancel: &CancellationToken,
    ) -> Result<SessionState, SequenceError> {
        for node in &self.nodes {
            if cancel.is_cancelled() {
                tracing::warn!(sequence_id = %self.name, step_id = %node.name(), "Run cancelled");
                return Err(SequenceError::Cancelled(node.name().to_string()));
            }
            state = node.execute(state).await?;
        }
        Ok(state)
    }
}

/// Mermaid 노드 id로 쓸 수 없는 문자를 `_`로 치환
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
