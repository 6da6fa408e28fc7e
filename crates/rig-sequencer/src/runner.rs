// src/runner.rs
//! 시퀀스 오케스트레이터
//!
//! 한 번의 실행:
//! 1. `load_configurations()`: 시퀀스, 클라이언트 설정, 에이전트 정의 로드
//! 2. `run()`: 초기 상태에 `client_id` 보장 → 도구 세션 열기 → 컴파일 →
//!    순차 실행 → 세션 닫기 → 최종 상태 반환
//!
//! 세션은 성공, 실패, 취소 모두에서 닫히고, 실행 future가 버려지면 drop 시점에 해제됩니다.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::agent::AgentDefinition;
use crate::composer::AgentComposer;
use crate::error::SequenceError;
use crate::loader::ConfigLoader;
use crate::runtime::AgentRuntime;
use crate::sequence::Sequence;
use crate::state::SessionState;
use crate::tools::{ToolRegistry, ToolTransport};
use crate::workflow::WorkflowCompiler;

/// 실행 요청
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub sequence_id: String,
    pub client_id: String,
    /// 로깅용
    pub product_id: String,
    pub initial_state: SessionState,
}

impl RunRequest {
    pub fn new(
        sequence_id: impl Into<String>,
        client_id: impl Into<String>,
        product_id: impl Into<String>,
    ) -> Self {
        Self {
            sequence_id: sequence_id.into(),
            client_id: client_id.into(),
            product_id: product_id.into(),
            initial_state: SessionState::new(),
        }
    }

    pub fn with_initial_state(mut self, state: SessionState) -> Self {
        self.initial_state = state;
        self
    }
}

/// 로드된 설정
struct LoadedConfiguration {
    sequence: Sequence,
    compiler: WorkflowCompiler,
}

/// 시퀀스 실행기
pub struct SequenceRunner {
    request: RunRequest,
    loader: Arc<dyn ConfigLoader>,
    transport: Arc<dyn ToolTransport>,
    runtime: Arc<dyn AgentRuntime>,
    loaded: Option<LoadedConfiguration>,
}

impl SequenceRunner {
    pub fn new(
        request: RunRequest,
        loader: Arc<dyn ConfigLoader>,
        transport: Arc<dyn ToolTransport>,
        runtime: Arc<dyn AgentRuntime>,
    ) -> Self {
        Self {
            request,
            loader,
            transport,
            runtime,
            loaded: None,
        }
    }

    pub fn request(&self) -> &RunRequest {
        &self.request
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// 로드된 시퀀스 (로드 전에는 None)
    pub fn sequence(&self) -> Option<&Sequence> {
        self.loaded.as_ref().map(|l| &l.sequence)
    }

    /// 시퀀스, 클라이언트 설정, 에이전트 정의 로드. `run()` 전에 호출해야 합니다.
    pub async fn load_configurations(&mut self) -> Result<(), SequenceError> {
        let sequence = self.loader.load_sequence(&self.request.sequence_id).await?;
        let client_config: Map<String, Value> = self.loader.load_client_config(&self.request.client_id).await?;
        let agents: HashMap<String, AgentDefinition> = self.loader.load_all_agents().await?;

        tracing::debug!(
            sequence_id = %sequence.id,
            steps = sequence.steps.len(),
            agents = agents.len(),
            client_keys = client_config.len(),
            "Loaded configurations"
        );

        let composer = AgentComposer::new(Arc::new(agents), Arc::new(client_config), Arc::clone(&self.runtime));
        self.loaded = Some(LoadedConfiguration {
            sequence,
            compiler: WorkflowCompiler::new(Arc::new(composer)),
        });
        Ok(())
    }

    pub async fn run(&self) -> Result<SessionState, SequenceError> {
        self.run_with_cancellation(&CancellationToken::new()).await
    }

    /// 스텝 사이마다 취소 토큰을 확인하며 실행
    pub async fn run_with_cancellation(&self, cancel: &CancellationToken) -> Result<SessionState, SequenceError> {
        let span = tracing::info_span!(
            "sequence_run",
            run_id = %Uuid::new_v4(),
            sequence_id = %self.request.sequence_id,
            client_id = %self.request.client_id,
            product_id = %self.request.product_id,
        );
        self.run_inner(cancel).instrument(span).await
    }

    async fn run_inner(&self, cancel: &CancellationToken) -> Result<SessionState, SequenceError> {
        let loaded = self.loaded.as_ref().ok_or(SequenceError::NotLoaded)?;

        let mut state = self.request.initial_state.clone();
        state.set_default("client_id", Value::String(self.request.client_id.clone()));

        tracing::info!(steps = loaded.sequence.steps.len(), "Sequence run starting");

        // 이 future가 버려지면 세션은 drop 시점에 해제됩니다
        let mut session = self.transport.open().await?;
        let tools = Arc::new(ToolRegistry::from_tools(session.tools()));

        let result = match loaded.compiler.compile(&loaded.sequence, tools) {
            Ok(compiled) => compiled.run_with_cancellation(state, cancel).await,
            Err(e) => Err(e),
        };

        let closed = session.close().await;

        match (result, closed) {
            (Ok(state), Ok(())) => {
                tracing::info!(keys = state.len(), "Sequence run finished");
                Ok(state)
            }
            (Ok(state), Err(close_err)) => {
                tracing::warn!(error = %close_err, "Tool session close failed after successful run");
                Ok(state)
            }
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    tracing::warn!(error = %close_err, "Tool session close failed");
                }
                tracing::error!(error = %e, "Sequence run failed");
                Err(e)
            }
        }
    }
}
