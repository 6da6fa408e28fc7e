// src/handler.rs
//! 최상위 진입점: 페이로드 → 실행 → 응답
//!
//! 성공하면 200과 최종 상태 JSON, 실패하면 500과 `{"message": ...}`.
//! 부분 상태는 돌려주지 않습니다.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::SequenceError;
use crate::loader::ConfigLoader;
use crate::runner::{RunRequest, SequenceRunner};
use crate::runtime::AgentRuntime;
use crate::state::SessionState;
use crate::tools::ToolTransport;

pub const STATUS_OK: u16 = 200;
pub const STATUS_INTERNAL_SERVER_ERROR: u16 = 500;

/// 실행 요청 페이로드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRunnerPayload {
    pub sequence_id: String,
    pub client_id: String,
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<SessionState>,
}

impl SequenceRunnerPayload {
    pub fn into_request(self) -> RunRequest {
        RunRequest::new(self.sequence_id, self.client_id, self.product_id)
            .with_initial_state(self.initial_state.unwrap_or_default())
    }
}

/// 응답. `body`는 JSON 문자열입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceRunnerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl SequenceRunnerResponse {
    pub fn ok(state: &SessionState) -> Self {
        Self {
            status_code: STATUS_OK,
            body: Value::Object(state.as_map().clone()).to_string(),
        }
    }

    pub fn error(err: &SequenceError) -> Self {
        Self {
            status_code: STATUS_INTERNAL_SERVER_ERROR,
            body: json!({ "message": err.to_string() }).to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }

    /// body를 JSON으로 해석
    pub fn body_json(&self) -> Result<Value, SequenceError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// 실행에 필요한 공유 협력자
#[derive(Clone)]
pub struct HandlerDeps {
    pub loader: Arc<dyn ConfigLoader>,
    pub transport: Arc<dyn ToolTransport>,
    pub runtime: Arc<dyn AgentRuntime>,
}

impl HandlerDeps {
    pub fn new(
        loader: Arc<dyn ConfigLoader>,
        transport: Arc<dyn ToolTransport>,
        runtime: Arc<dyn AgentRuntime>,
    ) -> Self {
        Self {
            loader,
            transport,
            runtime,
        }
    }
}

pub async fn handle(payload: SequenceRunnerPayload, deps: &HandlerDeps) -> SequenceRunnerResponse {
    handle_with_cancellation(payload, deps, &CancellationToken::new()).await
}

pub async fn handle_with_cancellation(
    payload: SequenceRunnerPayload,
    deps: &HandlerDeps,
    cancel: &CancellationToken,
) -> SequenceRunnerResponse {
    match run(payload, deps, cancel).await {
        Ok(state) => SequenceRunnerResponse::ok(&state),
        Err(e) => {
            tracing::error!(error = %e, configuration_error = e.is_configuration_error(), "Sequence handler failed");
            SequenceRunnerResponse::error(&e)
        }
    }
}

async fn run(
    payload: SequenceRunnerPayload,
    deps: &HandlerDeps,
    cancel: &CancellationToken,
) -> Result<SessionState, SequenceError> {
    let mut runner = SequenceRunner::new(
        payload.into_request(),
        Arc::clone(&deps.loader),
        Arc::clone(&deps.transport),
        Arc::clone(&deps.runtime),
    );
    runner.load_configurations().await?;
    runner.run_with_cancellation(cancel).await
}
