// src/tools/transport.rs
//! 도구 전송 계층
//!
//! 한 번의 실행 동안 유지되는 세션을 열어 사용 가능한 도구 목록을 제공합니다.
//! 정상 경로에서는 오케스트레이터가 `close()`로 닫고, 실행 future가 중간에
//! 버려지면 세션의 `Drop`이 자원을 해제합니다.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::SequenceError;
use super::CallableTool;

/// 실행 단위로 열리는 도구 세션
///
/// 구현체는 `close()`가 호출되지 않은 채 drop되어도 자원을 해제해야 합니다.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// 이 세션에서 사용 가능한 도구
    fn tools(&self) -> Vec<CallableTool>;

    /// 세션 자원 해제 (여러 번 호출해도 안전해야 함)
    async fn close(&mut self) -> Result<(), SequenceError>;
}

/// 도구 세션 팩토리
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn open(&self) -> Result<Box<dyn ToolSession>, SequenceError>;
}

/// 프로세스 내 고정 도구 집합을 제공하는 전송
///
/// 열린 세션 수를 추적하므로 세션 누수를 테스트에서 확인할 수 있습니다.
#[derive(Clone, Default)]
pub struct StaticToolTransport {
    tools: Vec<CallableTool>,
    active: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
}

impl StaticToolTransport {
    pub fn new(tools: Vec<CallableTool>) -> Self {
        Self {
            tools,
            ..Default::default()
        }
    }

    pub fn with_tool(mut self, tool: CallableTool) -> Self {
        self.tools.push(tool);
        self
    }

    /// 아직 닫히지 않은 세션 수
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// 지금까지 열린 세션 수
    pub fn opened_sessions(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolTransport for StaticToolTransport {
    async fn open(&self) -> Result<Box<dyn ToolSession>, SequenceError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(tools = self.tools.len(), "Opened static tool session");

        Ok(Box::new(StaticToolSession {
            tools: self.tools.clone(),
            active: Arc::clone(&self.active),
            closed: false,
        }))
    }
}

struct StaticToolSession {
    tools: Vec<CallableTool>,
    active: Arc<AtomicUsize>,
    closed: bool,
}

impl StaticToolSession {
    /// 처음 호출될 때만 카운터를 줄이고 true를 돌려줍니다
    fn release(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        self.active.fetch_sub(1, Ordering::SeqCst);
        true
    }
}

impl Drop for StaticToolSession {
    fn drop(&mut self) {
        if self.release() {
            tracing::debug!("Released static tool session on drop");
        }
    }
}

#[async_trait]
impl ToolSession for StaticToolSession {
    fn tools(&self) -> Vec<CallableTool> {
        self.tools.clone()
    }

    async fn close(&mut self) -> Result<(), SequenceError> {
        if self.release() {
            tracing::debug!("Closed static tool session");
        }
        Ok(())
    }
}
