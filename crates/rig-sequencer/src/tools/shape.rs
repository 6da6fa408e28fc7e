// src/tools/shape.rs
//! 호출 가능한 도구의 네 가지 형태
//!
//! 도구 구현은 다음 중 하나 이상을 제공합니다 (우선순위 순):
//! 1. `AsyncInvoke`   - 입력 맵을 받는 네이티브 async 진입점
//! 2. `LegacyRun`     - 키워드 인자를 받아 텍스트를 돌려주는 레거시 async 진입점
//! 3. `DualInvoke`    - 때로는 즉시, 때로는 future를 돌려주는 진입점
//! 4. `BlockingInvoke`- 동기 진입점 (blocking 풀에서 실행)
//!
//! 형태는 등록 시점에 `ToolCapabilities::select`로 한 번만 고릅니다.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use crate::error::{SequenceError, ToolError};
use super::ToolDefinition;

/// 레거시 진입점의 키워드 인자
pub type KeywordArgs = Map<String, Value>;

/// 네이티브 async 진입점
#[async_trait]
pub trait AsyncInvoke: Send + Sync {
    async fn ainvoke(&self, input: Map<String, Value>) -> Result<Value, ToolError>;
}

/// 레거시 async 진입점: 펼쳐진 키워드 인자, 텍스트 결과
#[async_trait]
pub trait LegacyRun: Send + Sync {
    async fn arun(&self, kwargs: KeywordArgs) -> Result<String, ToolError>;
}

/// `DualInvoke::invoke`의 반환값
pub enum Invocation {
    Ready(Result<Value, ToolError>),
    Pending(BoxFuture<'static, Result<Value, ToolError>>),
}

/// 즉시 값 또는 future를 돌려줄 수 있는 진입점
pub trait DualInvoke: Send + Sync {
    fn invoke(&self, input: Map<String, Value>) -> Invocation;
}

/// 동기 진입점
pub trait BlockingInvoke: Send + Sync {
    fn invoke_blocking(&self, input: Map<String, Value>) -> Result<Value, ToolError>;
}

/// 등록 시점에 선택된 호출 형태
#[derive(Clone)]
pub enum ToolShape {
    NativeAsync(Arc<dyn AsyncInvoke>),
    LegacyAsync(Arc<dyn LegacyRun>),
    Coroutine(Arc<dyn DualInvoke>),
    Blocking(Arc<dyn BlockingInvoke>),
}

impl ToolShape {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NativeAsync(_) => "native_async",
            Self::LegacyAsync(_) => "legacy_async",
            Self::Coroutine(_) => "coroutine",
            Self::Blocking(_) => "blocking",
        }
    }
}

impl std::fmt::Debug for ToolShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// 도구가 노출하는 진입점 모음
#[derive(Default, Clone)]
pub struct ToolCapabilities {
    ainvoke: Option<Arc<dyn AsyncInvoke>>,
    arun: Option<Arc<dyn LegacyRun>>,
    dual: Option<Arc<dyn DualInvoke>>,
    blocking: Option<Arc<dyn BlockingInvoke>>,
}

impl ToolCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ainvoke(mut self, entry: Arc<dyn AsyncInvoke>) -> Self {
        self.ainvoke = Some(entry);
        self
    }

    pub fn with_arun(mut self, entry: Arc<dyn LegacyRun>) -> Self {
        self.arun = Some(entry);
        self
    }

    pub fn with_dual_invoke(mut self, entry: Arc<dyn DualInvoke>) -> Self {
        self.dual = Some(entry);
        self
    }

    pub fn with_blocking_invoke(mut self, entry: Arc<dyn BlockingInvoke>) -> Self {
        self.blocking = Some(entry);
        self
    }

    /// 우선순위: native async > legacy async > coroutine > blocking
    pub fn select(self) -> Option<ToolShape> {
        self.ainvoke
            .map(ToolShape::NativeAsync)
            .or(self.arun.map(ToolShape::LegacyAsync))
            .or(self.dual.map(ToolShape::Coroutine))
            .or(self.blocking.map(ToolShape::Blocking))
    }
}

/// 도구가 받아들이는 인자 키
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptedArguments {
    Any,
    Only(BTreeSet<String>),
}

impl AcceptedArguments {
    /// JSON Schema에서 추출
    ///
    /// `properties`가 있으면 그 키만, `additionalProperties: true`면 전부 받습니다.
    /// `type: object`인데 `properties`가 없으면 아무 키도 받지 않습니다.
    /// 스키마가 아예 선언되지 않은 경우(`{}` 또는 객체가 아님)는 전부 받습니다.
    pub fn from_schema(schema: &Value) -> Self {
        let Some(obj) = schema.as_object() else {
            return Self::Any;
        };
        if obj.get("additionalProperties") == Some(&Value::Bool(true)) {
            return Self::Any;
        }
        match obj.get("properties").and_then(Value::as_object) {
            Some(props) => Self::Only(props.keys().cloned().collect()),
            None if obj.contains_key("type") => Self::Only(BTreeSet::new()),
            None => Self::Any,
        }
    }

    pub fn accepts(&self, key: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(keys) => keys.contains(key),
        }
    }

    /// 받아들이는 키만 남긴 맵과 버려진 키 개수
    pub fn filter(&self, context: &Map<String, Value>) -> (Map<String, Value>, usize) {
        let mut kept = Map::new();
        let mut dropped = 0;
        for (key, value) in context {
            if self.accepts(key) {
                kept.insert(key.clone(), value.clone());
            } else {
                dropped += 1;
            }
        }
        (kept, dropped)
    }
}

/// 등록된 호출 가능 도구 (복제 비용이 쌉니다)
#[derive(Clone, Debug)]
pub struct CallableTool {
    definition: ToolDefinition,
    shape: ToolShape,
    accepted: AcceptedArguments,
}

impl CallableTool {
    pub fn new(definition: ToolDefinition, shape: ToolShape) -> Self {
        let accepted = AcceptedArguments::from_schema(&definition.parameters);
        Self { definition, shape, accepted }
    }

    /// 노출된 진입점 중 하나를 골라 도구 생성
    pub fn from_capabilities(definition: ToolDefinition, capabilities: ToolCapabilities) -> Result<Self, SequenceError> {
        match capabilities.select() {
            Some(shape) => Ok(Self::new(definition, shape)),
            None => Err(SequenceError::ToolInterface(definition.name)),
        }
    }

    pub fn native(definition: ToolDefinition, entry: impl AsyncInvoke + 'static) -> Self {
        Self::new(definition, ToolShape::NativeAsync(Arc::new(entry)))
    }

    pub fn legacy(definition: ToolDefinition, entry: impl LegacyRun + 'static) -> Self {
        Self::new(definition, ToolShape::LegacyAsync(Arc::new(entry)))
    }

    pub fn coroutine(definition: ToolDefinition, entry: impl DualInvoke + 'static) -> Self {
        Self::new(definition, ToolShape::Coroutine(Arc::new(entry)))
    }

    pub fn blocking(definition: ToolDefinition, entry: impl BlockingInvoke + 'static) -> Self {
        Self::new(definition, ToolShape::Blocking(Arc::new(entry)))
    }

    /// async 클로저로부터 네이티브 async 도구 생성
    pub fn from_async_fn<F, Fut>(definition: ToolDefinition, f: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self::native(definition, AsyncFn(f))
    }

    /// 동기 클로저로부터 blocking 도구 생성
    pub fn from_blocking_fn<F>(definition: ToolDefinition, f: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        Self::blocking(definition, BlockingFn(f))
    }

    /// 받는 인자 키를 명시적으로 지정
    pub fn with_accepted_arguments(mut self, accepted: AcceptedArguments) -> Self {
        self.accepted = accepted;
        self
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn description(&self) -> &str {
        &self.definition.description
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    pub fn shape(&self) -> &ToolShape {
        &self.shape
    }

    pub fn accepted(&self) -> &AcceptedArguments {
        &self.accepted
    }
}

struct AsyncFn<F>(F);

#[async_trait]
impl<F, Fut> AsyncInvoke for AsyncFn<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
{
    async fn ainvoke(&self, input: Map<String, Value>) -> Result<Value, ToolError> {
        (self.0)(input).await
    }
}

struct BlockingFn<F>(F);

impl<F> BlockingInvoke for BlockingFn<F>
where
    F: Fn(Map<String, Value>) -> Result<Value, ToolError> + Send + Sync,
{
    fn invoke_blocking(&self, input: Map<String, Value>) -> Result<Value, ToolError> {
        (self.0)(input)
    }
}
