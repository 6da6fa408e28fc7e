//! Runner Configuration Module
//!
//! 환경변수 기반 실행 설정.
//!
//! # Environment Variables
//!
//! | Variable | Purpose | Default |
//! |----------|---------|---------|
//! | `SEQUENCE_CATALOG` | 카탈로그 파일 경로 (.yaml/.yml/.json) | 내장 데모 카탈로그 |
//! | `LLM_TEMPERATURE` | 에이전트 호출 temperature | `0.0` |
//! | `LLM_MAX_TOKENS` | 응답 최대 토큰 | `4096` |
//! | `AGENT_MAX_ITERATIONS` | 에이전트당 도구 호출 루프 상한 | `10` |
//!
//! 제공자 API 키(`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`)는 rig-core가 직접 읽습니다.
//!
//! # Example
//!
//! ```ignore
//! use rig_sequencer::config::RunnerConfig;
//!
//! let config = RunnerConfig::from_env().with_max_iterations(5);
//! let loader = config.config_loader().await?;
//! let runtime = config.agent_runtime();
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::SequenceError;
use crate::llm::LLMConfig;
use crate::loader::{ConfigLoader, FileConfigLoader, InMemoryConfigLoader};
use crate::runtime::ReactAgentRuntime;

/// 실행 설정
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// 카탈로그 파일 (None이면 데모 카탈로그)
    pub catalog_path: Option<PathBuf>,

    /// Temperature for LLM calls
    pub temperature: f64,

    /// Maximum tokens for LLM responses
    pub max_tokens: u64,

    /// 에이전트 하나의 LLM 호출 상한
    pub max_iterations: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_iterations: 10,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 환경변수에서 로드. 파싱할 수 없는 값은 무시하고 기본값 유지.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("SEQUENCE_CATALOG").filter(|p| !p.trim().is_empty()) {
            config.catalog_path = Some(PathBuf::from(path));
        }

        if let Some(temp) = lookup("LLM_TEMPERATURE") {
            if let Ok(t) = temp.parse() {
                config.temperature = t;
            }
        }

        if let Some(tokens) = lookup("LLM_MAX_TOKENS") {
            if let Ok(t) = tokens.parse() {
                config.max_tokens = t;
            }
        }

        if let Some(iterations) = lookup("AGENT_MAX_ITERATIONS") {
            if let Ok(i) = iterations.parse() {
                config.max_iterations = i;
            }
        }

        config
    }

    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// 모든 에이전트에 공통으로 적용되는 샘플링 설정 (모델은 에이전트별로 덮어씀)
    pub fn llm_config(&self) -> LLMConfig {
        LLMConfig::default()
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
    }

    /// rig-core 모델을 쓰는 기본 에이전트 런타임
    pub fn agent_runtime(&self) -> ReactAgentRuntime {
        ReactAgentRuntime::with_rig_models()
            .with_config(self.llm_config())
            .with_max_iterations(self.max_iterations)
    }

    /// 카탈로그 경로가 있으면 파일 로더, 없으면 데모 로더
    pub async fn config_loader(&self) -> Result<Arc<dyn ConfigLoader>, SequenceError> {
        match &self.catalog_path {
            Some(path) => Ok(Arc::new(FileConfigLoader::from_path(path).await?)),
            None => Ok(Arc::new(InMemoryConfigLoader::demo()?)),
        }
    }
}
