// src/runtime/models.rs
//! 모델 식별자 해석
//!
//! `openai:gpt-4.1`, `anthropic:claude-sonnet-4-5`, `ollama:llama3.2` 형식.
//! 접두사가 없으면 OpenAI 모델로 봅니다.

use rig::client::{CompletionClient, ProviderClient};
use rig::providers::{anthropic, ollama, openai};
use std::sync::Arc;

use crate::compat::RigAgentAdapter;
use crate::error::SequenceError;
use crate::llm::{LLMConfig, LLMProvider};

/// Anthropic은 max_tokens가 필수
const ANTHROPIC_DEFAULT_MAX_TOKENS: u64 = 4096;

/// 지원하는 모델 제공자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    OpenAI,
    Anthropic,
    Ollama,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
        }
    }

    /// rig-core 클라이언트가 `from_env`에서 읽는 환경변수
    fn required_env(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Ollama => None,
        }
    }
}

/// `provider:model` 분리
pub fn parse_model_id(model_id: &str) -> Result<(ModelProvider, &str), SequenceError> {
    let (provider, model) = match model_id.split_once(':') {
        Some((provider, model)) => (provider.trim(), model.trim()),
        None => ("openai", model_id.trim()),
    };

    if model.is_empty() {
        return Err(SequenceError::InvalidConfiguration(format!(
            "model identifier '{model_id}' has no model name"
        )));
    }

    let provider = match provider.to_ascii_lowercase().as_str() {
        "openai" => ModelProvider::OpenAI,
        "anthropic" => ModelProvider::Anthropic,
        "ollama" => ModelProvider::Ollama,
        other => {
            return Err(SequenceError::InvalidConfiguration(format!(
                "unsupported model provider '{other}' in '{model_id}'"
            )))
        }
    };

    Ok((provider, model))
}

/// 모델 id → LLMProvider
pub trait ModelResolver: Send + Sync {
    fn resolve(&self, model_id: &str, config: &LLMConfig) -> Result<Arc<dyn LLMProvider>, SequenceError>;
}

/// rig-core 클라이언트 기반 기본 해석기
///
/// API 키는 rig-core가 환경변수에서 읽습니다. 키가 없으면 rig의 `from_env`가
/// panic하므로 먼저 확인합니다.
#[derive(Debug, Clone, Default)]
pub struct RigModelResolver;

impl RigModelResolver {
    pub fn new() -> Self {
        Self
    }

    fn ensure_env(provider: ModelProvider) -> Result<(), SequenceError> {
        match provider.required_env() {
            Some(var) if std::env::var(var).map(|v| v.is_empty()).unwrap_or(true) => {
                Err(SequenceError::Llm(format!(
                    "{var} is not set (required for {} models)",
                    provider.as_str()
                )))
            }
            _ => Ok(()),
        }
    }
}

impl ModelResolver for RigModelResolver {
    fn resolve(&self, model_id: &str, config: &LLMConfig) -> Result<Arc<dyn LLMProvider>, SequenceError> {
        let (provider, model) = parse_model_id(model_id)?;
        Self::ensure_env(provider)?;

        tracing::debug!(provider = provider.as_str(), model = %model, "Resolving model");

        let llm: Arc<dyn LLMProvider> = match provider {
            ModelProvider::OpenAI => {
                let mut builder = openai::Client::from_env().agent(model);
                if let Some(temp) = config.temperature {
                    builder = builder.temperature(temp);
                }
                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }
                Arc::new(RigAgentAdapter::with_names(builder.build(), "openai", model))
            }
            ModelProvider::Anthropic => {
                let mut builder = anthropic::Client::from_env().agent(model);
                if let Some(temp) = config.temperature {
                    builder = builder.temperature(temp);
                }
                builder = builder.max_tokens(config.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS));
                Arc::new(RigAgentAdapter::with_names(builder.build(), "anthropic", model))
            }
            ModelProvider::Ollama => {
                // OLLAMA_API_BASE_URL, 없으면 http://localhost:11434
                let mut builder = ollama::Client::from_env().agent(model);
                if let Some(temp) = config.temperature {
                    builder = builder.temperature(temp);
                }
                Arc::new(RigAgentAdapter::with_names(builder.build(), "ollama", model))
            }
        };

        Ok(llm)
    }
}
