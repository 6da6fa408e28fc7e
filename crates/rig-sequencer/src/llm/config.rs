//! LLM configuration types
//!
//! Sampling settings handed to a provider, and token accounting for an
//! agent run.

use serde::{Deserialize, Serialize};

/// Token usage statistics from an LLM completion.
///
/// ```
/// use rig_sequencer::llm::TokenUsage;
///
/// let mut total = TokenUsage::default();
/// total += TokenUsage::new(100, 50);
/// total += TokenUsage::new(20, 5);
/// assert_eq!(total.total_tokens, 175);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
        }
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// Sampling configuration for agent model calls
///
/// Sequence agents run deterministic by default (`temperature = 0.0`).
///
/// ```
/// use rig_sequencer::llm::LLMConfig;
///
/// let config = LLMConfig::new("gpt-4.1").with_max_tokens(2048);
/// assert_eq!(config.temperature, Some(0.0));
/// assert_eq!(config.max_tokens, Some(2048));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Model name without provider prefix (e.g. "gpt-4.1")
    pub model: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: Some(0.0),
            max_tokens: None,
        }
    }
}

impl LLMConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, tokens: u64) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Same sampling settings, different model
    pub fn for_model(&self, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..self.clone()
        }
    }
}
