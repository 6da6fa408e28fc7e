//! # Configuration Module
//!
//! Loads the `.env` file and the sequence engine's environment settings,
//! then lets command-line flags override them.

use anyhow::Result;
use std::path::PathBuf;

use rig_sequencer::RunnerConfig;

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Application configuration: the engine settings plus CLI-only knobs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings consumed by the sequence engine
    pub runner: RunnerConfig,

    /// Whether to serve the in-process `demo-*` tools
    pub demo_tools: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runner: RunnerConfig::default(),
            demo_tools: true,
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from `.env` and environment variables.
    ///
    /// A missing `.env` file is not an error; provider API keys may
    /// already be exported in the shell.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            runner: RunnerConfig::from_env(),
            ..Self::default()
        })
    }

    /// `--catalog` overrides `SEQUENCE_CATALOG`
    pub fn with_catalog(mut self, catalog: Option<PathBuf>) -> Self {
        if let Some(path) = catalog {
            self.runner = self.runner.with_catalog_path(path);
        }
        self
    }

    pub fn with_demo_tools(mut self, enabled: bool) -> Self {
        self.demo_tools = enabled;
        self
    }

    /// Fail fast on settings the providers would reject later.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.runner.temperature) {
            anyhow::bail!(
                "LLM_TEMPERATURE must be between 0.0 and 2.0, got: {}",
                self.runner.temperature
            );
        }

        if self.runner.max_tokens == 0 {
            anyhow::bail!("LLM_MAX_TOKENS must be at least 1");
        }

        if self.runner.max_iterations == 0 {
            anyhow::bail!("AGENT_MAX_ITERATIONS must be at least 1");
        }

        if let Some(path) = &self.runner.catalog_path {
            if !path.exists() {
                anyhow::bail!("Catalog file not found: {}", path.display());
            }
        }

        Ok(())
    }
}
