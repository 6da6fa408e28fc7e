// src/loader.rs
//! 설정 로더
//!
//! 시퀀스, 에이전트 정의, 클라이언트 설정을 읽어 옵니다. 카탈로그 문서는
//! 세 개의 맵(`sequences`, `agents`, `clients`)으로 구성됩니다:
//!
//! ```yaml
//! sequences:
//!   test-seq: { id: test-seq, steps: [...] }
//! agents:
//!   reply_agent: { id: reply_agent, model: "openai:gpt-4.1", ... }
//! clients:
//!   client-123: { preferred_tone: angelic }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::agent::AgentDefinition;
use crate::error::SequenceError;
use crate::sequence::Sequence;

const DEMO_CATALOG: &str = include_str!("../catalog/demo.yaml");

/// 설정 저장소 경계
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    async fn load_sequence(&self, sequence_id: &str) -> Result<Sequence, SequenceError>;

    /// 알 수 없는 클라이언트는 빈 맵
    async fn load_client_config(&self, client_id: &str) -> Result<Map<String, Value>, SequenceError>;

    async fn load_all_agents(&self) -> Result<HashMap<String, AgentDefinition>, SequenceError>;
}

/// 카탈로그 문서
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub sequences: HashMap<String, Sequence>,
    #[serde(default)]
    pub agents: HashMap<String, AgentDefinition>,
    #[serde(default)]
    pub clients: HashMap<String, Map<String, Value>>,
}

impl Catalog {
    /// 맵 키와 선언 id가 일치하는지 확인
    pub fn validate(&self) -> Result<(), SequenceError> {
        for (key, sequence) in &self.sequences {
            if key != &sequence.id {
                return Err(SequenceError::InvalidConfiguration(format!(
                    "sequence entry '{key}' declares id '{}'",
                    sequence.id
                )));
            }
        }
        for (key, agent) in &self.agents {
            if key != &agent.id {
                return Err(SequenceError::InvalidConfiguration(format!(
                    "agent entry '{key}' declares id '{}'",
                    agent.id
                )));
            }
        }
        Ok(())
    }
}

/// 카탈로그 파일 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    Yaml,
    Json,
}

impl CatalogFormat {
    /// 확장자로 형식 판별
    pub fn from_path(path: &Path) -> Result<Self, SequenceError> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            _ => Err(SequenceError::InvalidConfiguration(format!(
                "unsupported catalogue file {}: expected .yaml, .yml or .json",
                path.display()
            ))),
        }
    }
}

/// 카탈로그 문서 파싱 + 검증
pub fn parse_catalog(content: &str, format: CatalogFormat) -> Result<Catalog, SequenceError> {
    let catalog: Catalog = match format {
        CatalogFormat::Yaml => serde_yaml::from_str(content)
            .map_err(|e| SequenceError::InvalidConfiguration(format!("invalid catalogue YAML: {e}")))?,
        CatalogFormat::Json => serde_json::from_str(content)
            .map_err(|e| SequenceError::InvalidConfiguration(format!("invalid catalogue JSON: {e}")))?,
    };
    catalog.validate()?;
    Ok(catalog)
}

/// 메모리 카탈로그 로더
#[derive(Debug, Clone, Default)]
pub struct InMemoryConfigLoader {
    catalog: Catalog,
}

impl InMemoryConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// 데모 카탈로그 (`test-seq`, `agent-as-tool-seq`, `client-123`)
    pub fn demo() -> Result<Self, SequenceError> {
        parse_catalog(DEMO_CATALOG, CatalogFormat::Yaml).map(Self::from_catalog)
    }

    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.catalog.sequences.insert(sequence.id.clone(), sequence);
        self
    }

    pub fn with_agent(mut self, agent: AgentDefinition) -> Self {
        self.catalog.agents.insert(agent.id.clone(), agent);
        self
    }

    pub fn with_client(mut self, client_id: impl Into<String>, config: Value) -> Self {
        let config = match config {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.catalog.clients.insert(client_id.into(), config);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

#[async_trait]
impl ConfigLoader for InMemoryConfigLoader {
    async fn load_sequence(&self, sequence_id: &str) -> Result<Sequence, SequenceError> {
        self.catalog
            .sequences
            .get(sequence_id)
            .cloned()
            .ok_or_else(|| SequenceError::SequenceNotFound(sequence_id.to_string()))
    }

    async fn load_client_config(&self, client_id: &str) -> Result<Map<String, Value>, SequenceError> {
        Ok(self.catalog.clients.get(client_id).cloned().unwrap_or_default())
    }

    async fn load_all_agents(&self) -> Result<HashMap<String, AgentDefinition>, SequenceError> {
        Ok(self.catalog.agents.clone())
    }
}

/// 파일 카탈로그 로더 (생성 시 한 번 읽습니다)
#[derive(Debug, Clone)]
pub struct FileConfigLoader {
    path: PathBuf,
    inner: InMemoryConfigLoader,
}

impl FileConfigLoader {
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, SequenceError> {
        let path = path.as_ref().to_path_buf();
        let format = CatalogFormat::from_path(&path)?;
        let content = tokio::fs::read_to_string(&path).await?;
        let catalog = parse_catalog(&content, format)?;

        tracing::debug!(
            path = %path.display(),
            sequences = catalog.sequences.len(),
            agents = catalog.agents.len(),
            clients = catalog.clients.len(),
            "Loaded sequence catalogue"
        );

        Ok(Self {
            path,
            inner: InMemoryConfigLoader::from_catalog(catalog),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn catalog(&self) -> &Catalog {
        self.inner.catalog()
    }
}

#[async_trait]
impl ConfigLoader for FileConfigLoader {
    async fn load_sequence(&self, sequence_id: &str) -> Result<Sequence, SequenceError> {
        self.inner.load_sequence(sequence_id).await
    }

    async fn load_client_config(&self, client_id: &str) -> Result<Map<String, Value>, SequenceError> {
        self.inner.load_client_config(client_id).await
    }

    async fn load_all_agents(&self) -> Result<HashMap<String, AgentDefinition>, SequenceError> {
        self.inner.load_all_agents().await
    }
}
