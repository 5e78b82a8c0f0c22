use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::chunk::DEFAULT_MAX_CHUNK_LENGTH;
use crate::cleanup::CleanupConfig;
use crate::error::{DocQaError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "docqa.toml";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DocQaConfig {
    pub media_root: PathBuf,
    /// Defaults to `<media_root>/faiss_indexes`.
    pub index_root: Option<PathBuf>,
    /// Defaults to `<media_root>/pdfs`.
    pub documents_root: Option<PathBuf>,
    pub top_k: usize,
    pub chunking: ChunkingSection,
    pub embedding: EmbeddingSection,
    pub inference: InferenceSection,
    pub cleanup: CleanupConfig,
    pub service: ServiceSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingSection {
    pub max_length: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingSection {
    /// `hash` or `openai`.
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InferenceSection {
    pub command: String,
    pub args: Vec<String>,
    /// Zero disables the timeout.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceSection {
    pub bind_addr: String,
}

impl Default for DocQaConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            index_root: None,
            documents_root: None,
            top_k: DEFAULT_TOP_K,
            chunking: ChunkingSection::default(),
            embedding: EmbeddingSection::default(),
            inference: InferenceSection::default(),
            cleanup: CleanupConfig::default(),
            service: ServiceSection::default(),
        }
    }
}

impl Default for ChunkingSection {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_CHUNK_LENGTH,
        }
    }
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: "hash".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 64,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl Default for InferenceSection {
    fn default() -> Self {
        Self {
            command: "ollama".to_string(),
            args: vec!["run".to_string(), "llama3.2:1b".to_string()],
            timeout_secs: DEFAULT_INFERENCE_TIMEOUT_SECS,
        }
    }
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

impl DocQaConfig {
    /// Defaults, then `$DOCQA_CONFIG` (or `docqa.toml`) when it exists, then
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let path = env::var("DOCQA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file_if_exists(Path::new(&path))?;
        config.apply_env_with(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file_if_exists(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DOCQA_MEDIA_ROOT") {
            self.media_root = PathBuf::from(value);
        }
        if let Some(value) = lookup("DOCQA_INDEX_ROOT") {
            self.index_root = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("DOCQA_DOCUMENTS_ROOT") {
            self.documents_root = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("DOCQA_TOP_K") {
            self.top_k = parse_number("DOCQA_TOP_K", &value)?;
        }
        if let Some(value) = lookup("DOCQA_CHUNK_MAX_LENGTH") {
            self.chunking.max_length = parse_number("DOCQA_CHUNK_MAX_LENGTH", &value)?;
        }
        if let Some(value) = lookup("DOCQA_INFERENCE_COMMAND") {
            self.inference.command = value;
        }
        if let Some(value) = lookup("DOCQA_INFERENCE_MODEL") {
            self.inference.args = vec!["run".to_string(), value];
        }
        if let Some(value) = lookup("DOCQA_INFERENCE_TIMEOUT_SECS") {
            self.inference.timeout_secs = parse_number("DOCQA_INFERENCE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("EMBEDDING_PROVIDER") {
            self.embedding.provider = value.to_lowercase();
        }
        if let Some(value) = lookup("EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = lookup("HASH_EMBED_DIMENSIONS") {
            self.embedding.dimensions = parse_number("HASH_EMBED_DIMENSIONS", &value)?;
        }
        if let Some(value) = lookup("EMBEDDING_BASE_URL") {
            self.embedding.base_url = value;
        }
        if let Some(value) = lookup("BIND_ADDR") {
            self.service.bind_addr = value;
        }
        Ok(())
    }

    pub fn index_root(&self) -> PathBuf {
        self.index_root
            .clone()
            .unwrap_or_else(|| self.media_root.join("faiss_indexes"))
    }

    pub fn documents_root(&self) -> PathBuf {
        self.documents_root
            .clone()
            .unwrap_or_else(|| self.media_root.join("pdfs"))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| DocQaError::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}
