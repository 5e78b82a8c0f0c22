use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::env;

use docqa_core::{
    DocQaError, Embedder, EmbeddingSection, HashEmbedder, HashEmbedderConfig,
    Result as CoreResult,
};

#[derive(Debug, Clone)]
pub enum EmbeddingBackend {
    Hash(HashEmbedder),
    OpenAi(OpenAiEmbeddingClient),
}

/// Process-wide embedding handle. Cloning shares configuration only; every
/// call is read-only, so one instance may serve concurrent builds and
/// queries.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    backend: EmbeddingBackend,
}

impl EmbeddingClient {
    pub fn from_config(section: &EmbeddingSection) -> Result<Self> {
        match section.provider.to_lowercase().as_str() {
            "openai" => Ok(Self {
                backend: EmbeddingBackend::OpenAi(OpenAiEmbeddingClient::new(
                    &section.model,
                    &section.base_url,
                )?),
            }),
            "hash" => Ok(Self {
                backend: EmbeddingBackend::Hash(HashEmbedder::new(HashEmbedderConfig {
                    dimensions: section.dimensions,
                    seed: 1337,
                })),
            }),
            other => Err(anyhow!("unknown embedding provider {other}")),
        }
    }

    pub fn hash() -> Self {
        Self {
            backend: EmbeddingBackend::Hash(HashEmbedder::default()),
        }
    }

    pub fn backend(&self) -> &EmbeddingBackend {
        &self.backend
    }

    pub fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = match &self.backend {
            EmbeddingBackend::Hash(embedder) => inputs
                .iter()
                .map(|text| embedder.embed_text(text))
                .collect(),
            EmbeddingBackend::OpenAi(client) => client.embed_batch(inputs)?,
        };
        if vectors.len() != inputs.len() {
            return Err(anyhow!(
                "embedding backend returned {} vectors for {} inputs",
                vectors.len(),
                inputs.len()
            ));
        }
        Ok(vectors)
    }
}

impl Embedder for EmbeddingClient {
    fn embed(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        self.embed_batch(texts)
            .map_err(|err| DocQaError::Embedding(format!("{err:#}")))
    }
}

/// OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingClient {
    model: String,
    base_url: String,
    api_key: String,
}

impl OpenAiEmbeddingClient {
    pub fn new(model: &str, base_url: &str) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY is required for openai embeddings"))?;
        Ok(Self {
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        // built per call so the blocking client never lives on an async thread
        let http = Client::builder()
            .build()
            .context("failed to build embeddings http client")?;
        let url = format!("{}/embeddings", self.base_url);
        let payload = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });
        let response = http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .with_context(|| format!("embeddings request to {url} failed"))?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "openai embeddings request failed: {}",
                response.status()
            ));
        }
        let mut parsed: OpenAiEmbeddingResponse = response.json()?;
        parsed.data.sort_by_key(|item| item.index);
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_backend_is_selected_by_default() {
        let client = EmbeddingClient::from_config(&EmbeddingSection {
            dimensions: 32,
            ..EmbeddingSection::default()
        })
        .unwrap();
        assert!(matches!(client.backend(), EmbeddingBackend::Hash(_)));
        let vectors = client
            .embed(&["a b".to_string(), "c".to_string()])
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 32));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let section = EmbeddingSection {
            provider: "word2vec".to_string(),
            ..EmbeddingSection::default()
        };
        assert!(EmbeddingClient::from_config(&section).is_err());
    }
}
