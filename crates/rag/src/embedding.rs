use std::env;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use asklegal_core::{HashEmbedder, HashEmbedderConfig};
use asklegal_index::{Corpus, VectorIndex};

use crate::signals::EmbeddingProvider;

const EMBED_BATCH: usize = 64;

#[derive(Clone)]
pub enum EmbeddingBackend {
    Hash(HashEmbedder),
    OpenAi(OpenAiEmbeddingClient),
}

#[derive(Clone)]
pub struct EmbeddingClient {
    backend: EmbeddingBackend,
}

impl EmbeddingClient {
    pub fn from_env() -> Result<Self> {
        match env::var("EMBEDDING_PROVIDER")
            .unwrap_or_else(|_| "hash".to_string())
            .to_lowercase()
            .as_str()
        {
            "openai" => {
                let model = env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-small".to_string());
                Ok(Self {
                    backend: EmbeddingBackend::OpenAi(OpenAiEmbeddingClient::new(&model)?),
                })
            }
            _ => {
                let dims = env::var("HASH_EMBED_DIMENSIONS")
                    .ok()
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(256);
                Ok(Self {
                    backend: EmbeddingBackend::Hash(HashEmbedder::new(HashEmbedderConfig {
                        dimensions: dims,
                        seed: 1337,
                    })),
                })
            }
        }
    }

    pub fn hash() -> Self {
        Self {
            backend: EmbeddingBackend::Hash(HashEmbedder::default()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            EmbeddingBackend::Hash(_) => "hash",
            EmbeddingBackend::OpenAi(_) => "openai",
        }
    }

    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        match &self.backend {
            EmbeddingBackend::Hash(embedder) => Ok(inputs
                .iter()
                .map(|text| embedder.embed_text(text))
                .collect()),
            EmbeddingBackend::OpenAi(client) => client.embed_batch(inputs).await,
        }
    }

    /// Embeds every corpus passage in batches and loads them into a
    /// [`VectorIndex`].
    pub async fn build_index(&self, corpus: &Corpus) -> Result<VectorIndex> {
        let mut index = VectorIndex::default();
        for chunk in corpus.passages().chunks(EMBED_BATCH) {
            let texts: Vec<String> = chunk.iter().map(|p| p.text.clone()).collect();
            let vectors = self.embed_batch(&texts).await?;
            if vectors.len() != chunk.len() {
                return Err(anyhow!(
                    "embedding backend returned {} vectors for {} passages",
                    vectors.len(),
                    chunk.len()
                ));
            }
            for (record, vector) in chunk.iter().zip(vectors) {
                index.insert(record.passage_id.clone(), vector)?;
            }
        }
        Ok(index)
    }
}

#[async_trait]
impl EmbeddingProvider for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inputs = vec![text.to_string()];
        let mut output = self.embed_batch(&inputs).await?;
        output
            .pop()
            .ok_or_else(|| anyhow!("embedding backend returned no vector"))
    }

    fn is_remote(&self) -> bool {
        matches!(self.backend, EmbeddingBackend::OpenAi(_))
    }
}

#[derive(Clone)]
pub struct OpenAiEmbeddingClient {
    http: Client,
    model: String,
    api_key: String,
}

impl OpenAiEmbeddingClient {
    pub fn new(model: &str) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY is required for openai embeddings"))?;
        Ok(Self {
            http: Client::new(),
            model: model.to_string(),
            api_key,
        })
    }

    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let url = "https://api.openai.com/v1/embeddings";
        let payload = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("openai embeddings request")?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "openai embeddings request failed: {}",
                response.status()
            ));
        }
        let parsed: OpenAiEmbeddingResponse = response.json().await?;
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
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
