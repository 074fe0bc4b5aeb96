use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rig::client::EmbeddingsClient;
use rig::embeddings::EmbeddingModel;

use crate::config::EmbeddingConfig;
use crate::llm::Embedder;

/// 基于OpenAI兼容接口的向量模型客户端
#[derive(Clone)]
pub struct EmbeddingClient {
    client: rig::providers::openai::Client,
    model: String,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(anyhow!("embedding model name is empty"));
        }
        let client = rig::providers::openai::Client::builder(&config.api_key)
            .base_url(&config.api_base_url)
            .build();
        Ok(Self {
            client,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        let embeddings = self
            .client
            .embedding_model(&self.model)
            .embed_texts(texts)
            .await?;

        if embeddings.len() != expected {
            return Err(anyhow!(
                "embedding service returned {} vectors for {} texts",
                embeddings.len(),
                expected
            ));
        }
        Ok(embeddings.into_iter().map(|e| e.vec).collect())
    }
}
