//! 上下文压缩 - 按与主题的向量相似度挑选最相关的文本块

use std::sync::Arc;

use crate::config::CompressionConfig;
use crate::generator::types::{ContextChunk, ResearchError};
use crate::llm::Embedder;
use crate::scraper::ScrapedDocument;
use crate::utils::text_splitter::TextSplitter;
use crate::utils::token_estimator::TokenEstimator;

/// 待打分的候选块
struct Candidate {
    text: String,
    source_url: String,
}

pub struct ContextCompressor {
    embedder: Arc<dyn Embedder>,
    splitter: TextSplitter,
    batch_size: usize,
    token_budget: Option<usize>,
    estimator: TokenEstimator,
}

impl ContextCompressor {
    pub fn new(embedder: Arc<dyn Embedder>, config: &CompressionConfig, batch_size: usize) -> Self {
        Self {
            embedder,
            splitter: TextSplitter::new(config.chunk_size, config.chunk_overlap),
            batch_size: batch_size.max(1),
            token_budget: config.token_budget,
            estimator: TokenEstimator::new(),
        }
    }

    /// 返回最多 `max_results` 个与主题最相关的文本块，按相关度降序排列
    ///
    /// 失败的抓取记录不参与压缩。主题向量化失败或所有批次都失败时返回错误。
    pub async fn compress(
        &self,
        topic: &str,
        documents: &[ScrapedDocument],
        max_results: usize,
    ) -> Result<Vec<ContextChunk>, ResearchError> {
        let candidates: Vec<Candidate> = documents
            .iter()
            .filter_map(|doc| doc.text().map(|text| (doc.url.as_str(), text)))
            .flat_map(|(url, text)| {
                self.splitter
                    .split(text)
                    .into_iter()
                    .map(move |chunk| Candidate {
                        text: chunk,
                        source_url: url.to_string(),
                    })
            })
            .collect();

        if candidates.is_empty() || max_results == 0 {
            return Ok(Vec::new());
        }

        let topic_vector = self
            .embedder
            .embed(vec![topic.to_string()])
            .await
            .map_err(|e| ResearchError::Compression(format!("topic embedding failed: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| ResearchError::Compression("topic embedding is missing".to_string()))?;

        let mut scored: Vec<(usize, f64)> = Vec::with_capacity(candidates.len());
        let mut failed_batches = 0usize;
        let batches: Vec<&[Candidate]> = candidates.chunks(self.batch_size).collect();

        for (batch_index, batch) in batches.iter().enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            match self.embedder.embed(texts).await {
                Ok(vectors) if vectors.len() == batch.len() => {
                    let offset = batch_index * self.batch_size;
                    for (i, vector) in vectors.iter().enumerate() {
                        scored.push((offset + i, cosine_similarity(&topic_vector, vector)));
                    }
                }
                Ok(vectors) => {
                    failed_batches += 1;
                    tracing::warn!(
                        batch = batch_index,
                        expected = batch.len(),
                        got = vectors.len(),
                        "embedding batch size mismatch, skipping"
                    );
                }
                Err(e) => {
                    failed_batches += 1;
                    tracing::warn!(batch = batch_index, error = %e, "embedding batch failed, skipping");
                }
            }
        }

        if failed_batches == batches.len() {
            return Err(ResearchError::Compression(format!(
                "all {} embedding batches failed",
                batches.len()
            )));
        }

        // 稳定排序，分数相同时保留原始检索顺序
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut selected = Vec::new();
        let mut used_tokens = 0usize;
        for (index, score) in scored.into_iter().take(max_results) {
            let candidate = &candidates[index];
            if let Some(budget) = self.token_budget {
                let tokens = self.estimator.estimate_tokens(&candidate.text);
                if used_tokens + tokens > budget {
                    break;
                }
                used_tokens += tokens;
            }
            selected.push(ContextChunk {
                text: candidate.text.clone(),
                source_url: candidate.source_url.clone(),
                relevance_score: score,
            });
        }

        Ok(selected)
    }
}

/// 把压缩结果格式化为一个上下文块
pub fn format_chunks(chunks: &[ContextChunk]) -> String {
    chunks
        .iter()
        .map(|c| format!("Source: {}\nContent: {}", c.source_url, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
