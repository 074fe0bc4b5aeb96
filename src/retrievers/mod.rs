//! 搜索后端 - 可互换的检索实现与按顺序回退的检索器

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::RetrieverConfig;
use crate::generator::progress::{ProgressEvent, ProgressSink};

pub mod duckduckgo;
pub mod tavily;

pub use duckduckgo::DuckDuckGoSearch;
pub use tavily::TavilySearch;

/// 单条搜索结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(alias = "href")]
    pub url: String,
    #[serde(alias = "body", alias = "content")]
    pub snippet: String,
}

/// 搜索后端错误
#[derive(Debug, Error)]
pub enum SearchError {
    /// 凭据缺失等配置问题
    #[error("{backend} is not configured: {reason}")]
    Config { backend: &'static str, reason: String },

    #[error("{backend} request failed: {source}")]
    Http {
        backend: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{backend} returned HTTP {status}")]
    Status {
        backend: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("{backend} response could not be parsed: {reason}")]
    Parse { backend: &'static str, reason: String },
}

/// 搜索后端
///
/// 没有结果时返回空列表；认证、配置或网络层面的失败返回错误，交给检索器回退。
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// 内置的搜索后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetrieverKind {
    #[serde(rename = "tavily")]
    Tavily,
    #[serde(rename = "duckduckgo")]
    DuckDuckGo,
}

impl std::fmt::Display for RetrieverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrieverKind::Tavily => write!(f, "tavily"),
            RetrieverKind::DuckDuckGo => write!(f, "duckduckgo"),
        }
    }
}

impl std::str::FromStr for RetrieverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tavily" => Ok(RetrieverKind::Tavily),
            "duckduckgo" | "ddg" => Ok(RetrieverKind::DuckDuckGo),
            _ => Err(format!("Unknown retriever: {}", s)),
        }
    }
}

/// 根据类型构建搜索后端
pub fn build_backend(
    kind: RetrieverKind,
    config: &RetrieverConfig,
    http: reqwest::Client,
) -> Arc<dyn SearchBackend> {
    match kind {
        RetrieverKind::Tavily => Arc::new(TavilySearch::new(http, config.tavily_api_key.clone())),
        RetrieverKind::DuckDuckGo => Arc::new(DuckDuckGoSearch::new(http)),
    }
}

/// 构建搜索请求共用的HTTP客户端
pub fn build_http_client(config: &RetrieverConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// 按顺序尝试各搜索后端的检索器
#[derive(Clone)]
pub struct Retriever {
    backends: Vec<Arc<dyn SearchBackend>>,
}

impl Retriever {
    pub fn new(backends: Vec<Arc<dyn SearchBackend>>) -> Self {
        Self { backends }
    }

    /// 按配置中的顺序构建所有后端
    pub fn from_config(config: &RetrieverConfig) -> Self {
        let http = build_http_client(config);
        let backends = config
            .backends
            .iter()
            .map(|kind| build_backend(*kind, config, http.clone()))
            .collect();
        Self::new(backends)
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// 依次尝试各后端，返回第一个成功后端的结果
    ///
    /// 每次失败都会记录为降级事件；全部失败时返回空列表。
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
        progress: &dyn ProgressSink,
    ) -> Vec<SearchHit> {
        for (index, backend) in self.backends.iter().enumerate() {
            match backend.search(query, max_results).await {
                Ok(mut hits) => {
                    hits.truncate(max_results);
                    tracing::debug!(
                        backend = backend.name(),
                        query,
                        hits = hits.len(),
                        "search finished"
                    );
                    return hits;
                }
                Err(e) => {
                    tracing::warn!(backend = backend.name(), query, error = %e, "search backend failed");
                    let message = match self.backends.get(index + 1) {
                        Some(next) => format!(
                            "⚠️ {} search failed for '{}': {}. Falling back to {}...",
                            backend.name(),
                            query,
                            e,
                            next.name()
                        ),
                        None => format!(
                            "⚠️ {} search failed for '{}': {}. No search backend left, continuing without results.",
                            backend.name(),
                            query,
                            e
                        ),
                    };
                    progress.emit(ProgressEvent::logs(message)).await;
                }
            }
        }
        Vec::new()
    }
}
