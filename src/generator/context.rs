use std::sync::Arc;

use anyhow::Result;

use crate::cache::ResearchCache;
use crate::config::{Config, LLMProvider};
use crate::generator::progress::ProgressSink;
use crate::generator::types::ResearchError;
use crate::llm::{EmbeddingClient, Embedder, LLMClient, LanguageModel};
use crate::retrievers::Retriever;
use crate::scraper::{Scraper, WebScraper};

/// 一次运行所需的全部协作者
///
/// 每个研究任务自己的状态（已访问URL、上下文）不在这里，由流水线为每次运行单独创建。
#[derive(Clone)]
pub struct ResearchContext {
    /// 语言模型，用于角色选择、想法拆解与报告撰写
    pub llm: Arc<dyn LanguageModel>,
    /// 向量模型，用于上下文压缩
    pub embedder: Arc<dyn Embedder>,
    pub retriever: Retriever,
    pub scraper: Arc<dyn Scraper>,
    pub cache: ResearchCache,
    pub progress: Arc<dyn ProgressSink>,
    pub config: Config,
}

impl ResearchContext {
    /// 按配置创建真实的模型、搜索与抓取客户端
    ///
    /// 缺少凭据时立即返回配置错误，不发起任何请求。
    pub fn new(config: Config, progress: Arc<dyn ProgressSink>) -> Result<Self> {
        check_credentials(&config)?;
        let llm = Arc::new(LLMClient::new(&config.llm)?);
        let embedder = Arc::new(EmbeddingClient::new(&config.embedding)?);
        let retriever = Retriever::from_config(&config.retriever);
        let scraper = Arc::new(WebScraper::new(&config.scraper)?);

        Ok(Self::from_parts(
            config, llm, embedder, retriever, scraper, progress,
        ))
    }

    /// 使用给定的协作者组装上下文，缓存仍按配置创建
    pub fn from_parts(
        config: Config,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
        retriever: Retriever,
        scraper: Arc<dyn Scraper>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let cache = ResearchCache::new(config.cache.clone());
        Self {
            llm,
            embedder,
            retriever,
            scraper,
            cache,
            progress,
            config,
        }
    }
}

/// 除本地Ollama外，语言模型与向量模型都需要API key
pub fn check_credentials(config: &Config) -> Result<(), ResearchError> {
    if config.llm.provider != LLMProvider::Ollama && config.llm.api_key.trim().is_empty() {
        return Err(ResearchError::Config(format!(
            "missing API key for LLM provider {} (set llm.api_key or RESEARCHER_LLM_API_KEY)",
            config.llm.provider
        )));
    }
    if config.embedding.api_key.trim().is_empty() {
        return Err(ResearchError::Config(
            "missing API key for the embedding model (set embedding.api_key or RESEARCHER_EMBEDDING_API_KEY)"
                .to_string(),
        ));
    }
    Ok(())
}
