use crate::config::{Config, LLMProvider};
use crate::generator::types::{ReportType, ResearchRequest};
use crate::i18n::TargetLanguage;
use crate::retrievers::RetrieverKind;
use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;

/// Idea Researcher - 把一个想法变成带引用的调研报告
#[derive(Parser, Debug)]
#[command(name = "idea-researcher")]
#[command(
    about = "Researches an idea on the web and writes a structured report: it decomposes the idea into search queries, scrapes and ranks sources by relevance, then synthesizes a cited report."
)]
#[command(version)]
pub struct Args {
    /// 要研究的想法或问题
    pub idea: String,

    /// 报告类型 (research, resource, outline, custom, idea-research)
    #[arg(short = 't', long)]
    pub report_type: Option<ReportType>,

    /// 只基于这些URL研究，可重复指定
    #[arg(short = 'u', long = "source-url")]
    pub source_urls: Vec<String>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 输出路径
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// 搜索后端，按指定顺序回退，可重复指定 (tavily, duckduckgo)
    #[arg(long = "retriever")]
    pub retrievers: Vec<RetrieverKind>,

    /// 每个子查询的最大搜索结果数
    #[arg(long)]
    pub max_search_results: Option<usize>,

    /// 并发抓取的最大URL数
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// 报告的最少字数
    #[arg(long)]
    pub total_words: Option<usize>,

    /// 目标语言 (en, zh, ja, ko, de, fr, es)
    #[arg(long)]
    pub target_language: Option<TargetLanguage>,

    /// LLM Provider (openai, moonshot, deepseek, mistral, openrouter, anthropic, gemini, ollama)
    #[arg(long)]
    pub llm_provider: Option<LLMProvider>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// 高能效模型，用于角色选择与想法拆解
    #[arg(long)]
    pub model_efficient: Option<String>,

    /// 高质量模型，用于报告撰写，以及作为efficient失效情况下的兜底
    #[arg(long)]
    pub model_powerful: Option<String>,

    /// 最大tokens数
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// 温度参数
    #[arg(long)]
    pub temperature: Option<f64>,

    /// 是否禁用缓存
    #[arg(long)]
    pub no_cache: bool,

    /// 以JSON行输出进度事件，并以流式方式撰写报告
    #[arg(long)]
    pub json_events: bool,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// 将CLI参数转换为配置与研究请求
    pub fn into_config(self) -> Result<(Config, ResearchRequest)> {
        let idea = self.idea.trim().to_string();
        if idea.is_empty() {
            bail!("the idea to research must not be empty");
        }

        let mut config = Config::load(self.config.as_deref())?;

        if let Some(output_path) = self.output_path {
            config.output_path = output_path;
        }
        if let Some(report_type) = self.report_type {
            config.report.report_type = report_type;
        }
        if let Some(total_words) = self.total_words {
            config.report.total_words = total_words;
        }

        // 覆盖检索配置
        if !self.retrievers.is_empty() {
            let mut backends: Vec<RetrieverKind> = Vec::new();
            for kind in self.retrievers {
                if !backends.contains(&kind) {
                    backends.push(kind);
                }
            }
            config.retriever.backends = backends;
        }
        if let Some(max_search_results) = self.max_search_results {
            config.retriever.max_results_per_query = max_search_results;
        }
        if let Some(max_concurrency) = self.max_concurrency {
            config.scraper.max_concurrency = max_concurrency;
        }

        // 覆盖LLM配置
        if let Some(provider) = self.llm_provider {
            config.llm.provider = provider;
        }
        if let Some(llm_api_base_url) = self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url;
        }
        if let Some(llm_api_key) = self.llm_api_key {
            config.llm.api_key = llm_api_key;
        }
        if let Some(model_efficient) = self.model_efficient {
            config.llm.model_efficient = model_efficient;
        }
        if let Some(model_powerful) = self.model_powerful {
            config.llm.model_powerful = model_powerful;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }

        // 目标语言配置
        if let Some(target_language) = self.target_language {
            config.report.target_language = target_language;
        }

        // 缓存配置
        if self.no_cache {
            config.cache.enabled = false;
        }
        config.verbose = config.verbose || self.verbose;

        let request = ResearchRequest::new(idea, config.report.report_type)
            .with_source_urls(self.source_urls);
        Ok((config, request))
    }
}
