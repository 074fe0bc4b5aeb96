use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::generator::types::ReportType;
use crate::i18n::TargetLanguage;
use crate::retrievers::RetrieverKind;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "researcher.toml";

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "moonshot")]
    Moonshot,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LLMProvider::OpenAI => "openai",
            LLMProvider::Moonshot => "moonshot",
            LLMProvider::DeepSeek => "deepseek",
            LLMProvider::Mistral => "mistral",
            LLMProvider::OpenRouter => "openrouter",
            LLMProvider::Anthropic => "anthropic",
            LLMProvider::Gemini => "gemini",
            LLMProvider::Ollama => "ollama",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "moonshot" => Ok(LLMProvider::Moonshot),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "mistral" => Ok(LLMProvider::Mistral),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "gemini" => Ok(LLMProvider::Gemini),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 报告输出目录
    pub output_path: PathBuf,

    /// 报告生成配置
    pub report: ReportConfig,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 向量模型配置
    pub embedding: EmbeddingConfig,

    /// 搜索后端配置
    pub retriever: RetrieverConfig,

    /// 网页抓取配置
    pub scraper: ScraperConfig,

    /// 上下文压缩配置
    pub compression: CompressionConfig,

    /// 缓存配置
    pub cache: CacheConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// 报告生成配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ReportConfig {
    /// 报告类型
    pub report_type: ReportType,

    /// 引用格式，例如 apa、mla
    pub report_format: String,

    /// 报告的最少字数
    pub total_words: usize,

    /// 拆解出的子查询数量（不含原始想法本身）
    pub max_sub_queries: usize,

    /// custom报告使用的自定义角色提示词
    pub agent_role: Option<String>,

    /// 报告输出语言
    pub target_language: TargetLanguage,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 高能效模型，用于角色选择、想法拆解等短提示词任务
    pub model_efficient: String,

    /// 高质量模型，用于报告撰写，以及作为efficient失效情况下的兜底
    pub model_powerful: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 重试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 单次调用超时时间（秒）
    pub timeout_seconds: u64,
}

/// 向量模型配置，使用OpenAI兼容的embeddings接口
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub model: String,
    /// 单次请求最多携带的文本块数
    pub batch_size: usize,
}

/// 搜索后端配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RetrieverConfig {
    /// 按优先级排列的搜索后端，前一个失败时依次回退到下一个
    pub backends: Vec<RetrieverKind>,

    /// 每个查询的最大搜索结果数
    pub max_results_per_query: usize,

    /// Tavily API KEY
    pub tavily_api_key: Option<String>,

    /// 搜索请求超时时间（秒）
    pub timeout_seconds: u64,
}

/// 网页抓取配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ScraperConfig {
    /// 同时抓取的最大URL数
    pub max_concurrency: usize,

    /// 单个URL抓取超时时间（秒）
    pub timeout_seconds: u64,

    pub user_agent: String,

    /// 单个页面保留的最大字符数
    pub max_content_chars: usize,
}

/// 上下文压缩配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CompressionConfig {
    /// 文本块大小（字符）
    pub chunk_size: usize,

    /// 相邻文本块的重叠字符数
    pub chunk_overlap: usize,

    /// 每个主题保留的最相关文本块数量
    pub max_results: usize,

    /// 每个主题保留内容的token上限，None表示只按数量截断
    pub token_budget: Option<usize>,
}

/// 缓存配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// 是否启用缓存
    pub enabled: bool,

    /// 缓存目录
    pub cache_dir: PathBuf,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 按CLI显式路径、当前目录默认文件、内置默认值的顺序加载配置
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        let default_path = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::from_file(&default_path)
        } else {
            Ok(Self::default())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("./outputs"),
            report: ReportConfig::default(),
            llm: LLMConfig::default(),
            embedding: EmbeddingConfig::default(),
            retriever: RetrieverConfig::default(),
            scraper: ScraperConfig::default(),
            compression: CompressionConfig::default(),
            cache: CacheConfig::default(),
            verbose: false,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            report_type: ReportType::default(),
            report_format: String::from("apa"),
            total_words: 1000,
            max_sub_queries: 3,
            agent_role: None,
            target_language: TargetLanguage::default(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var("RESEARCHER_LLM_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.openai.com/v1"),
            model_efficient: String::from("gpt-4o-mini"),
            model_powerful: String::from("gpt-4o"),
            max_tokens: 4096,
            temperature: 0.4,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            timeout_seconds: 300,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("RESEARCHER_EMBEDDING_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.openai.com/v1"),
            model: String::from("text-embedding-3-small"),
            batch_size: 64,
        }
    }
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            backends: vec![RetrieverKind::Tavily, RetrieverKind::DuckDuckGo],
            max_results_per_query: 5,
            tavily_api_key: std::env::var("TAVILY_API_KEY").ok(),
            timeout_seconds: 20,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            timeout_seconds: 15,
            user_agent: String::from(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
            ),
            max_content_chars: 50_000,
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            max_results: 8,
            token_budget: Some(6000),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: PathBuf::from(".researcher/cache"),
        }
    }
}
