use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::generator::dedup::UrlTracker;

/// 报告类型，决定报告撰写时使用的提示词模板
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReportType {
    #[serde(rename = "research_report", alias = "research")]
    Research,
    #[serde(rename = "resource_report", alias = "resource")]
    Resource,
    #[serde(rename = "outline_report", alias = "outline")]
    Outline,
    #[serde(rename = "custom_report", alias = "custom")]
    Custom,
    #[serde(rename = "idea_research_report", alias = "idea-research")]
    #[default]
    IdeaResearch,
}

impl ReportType {
    pub const ALL: [ReportType; 5] = [
        ReportType::Research,
        ReportType::Resource,
        ReportType::Outline,
        ReportType::Custom,
        ReportType::IdeaResearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Research => "research_report",
            ReportType::Resource => "resource_report",
            ReportType::Outline => "outline_report",
            ReportType::Custom => "custom_report",
            ReportType::IdeaResearch => "idea_research_report",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportType {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "research" | "research_report" => Ok(ReportType::Research),
            "resource" | "resource_report" => Ok(ReportType::Resource),
            "outline" | "outline_report" => Ok(ReportType::Outline),
            "custom" | "custom_report" => Ok(ReportType::Custom),
            "idea_research" | "idea_research_report" => Ok(ReportType::IdeaResearch),
            _ => Err(ResearchError::Config(format!("unknown report type: {}", s))),
        }
    }
}

/// 想法拆解得到的子查询
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubIdea {
    pub query: String,
    /// 来源想法，仅作回溯引用
    pub parent: String,
}

/// 压缩器输出的相关文本块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    pub text: String,
    pub source_url: String,
    pub relevance_score: f64,
}

/// 一次研究请求
#[derive(Debug, Clone)]
pub struct ResearchRequest {
    pub idea: String,
    pub report_type: ReportType,
    /// 显式指定的资料来源，非空时跳过想法拆解与搜索
    pub source_urls: Vec<String>,
}

impl ResearchRequest {
    pub fn new(idea: impl Into<String>, report_type: ReportType) -> Self {
        Self {
            idea: idea.into(),
            report_type,
            source_urls: Vec::new(),
        }
    }

    pub fn with_source_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_urls = urls.into_iter().map(Into::into).collect();
        self
    }
}

/// 流水线状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    RoleSelected,
    ContextReady,
    ReportReady,
    Failed,
}

/// 流水线阶段，用于标记失败来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    RoleSelection,
    Decomposition,
    ContextAssembly,
    Synthesis,
    Output,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::RoleSelection => "role_selection",
            PipelineStage::Decomposition => "decomposition",
            PipelineStage::ContextAssembly => "context_assembly",
            PipelineStage::Synthesis => "synthesis",
            PipelineStage::Output => "output",
        };
        f.write_str(name)
    }
}

/// 研究过程中的错误分类
#[derive(Debug, Error)]
pub enum ResearchError {
    /// 配置错误：缺少凭据、未知报告类型等，不重试
    #[error("configuration error: {0}")]
    Config(String),

    /// 模型输出无法解析为期望的结构
    #[error("malformed {what} output: {reason}")]
    MalformedOutput { what: &'static str, reason: String },

    /// 向量化失败导致无法压缩
    #[error("context compression failed: {0}")]
    Compression(String),

    /// 上游服务调用失败
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

/// 流水线终止错误，携带失败阶段
#[derive(Debug, Error)]
#[error("research pipeline failed during {stage}: {source}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: ResearchError,
}

impl PipelineError {
    pub fn new(stage: PipelineStage, source: impl Into<ResearchError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// 选出的研究角色
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AgentRole {
    /// 角色名称，带emoji前缀，例如 "💰 Finance Agent"
    #[serde(alias = "server", alias = "agent")]
    pub name: String,
    /// 用于约束报告撰写的角色提示词
    pub agent_role_prompt: String,
}

/// 单次研究任务的全部状态，只属于一次流水线运行
#[derive(Debug)]
pub struct ResearchTask {
    pub id: Uuid,
    pub idea: String,
    pub report_type: ReportType,
    pub source_urls: Vec<String>,
    pub visited_urls: UrlTracker,
    /// 按子查询顺序累积的上下文块
    pub context: Vec<String>,
    pub role: Option<AgentRole>,
    pub report: Option<String>,
    pub state: PipelineState,
    /// 上下文是否来自缓存
    pub from_cache: bool,
}

impl ResearchTask {
    pub fn new(request: ResearchRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            idea: request.idea,
            report_type: request.report_type,
            source_urls: request.source_urls,
            visited_urls: UrlTracker::new(),
            context: Vec::new(),
            role: None,
            report: None,
            state: PipelineState::Init,
            from_cache: false,
        }
    }

    /// 累积的研究文本，即写入缓存和交给报告撰写的内容
    pub fn research_text(&self) -> String {
        self.context.join("\n\n")
    }
}

/// 一次成功运行的结果
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub task_id: Uuid,
    pub idea: String,
    pub report_type: ReportType,
    pub role: AgentRole,
    pub context: Vec<String>,
    pub visited_urls: Vec<String>,
    pub report: String,
    pub from_cache: bool,
}
