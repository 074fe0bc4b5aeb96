//! 研究流水线 - INIT → ROLE_SELECTED → CONTEXT_READY → REPORT_READY | FAILED

use tracing::Instrument;

use crate::generator::compressor::{ContextCompressor, format_chunks};
use crate::generator::context::ResearchContext;
use crate::generator::decomposer::IdeaDecomposer;
use crate::generator::progress::{ProgressEvent, ProgressSink};
use crate::generator::report::{ReportSynthesizer, SynthesisInput};
use crate::generator::role::RoleSelector;
use crate::generator::types::{
    AgentRole, PipelineError, PipelineStage, PipelineState, ReportType, ResearchError,
    ResearchOutcome, ResearchRequest, ResearchTask, SubIdea,
};
use crate::scraper::{ScrapedDocument, scrape_urls};

/// 研究流水线
pub struct Researcher {
    context: ResearchContext,
}

impl Researcher {
    pub fn new(context: ResearchContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ResearchContext {
        &self.context
    }

    fn progress(&self) -> &dyn ProgressSink {
        self.context.progress.as_ref()
    }

    async fn log(&self, message: impl Into<String>) {
        self.progress().emit(ProgressEvent::logs(message)).await;
    }

    /// 执行一次完整研究
    ///
    /// 每次调用都有独立的任务状态；丢弃返回的future会取消所有进行中的请求。
    pub async fn run(&self, request: ResearchRequest) -> Result<ResearchOutcome, PipelineError> {
        let mut task = ResearchTask::new(request);
        let span = tracing::info_span!(
            "research",
            task_id = %task.id,
            idea = %task.idea,
            report_type = %task.report_type
        );

        let result = self.drive(&mut task).instrument(span).await;
        if let Err(e) = &result {
            task.state = PipelineState::Failed;
            tracing::error!(task_id = %task.id, stage = %e.stage, error = %e.source, "research failed");
        }
        result
    }

    async fn drive(&self, task: &mut ResearchTask) -> Result<ResearchOutcome, PipelineError> {
        self.log(format!("🔎 Running research for '{}'...", task.idea))
            .await;

        // INIT → ROLE_SELECTED
        let role = RoleSelector::new(self.context.llm.clone())
            .select_role(&task.idea)
            .await
            .map_err(|e| PipelineError::new(PipelineStage::RoleSelection, e))?;
        tracing::info!(role = %role.name, "role selected");
        self.log(role.name.clone()).await;
        task.role = Some(role.clone());
        task.state = PipelineState::RoleSelected;

        // ROLE_SELECTED → CONTEXT_READY
        self.assemble_context(task, &role).await?;
        task.state = PipelineState::ContextReady;
        self.log(format!(
            "Total research words: {}",
            task.research_text().split_whitespace().count()
        ))
        .await;
        tracing::info!(
            blocks = task.context.len(),
            visited = task.visited_urls.len(),
            from_cache = task.from_cache,
            "context ready"
        );

        // CONTEXT_READY → REPORT_READY
        let writing_role = self.writing_role(task.report_type, role);
        self.log(format!(
            "✍️ Writing {} for research task: {}...",
            task.report_type, task.idea
        ))
        .await;

        let synthesizer = ReportSynthesizer::new(self.context.llm.clone(), &self.context.config.report);
        let report = synthesizer
            .synthesize(
                SynthesisInput {
                    idea: &task.idea,
                    context: &task.context,
                    role: &writing_role,
                    report_type: task.report_type,
                },
                self.progress(),
            )
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Synthesis, e))?;
        task.report = Some(report.clone());
        task.state = PipelineState::ReportReady;

        Ok(ResearchOutcome {
            task_id: task.id,
            idea: task.idea.clone(),
            report_type: task.report_type,
            role: writing_role,
            context: task.context.clone(),
            visited_urls: task.visited_urls.visited(),
            report,
            from_cache: task.from_cache,
        })
    }

    /// 自定义报告优先使用配置中的角色提示词
    fn writing_role(&self, report_type: ReportType, selected: AgentRole) -> AgentRole {
        match (&self.context.config.report.agent_role, report_type) {
            (Some(custom), ReportType::Custom) if !custom.trim().is_empty() => AgentRole {
                name: selected.name,
                agent_role_prompt: custom.clone(),
            },
            _ => selected,
        }
    }

    /// 先查缓存，未命中时检索并在组装完成后写入缓存
    async fn assemble_context(
        &self,
        task: &mut ResearchTask,
        role: &AgentRole,
    ) -> Result<(), PipelineError> {
        let cache = &self.context.cache;
        match cache.get(&task.idea).await {
            Ok(Some(entry)) => {
                self.log(format!(
                    "📦 Using cached research for '{}' (saved {})",
                    task.idea,
                    entry.created_at.format("%Y-%m-%d %H:%M")
                ))
                .await;
                task.context = vec![entry.research_text];
                task.from_cache = true;
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "cache lookup failed, researching from scratch"),
        }

        if task.source_urls.is_empty() {
            self.context_by_idea(task, role).await?;
        } else {
            self.context_by_urls(task).await;
        }

        if task.context.is_empty() {
            self.log("⚠️ No usable research context was found, writing the report without it.")
                .await;
            return Ok(());
        }

        if let Err(e) = cache.put(&task.idea, &task.research_text()).await {
            tracing::warn!(error = %e, "failed to cache research text");
        }
        Ok(())
    }

    /// 只研究显式给出的URL，不做拆解与搜索
    async fn context_by_urls(&self, task: &mut ResearchTask) {
        let urls = task
            .visited_urls
            .admit(&task.source_urls, self.progress())
            .await;
        self.log(format!(
            "🧠 I will conduct my research based on the following urls: {:?}...",
            urls
        ))
        .await;

        let documents = self.scrape(&urls).await;
        let idea = task.idea.clone();
        if let Some(block) = self.compress(&idea, &documents).await {
            task.context.push(block);
        }
    }

    /// 拆解想法后逐个子查询检索，子查询之间顺序执行
    async fn context_by_idea(
        &self,
        task: &mut ResearchTask,
        role: &AgentRole,
    ) -> Result<(), PipelineError> {
        let decomposer = IdeaDecomposer::new(
            self.context.llm.clone(),
            self.context.config.report.max_sub_queries,
        );
        let sub_ideas = decomposer
            .decompose(&task.idea, role)
            .await
            .map_err(|e| PipelineError::new(PipelineStage::Decomposition, e))?;

        let queries: Vec<&str> = sub_ideas.iter().map(|s| s.query.as_str()).collect();
        self.log(format!(
            "🧠 I will conduct my research based on the following ideas: {:?}...",
            queries
        ))
        .await;

        for sub_idea in &sub_ideas {
            if let Some(block) = self.research_sub_idea(task, sub_idea).await {
                task.context.push(block);
            }
        }
        Ok(())
    }

    /// 搜索 → 去重 → 抓取 → 压缩，返回该子查询的上下文块
    async fn research_sub_idea(&self, task: &ResearchTask, sub_idea: &SubIdea) -> Option<String> {
        let query = sub_idea.query.as_str();
        self.log(format!("\n🔎 Running research for '{}'...", query))
            .await;

        let hits = self
            .context
            .retriever
            .search(
                query,
                self.context.config.retriever.max_results_per_query,
                self.progress(),
            )
            .await;
        let urls = task
            .visited_urls
            .admit(hits.iter().map(|h| h.url.as_str()), self.progress())
            .await;
        tracing::debug!(query, hits = hits.len(), new_urls = urls.len(), "search done");

        self.log("🤔 Researching for relevant information...").await;
        let documents = self.scrape(&urls).await;
        self.compress(query, &documents).await
    }

    async fn scrape(&self, urls: &[String]) -> Vec<ScrapedDocument> {
        let documents = scrape_urls(
            self.context.scraper.as_ref(),
            urls,
            self.context.config.scraper.max_concurrency,
        )
        .await;

        for doc in &documents {
            if let Some(reason) = doc.failure_reason() {
                tracing::warn!(url = %doc.url, reason, "skipping source");
                self.log(format!("⚠️ Failed to read {}: {}", doc.url, reason))
                    .await;
            }
        }
        documents
    }

    /// 压缩失败或没有可用文本块时不产生上下文块
    async fn compress(&self, topic: &str, documents: &[ScrapedDocument]) -> Option<String> {
        self.log(format!(
            "📃 Getting relevant content based on idea: {}...",
            topic
        ))
        .await;

        let compressor = ContextCompressor::new(
            self.context.embedder.clone(),
            &self.context.config.compression,
            self.context.config.embedding.batch_size,
        );
        match compressor
            .compress(topic, documents, self.context.config.compression.max_results)
            .await
        {
            Ok(chunks) if chunks.is_empty() => {
                self.log(format!("📭 No relevant content found for '{}'", topic))
                    .await;
                None
            }
            Ok(chunks) => {
                let block = format_chunks(&chunks);
                self.log(format!("📃 {}", block)).await;
                Some(block)
            }
            Err(e) => {
                self.report_compression_failure(topic, &e).await;
                None
            }
        }
    }

    async fn report_compression_failure(&self, topic: &str, error: &ResearchError) {
        tracing::warn!(topic, error = %error, "compression failed");
        self.log(format!(
            "⚠️ Could not extract relevant content for '{}': {}",
            topic, error
        ))
        .await;
    }
}
