//! 报告撰写 - 按报告类型选择模板，支持阻塞与流式两种交付方式

use futures::StreamExt;
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use crate::config::ReportConfig;
use crate::generator::progress::{ProgressEvent, ProgressSink};
use crate::generator::prompts::{ReportPromptArgs, template_for};
use crate::generator::types::{AgentRole, ReportType, ResearchError};
use crate::i18n::TargetLanguage;
use crate::llm::LanguageModel;

/// 首次失败后的额外尝试次数
const SYNTHESIS_RETRIES: usize = 1;

static URL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'\)\]]+"#).ok());

/// 一次报告撰写的输入
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub idea: &'a str,
    pub context: &'a [String],
    pub role: &'a AgentRole,
    pub report_type: ReportType,
}

pub struct ReportSynthesizer {
    llm: Arc<dyn LanguageModel>,
    report_format: String,
    total_words: usize,
    language: TargetLanguage,
}

impl ReportSynthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>, config: &ReportConfig) -> Self {
        Self {
            llm,
            report_format: config.report_format.clone(),
            total_words: config.total_words,
            language: config.target_language.clone(),
        }
    }

    /// 有实时传输层时流式撰写，否则阻塞撰写；失败时以相同输入重试一次
    pub async fn synthesize(
        &self,
        input: SynthesisInput<'_>,
        progress: &dyn ProgressSink,
    ) -> Result<String, ResearchError> {
        let live = progress.is_live();
        let mut attempt = 0;
        loop {
            let result = if live {
                self.synthesize_streaming(input, progress).await
            } else {
                self.synthesize_blocking(input).await
            };
            match result {
                Ok(report) => return Ok(report),
                Err(e) if attempt < SYNTHESIS_RETRIES => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, "report synthesis failed, retrying");
                    progress
                        .emit(ProgressEvent::logs(format!(
                            "⚠️ Report writing failed: {}. Retrying...",
                            e
                        )))
                        .await;
                    if live {
                        progress.emit(ProgressEvent::report_reset()).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 返回完整报告
    pub async fn synthesize_blocking(
        &self,
        input: SynthesisInput<'_>,
    ) -> Result<String, ResearchError> {
        let prompt = self.build_prompt(&input);
        let report = self
            .llm
            .complete(&input.role.agent_role_prompt, &prompt)
            .await?;
        finish(report)
    }

    /// 每段增量都作为report事件推送，最终返回拼接后的完整报告
    pub async fn synthesize_streaming(
        &self,
        input: SynthesisInput<'_>,
        progress: &dyn ProgressSink,
    ) -> Result<String, ResearchError> {
        let prompt = self.build_prompt(&input);
        let mut stream = self
            .llm
            .stream(&input.role.agent_role_prompt, &prompt)
            .await?;

        let mut report = String::new();
        while let Some(delta) = stream.next().await {
            let delta = delta?;
            if delta.is_empty() {
                continue;
            }
            progress.emit(ProgressEvent::report(delta.clone())).await;
            report.push_str(&delta);
        }
        finish(report)
    }

    fn build_prompt(&self, input: &SynthesisInput<'_>) -> String {
        let context = input.context.join("\n\n");
        let args = ReportPromptArgs {
            idea: input.idea,
            context: &context,
            report_format: &self.report_format,
            total_words: self.total_words,
            language: self.language.clone(),
        };
        template_for(input.report_type)(&args)
    }
}

fn finish(report: String) -> Result<String, ResearchError> {
    if report.trim().is_empty() {
        return Err(ResearchError::Upstream(anyhow::anyhow!(
            "model returned an empty report"
        )));
    }
    Ok(dedupe_references(&report))
}

/// 参考文献部分中，同一URL只保留第一次出现的条目
pub fn dedupe_references(report: &str) -> String {
    let Some(url_re) = URL_PATTERN.as_ref() else {
        return report.to_string();
    };

    let mut in_references = false;
    let mut seen: HashSet<String> = HashSet::new();
    let mut lines: Vec<&str> = Vec::new();

    for line in report.lines() {
        if let Some(title) = heading_title(line) {
            in_references = is_reference_title(&title);
            lines.push(line);
            continue;
        }
        if in_references {
            if let Some(m) = url_re.find(line) {
                if !seen.insert(normalize_reference_url(m.as_str())) {
                    continue;
                }
            }
        }
        lines.push(line);
    }

    let mut result = lines.join("\n");
    if report.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// markdown标题或整行加粗的伪标题
fn heading_title(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.starts_with('#') {
        return Some(trimmed.trim_start_matches('#').trim().to_string());
    }
    if trimmed.len() > 4 && trimmed.starts_with("**") && trimmed.ends_with("**") {
        return Some(trimmed.trim_matches('*').trim().trim_end_matches(':').to_string());
    }
    None
}

fn is_reference_title(title: &str) -> bool {
    let title = title.to_lowercase();
    ["reference", "sources", "bibliography", "works cited", "参考"]
        .iter()
        .any(|k| title.contains(k))
}

fn normalize_reference_url(url: &str) -> String {
    url.trim_end_matches(['.', ',', ';', ':'])
        .trim_end_matches('/')
        .to_lowercase()
}
