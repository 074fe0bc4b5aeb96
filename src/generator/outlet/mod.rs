use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::cache::ResearchCache;
use crate::generator::context::ResearchContext;
use crate::generator::progress::ProgressEvent;
use crate::generator::types::ResearchOutcome;

/// 保存报告并通知传输层，返回markdown文件路径
pub async fn save(context: &ResearchContext, outcome: &ResearchOutcome) -> Result<PathBuf> {
    let outlet = DiskOutlet::new(&context.config.output_path);
    let path = outlet.save(outcome).await?;
    context
        .progress
        .emit(ProgressEvent::path(path.display().to_string()))
        .await;
    Ok(path)
}

pub trait Outlet {
    async fn save(&self, outcome: &ResearchOutcome) -> Result<PathBuf>;
}

/// 研究过程的元数据，与报告一起保存
#[derive(Serialize)]
struct ResearchManifest<'a> {
    task_id: String,
    idea: &'a str,
    report_type: &'a str,
    agent: &'a str,
    from_cache: bool,
    visited_urls: &'a [String],
    context_blocks: usize,
}

/// 写入 `<output>/<想法哈希>/<报告类型>.md|.html`
pub struct DiskOutlet {
    output_dir: PathBuf,
}

impl DiskOutlet {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// 同一想法的所有报告放在同一目录下
    pub fn task_dir(&self, idea: &str) -> PathBuf {
        self.output_dir.join(ResearchCache::key_for(idea))
    }
}

impl Outlet for DiskOutlet {
    async fn save(&self, outcome: &ResearchOutcome) -> Result<PathBuf> {
        let dir = self.task_dir(&outcome.idea);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create output dir {}", dir.display()))?;

        let stem = outcome.report_type.as_str();
        let markdown_path = dir.join(format!("{}.md", stem));
        fs::write(&markdown_path, &outcome.report)
            .await
            .with_context(|| format!("Failed to write {}", markdown_path.display()))?;

        let html_path = dir.join(format!("{}.html", stem));
        fs::write(&html_path, render_html(&outcome.idea, &outcome.report))
            .await
            .with_context(|| format!("Failed to write {}", html_path.display()))?;

        let manifest = ResearchManifest {
            task_id: outcome.task_id.to_string(),
            idea: &outcome.idea,
            report_type: stem,
            agent: &outcome.role.name,
            from_cache: outcome.from_cache,
            visited_urls: &outcome.visited_urls,
            context_blocks: outcome.context.len(),
        };
        let manifest_path = dir.join(format!("{}.json", stem));
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
            .await
            .with_context(|| format!("Failed to write {}", manifest_path.display()))?;

        tracing::info!(path = %markdown_path.display(), "report saved");
        Ok(markdown_path)
    }
}

fn render_html(title: &str, report: &str) -> String {
    let body = markdown::to_html(report);
    let title = title
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        title, body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::types::{AgentRole, ReportType};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn outcome() -> ResearchOutcome {
        ResearchOutcome {
            task_id: Uuid::new_v4(),
            idea: "condo <concierge> app".to_string(),
            report_type: ReportType::Outline,
            role: AgentRole {
                name: "🏢 Real Estate Agent".to_string(),
                agent_role_prompt: "You are a property analyst.".to_string(),
            },
            context: vec!["ctx".to_string()],
            visited_urls: vec!["https://a.com/".to_string()],
            report: "# Outline\n\n- point".to_string(),
            from_cache: false,
        }
    }

    #[tokio::test]
    async fn test_saves_markdown_html_and_manifest() {
        let tmp = TempDir::new().unwrap();
        let outlet = DiskOutlet::new(tmp.path());
        let outcome = outcome();

        let path = outlet.save(&outcome).await.unwrap();

        let dir = tmp.path().join(ResearchCache::key_for(&outcome.idea));
        assert_eq!(path, dir.join("outline_report.md"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), outcome.report);

        let html = std::fs::read_to_string(dir.join("outline_report.html")).unwrap();
        assert!(html.contains("<h1>Outline</h1>"));
        assert!(html.contains("<title>condo &lt;concierge&gt; app</title>"));

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.join("outline_report.json")).unwrap())
                .unwrap();
        assert_eq!(manifest["visited_urls"][0], "https://a.com/");
        assert_eq!(manifest["context_blocks"], 1);
    }

    #[tokio::test]
    async fn test_second_report_type_shares_directory() {
        let tmp = TempDir::new().unwrap();
        let outlet = DiskOutlet::new(tmp.path());
        let mut outcome = outcome();
        outlet.save(&outcome).await.unwrap();
        outcome.report_type = ReportType::Research;
        let path = outlet.save(&outcome).await.unwrap();

        assert_eq!(path.parent(), Some(outlet.task_dir(&outcome.idea).as_path()));
        assert!(path.parent().unwrap().join("outline_report.md").exists());
    }
}
