//! 网页抓取 - 并发获取URL正文，单个失败不影响其他URL

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::threads::do_parallel_with_limit;

pub mod web;

pub use web::WebScraper;

/// 抓取单个URL的正文
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// 抓取结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScrapeOutcome {
    Success { raw_text: String },
    Failure { reason: String },
}

/// 一次抓取尝试的记录，每个URL对应一条
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedDocument {
    pub url: String,
    #[serde(flatten)]
    pub outcome: ScrapeOutcome,
}

impl ScrapedDocument {
    pub fn success(url: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outcome: ScrapeOutcome::Success {
                raw_text: raw_text.into(),
            },
        }
    }

    pub fn failure(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outcome: ScrapeOutcome::Failure {
                reason: reason.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ScrapeOutcome::Success { .. })
    }

    /// 成功时返回正文
    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            ScrapeOutcome::Success { raw_text } => Some(raw_text),
            ScrapeOutcome::Failure { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            ScrapeOutcome::Success { .. } => None,
            ScrapeOutcome::Failure { reason } => Some(reason),
        }
    }
}

/// 以有限并发抓取一组URL，输出顺序与输入一致
///
/// 抓取失败或正文为空都记为失败记录，不会中断其他抓取。
pub async fn scrape_urls(
    scraper: &dyn Scraper,
    urls: &[String],
    max_concurrency: usize,
) -> Vec<ScrapedDocument> {
    let futures = urls
        .iter()
        .map(|url| async move {
            match scraper.fetch(url).await {
                Ok(text) if text.trim().is_empty() => {
                    ScrapedDocument::failure(url.clone(), "no readable content")
                }
                Ok(text) => ScrapedDocument::success(url.clone(), text),
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "fetch failed");
                    ScrapedDocument::failure(url.clone(), e.to_string())
                }
            }
        })
        .collect::<Vec<_>>();

    do_parallel_with_limit(futures, max_concurrency).await
}
