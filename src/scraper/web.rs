use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::time::Duration;

use super::Scraper;
use crate::config::ScraperConfig;
use crate::utils::html::html_to_text;

/// 基于reqwest的网页抓取器
#[derive(Clone)]
pub struct WebScraper {
    http: reqwest::Client,
    max_content_chars: usize,
}

impl WebScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("failed to build HTTP client for scraping")?;
        Ok(Self {
            http,
            max_content_chars: config.max_content_chars,
        })
    }
}

#[async_trait]
impl Scraper for WebScraper {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{} returned HTTP {}", url, status));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();
        let kind = classify_content_type(&content_type)
            .ok_or_else(|| anyhow!("unsupported content type '{}'", content_type))?;

        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read body of {}", url))?;

        let text = match kind {
            ContentKind::Html => html_to_text(&body)
                .with_context(|| format!("failed to extract text from {}", url))?,
            ContentKind::Plain => body.trim().to_string(),
        };
        Ok(truncate_chars(text, self.max_content_chars))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ContentKind {
    Html,
    Plain,
}

fn classify_content_type(content_type: &str) -> Option<ContentKind> {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    match mime {
        "text/html" | "application/xhtml+xml" => Some(ContentKind::Html),
        "text/plain" | "text/markdown" | "application/json" => Some(ContentKind::Plain),
        m if m.starts_with("text/") => Some(ContentKind::Plain),
        _ => None,
    }
}

/// 按字符截断，0表示不限制
fn truncate_chars(text: String, max_chars: usize) -> String {
    if max_chars == 0 {
        return text;
    }
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_content_type() {
        assert_eq!(
            classify_content_type("text/html; charset=utf-8"),
            Some(ContentKind::Html)
        );
        assert_eq!(classify_content_type("text/plain"), Some(ContentKind::Plain));
        assert_eq!(classify_content_type("text/csv"), Some(ContentKind::Plain));
        assert_eq!(classify_content_type("application/pdf"), None);
        assert_eq!(classify_content_type("image/png"), None);
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("公寓管家应用".to_string(), 2), "公寓");
        assert_eq!(truncate_chars("short".to_string(), 100), "short");
        assert_eq!(truncate_chars("unbounded".to_string(), 0), "unbounded");
    }

    #[test]
    fn test_new_uses_config() {
        let scraper = WebScraper::new(&ScraperConfig::default()).unwrap();
        assert_eq!(
            scraper.max_content_chars,
            ScraperConfig::default().max_content_chars
        );
    }
}
