use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use super::{SearchBackend, SearchError, SearchHit};
use crate::utils::html::html_to_text;

const BACKEND: &str = "duckduckgo";
const DDG_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

static RESULT_LINK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="[^"]*result__a[^"]*"[^>]*href="([^"]+)"[^>]*>"#).ok()
});

static RESULT_LINK_HREF_FIRST: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*href="([^"]+)"[^>]*class="[^"]*result__a[^"]*"[^>]*>"#).ok()
});

static RESULT_SNIPPET: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?s)<(?:a|div|td)[^>]*class="[^"]*result__snippet[^"]*"[^>]*>(.*?)</(?:a|div|td)>"#)
        .ok()
});

/// DuckDuckGo HTML搜索，不需要API key
pub struct DuckDuckGoSearch {
    http: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            endpoint: DDG_HTML_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoSearch {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("q", query), ("kl", "wt-wt")])
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0 (compatible; idea-researcher)")
            .send()
            .await
            .map_err(|source| SearchError::Http {
                backend: BACKEND,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status {
                backend: BACKEND,
                status,
            });
        }

        let body = response.text().await.map_err(|source| SearchError::Http {
            backend: BACKEND,
            source,
        })?;
        parse_results(&body, max_results)
    }
}

/// 从结果页HTML中提取链接和摘要
fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
    let (Some(link_re), Some(link_alt_re), Some(snippet_re)) = (
        RESULT_LINK.as_ref(),
        RESULT_LINK_HREF_FIRST.as_ref(),
        RESULT_SNIPPET.as_ref(),
    ) else {
        return Err(SearchError::Parse {
            backend: BACKEND,
            reason: "result patterns failed to compile".to_string(),
        });
    };

    let mut links: Vec<(usize, String)> = link_re
        .captures_iter(html)
        .chain(link_alt_re.captures_iter(html))
        .filter_map(|caps| {
            let m = caps.get(1)?;
            Some((m.start(), m.as_str().to_string()))
        })
        .collect();
    links.sort_by_key(|(pos, _)| *pos);
    links.dedup_by_key(|(pos, _)| *pos);

    let snippets: Vec<(usize, String)> = snippet_re
        .captures_iter(html)
        .filter_map(|caps| {
            let m = caps.get(1)?;
            Some((m.start(), clean_snippet(m.as_str())))
        })
        .collect();

    let mut hits: Vec<SearchHit> = Vec::new();
    for (index, (pos, href)) in links.iter().enumerate() {
        if hits.len() >= max_results {
            break;
        }
        let Some(url) = resolve_result_url(href) else {
            continue;
        };
        if hits.iter().any(|h| h.url == url) {
            continue;
        }
        // 摘要必须位于当前链接与下一个链接之间
        let next_pos = links.get(index + 1).map(|(p, _)| *p).unwrap_or(usize::MAX);
        let snippet = snippets
            .iter()
            .find(|(s, _)| *s > *pos && *s < next_pos)
            .map(|(_, text)| text.clone())
            .unwrap_or_default();
        hits.push(SearchHit { url, snippet });
    }
    Ok(hits)
}

/// 结果链接通常是 //duckduckgo.com/l/?uddg=<编码后的目标地址>
fn resolve_result_url(href: &str) -> Option<String> {
    let href = href.replace("&amp;", "&");
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{}", href)
    } else {
        href
    };

    let parsed = reqwest::Url::parse(&absolute).ok()?;
    let target = if parsed
        .host_str()
        .is_some_and(|h| h.ends_with("duckduckgo.com"))
    {
        let uddg = parsed
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())?;
        reqwest::Url::parse(&uddg).ok()?
    } else {
        parsed
    };

    match target.scheme() {
        "http" | "https" => Some(target.to_string()),
        _ => None,
    }
}

/// 摘要片段无法渲染时返回空字符串
fn clean_snippet(raw: &str) -> String {
    html_to_text(raw)
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
