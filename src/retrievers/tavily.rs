use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{SearchBackend, SearchError, SearchHit};

const BACKEND: &str = "tavily";
const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Tavily搜索API
pub struct TavilySearch {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilySearch {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint: TAVILY_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchBackend for TavilySearch {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| SearchError::Config {
            backend: BACKEND,
            reason: "Tavily API key not found, set TAVILY_API_KEY or retriever.tavily_api_key"
                .to_string(),
        })?;

        let request = TavilyRequest {
            api_key,
            query,
            search_depth: "advanced",
            max_results,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
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
        parse_response(&body)
    }
}

/// 解析Tavily返回的JSON
fn parse_response(body: &str) -> Result<Vec<SearchHit>, SearchError> {
    let parsed: TavilyResponse = serde_json::from_str(body).map_err(|e| SearchError::Parse {
        backend: BACKEND,
        reason: e.to_string(),
    })?;

    Ok(parsed
        .results
        .into_iter()
        .filter(|r| !r.url.trim().is_empty())
        .map(|r| SearchHit {
            url: r.url,
            snippet: r.content,
        })
        .collect())
}
