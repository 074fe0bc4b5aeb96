//! LLM客户端 - 基于rig的语言模型实现

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::config::LLMConfig;
use crate::llm::{LanguageModel, TextStream};

mod providers;
pub mod utils;

use providers::ProviderClient;
use utils::{evaluate_befitting_model, with_idle_timeout};

/// LLM客户端 - 提供统一的LLM服务接口
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let client = ProviderClient::new(config)?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// 检查模型连接和功能是否正常
    pub async fn check_connection(&self) -> Result<()> {
        tracing::info!(provider = %self.config.provider, "checking model connection");
        self.complete("You are a helpful assistant.", "Hello")
            .await
            .map(|_| ())
            .map_err(|e| anyhow!("model connection check failed: {}", e))
    }

    /// 通用重试逻辑，用于处理异步操作的重试机制
    async fn retry_with_backoff<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_retries = self.config.retry_attempts.max(1);
        let retry_delay_ms = self.config.retry_delay_ms;
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    retries += 1;
                    tracing::warn!(
                        attempt = retries,
                        max_attempts = max_retries,
                        error = %err,
                        "model call failed"
                    );
                    if retries >= max_retries {
                        return Err(err);
                    }
                    tokio::time::sleep(Duration::from_millis(retry_delay_ms * retries as u64))
                        .await;
                }
            }
        }
    }

    async fn prompt_with_model(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String> {
        let agent = self.client.create_agent(model, system_prompt, &self.config);
        let timeout = Duration::from_secs(self.config.timeout_seconds.max(1));

        self.retry_with_backoff(|| async {
            tokio::time::timeout(timeout, agent.prompt(user_prompt))
                .await
                .map_err(|_| anyhow!("model call timed out after {}s", timeout.as_secs()))?
        })
        .await
    }
}

#[async_trait]
impl LanguageModel for LLMClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let (befitting_model, fallover_model) =
            evaluate_befitting_model(&self.config, system_prompt, user_prompt);

        match self
            .prompt_with_model(&befitting_model, system_prompt, user_prompt)
            .await
        {
            Ok(text) => Ok(text),
            Err(e) => match fallover_model {
                Some(model) => {
                    tracing::warn!(
                        model = %befitting_model,
                        fallback = %model,
                        error = %e,
                        "model failed, switching to fallback model"
                    );
                    self.prompt_with_model(&model, system_prompt, user_prompt)
                        .await
                }
                None => Err(e),
            },
        }
    }

    async fn stream(&self, system_prompt: &str, user_prompt: &str) -> Result<TextStream> {
        // 报告撰写使用高质量模型
        let agent = self
            .client
            .create_agent(&self.config.model_powerful, system_prompt, &self.config);
        let idle = Duration::from_secs(self.config.timeout_seconds.max(1));
        Ok(with_idle_timeout(agent.stream(user_prompt).await, idle))
    }
}
