//! 语言模型与向量模型的调用接口
//!
//! 流水线只依赖这里的两个trait，具体实现由rig提供，测试中可以替换为假实现。

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

pub mod client;
pub mod embedding;

pub use client::LLMClient;
pub use embedding::EmbeddingClient;

/// 文本增量流
pub type TextStream = BoxStream<'static, Result<String>>;

/// 语言模型：提示词输入，文本输出
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 阻塞式调用，返回完整文本
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// 流式调用，逐段返回文本
    async fn stream(&self, system_prompt: &str, user_prompt: &str) -> Result<TextStream>;
}

/// 向量模型：文本输入，向量输出
#[async_trait]
pub trait Embedder: Send + Sync {
    /// 输出与输入一一对应
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>>;
}
