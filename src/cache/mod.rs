use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

use crate::config::CacheConfig;

pub mod performance_monitor;
pub use performance_monitor::{CachePerformanceMonitor, CachePerformanceReport};

const RESEARCH_CATEGORY: &str = "research";

/// 研究结果缓存
///
/// 每个想法对应一个文件，键为想法原文的MD5。条目写入后永久有效，没有过期策略。
#[derive(Clone)]
pub struct ResearchCache {
    config: CacheConfig,
    performance_monitor: CachePerformanceMonitor,
}

/// 缓存条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// 想法原文的MD5哈希
    pub key: String,
    pub idea: String,
    pub created_at: DateTime<Utc>,
    /// 拼接后的研究文本
    pub research_text: String,
}

impl ResearchCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            performance_monitor: CachePerformanceMonitor::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// 想法文本的稳定哈希，仅依赖原文字节
    pub fn key_for(idea: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(idea.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// 获取缓存文件路径
    fn entry_path(&self, key: &str) -> PathBuf {
        self.config
            .cache_dir
            .join(RESEARCH_CATEGORY)
            .join(format!("{}.json", key))
    }

    /// 读取想法对应的研究文本
    ///
    /// 文件损坏视为未命中，记录错误但不中断流程。
    pub async fn get(&self, idea: &str) -> Result<Option<CacheEntry>> {
        if !self.config.enabled {
            return Ok(None);
        }

        let key = Self::key_for(idea);
        let path = self.entry_path(&key);

        if !fs::try_exists(&path).await.unwrap_or(false) {
            self.performance_monitor.record_cache_miss();
            return Ok(None);
        }

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                self.performance_monitor
                    .record_cache_error(&format!("failed to read {}: {}", path.display(), e));
                return Ok(None);
            }
        };

        match serde_json::from_str::<CacheEntry>(&content) {
            Ok(entry) if entry.key == key => {
                self.performance_monitor.record_cache_hit();
                Ok(Some(entry))
            }
            Ok(_) => {
                self.performance_monitor
                    .record_cache_error(&format!("key mismatch in {}", path.display()));
                Ok(None)
            }
            Err(e) => {
                self.performance_monitor
                    .record_cache_error(&format!("failed to deserialize {}: {}", path.display(), e));
                Ok(None)
            }
        }
    }

    /// 写入研究文本
    ///
    /// 先写临时文件再原子重命名，中途取消或失败不会留下半个条目。
    pub async fn put(&self, idea: &str, research_text: &str) -> Result<Option<CacheEntry>> {
        if !self.config.enabled {
            return Ok(None);
        }

        let key = Self::key_for(idea);
        let path = self.entry_path(&key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create cache dir {:?}", parent))?;
        }

        let entry = CacheEntry {
            key: key.clone(),
            idea: idea.to_string(),
            created_at: Utc::now(),
            research_text: research_text.to_string(),
        };
        let content = serde_json::to_string_pretty(&entry)?;

        let tmp_path = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4()));
        let write_result = async {
            fs::write(&tmp_path, content).await?;
            fs::rename(&tmp_path, &path).await
        }
        .await;

        match write_result {
            Ok(()) => {
                self.performance_monitor.record_cache_write();
                Ok(Some(entry))
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_path).await;
                self.performance_monitor
                    .record_cache_error(&format!("failed to write {}: {}", path.display(), e));
                Err(e).context(format!("Failed to write cache entry {:?}", path))
            }
        }
    }

    /// 生成性能报告
    pub fn generate_performance_report(&self) -> CachePerformanceReport {
        self.performance_monitor.generate_report()
    }
}
