use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 缓存性能监控器
#[derive(Clone, Default)]
pub struct CachePerformanceMonitor {
    metrics: Arc<CacheMetrics>,
}

/// 缓存指标
#[derive(Default)]
struct CacheMetrics {
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    cache_writes: AtomicUsize,
    cache_errors: AtomicUsize,
}

/// 缓存性能报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePerformanceReport {
    /// 缓存命中率
    pub hit_rate: f64,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_writes: usize,
    pub cache_errors: usize,
}

impl CachePerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("research cache hit");
    }

    pub fn record_cache_miss(&self) {
        self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("research cache miss");
    }

    pub fn record_cache_write(&self) {
        self.metrics.cache_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_error(&self, error: &str) {
        self.metrics.cache_errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(error, "research cache error");
    }

    /// 生成性能报告
    pub fn generate_report(&self) -> CachePerformanceReport {
        let cache_hits = self.metrics.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.metrics.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;
        let hit_rate = if lookups > 0 {
            cache_hits as f64 / lookups as f64
        } else {
            0.0
        };

        CachePerformanceReport {
            hit_rate,
            cache_hits,
            cache_misses,
            cache_writes: self.metrics.cache_writes.load(Ordering::Relaxed),
            cache_errors: self.metrics.cache_errors.load(Ordering::Relaxed),
        }
    }
}

impl CachePerformanceReport {
    /// 单行摘要，用于运行结束时打印
    pub fn summary(&self) -> String {
        format!(
            "📦 Research cache: {} hits / {} misses ({:.0}% hit rate), {} writes, {} errors",
            self.cache_hits,
            self.cache_misses,
            self.hit_rate * 100.0,
            self.cache_writes,
            self.cache_errors
        )
    }
}
