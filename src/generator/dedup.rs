use reqwest::Url;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use crate::generator::progress::{ProgressEvent, ProgressSink};

/// 任务级URL去重器
///
/// 检查与登记在同一把锁内完成，并发调用时同一URL只会被放行一次。
#[derive(Debug, Default)]
pub struct UrlTracker {
    state: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    seen: HashSet<String>,
    order: Vec<String>,
}

impl UrlTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 持锁方panic后集合本身仍然完整，继续使用而不是丢弃后续URL
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::error!("url tracker lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// 放行未见过的URL并登记，为每个新URL发出一条进度事件
    pub async fn admit<I, S>(&self, candidates: I, progress: &dyn ProgressSink) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let admitted = self.admit_silently(candidates);
        for url in &admitted {
            progress
                .emit(ProgressEvent::logs(format!(
                    "✅ Adding source url to research: {}",
                    url
                )))
                .await;
        }
        admitted
    }

    /// 同admit，但不发出事件；返回顺序为首次出现的顺序
    pub fn admit_silently<I, S>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.lock();

        let mut admitted = Vec::new();
        for candidate in candidates {
            let Some(url) = normalize(candidate.as_ref()) else {
                continue;
            };
            if state.seen.insert(url.clone()) {
                state.order.push(url.clone());
                admitted.push(url);
            }
        }
        admitted
    }

    /// 已登记的URL，按登记顺序
    pub fn visited(&self) -> Vec<String> {
        self.lock().order.clone()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().seen.contains(url.trim())
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 只接受http/https绝对地址，其余静默丢弃
fn normalize(candidate: &str) -> Option<String> {
    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return None;
    }
    let parsed = Url::parse(trimmed).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(trimmed.to_string())
}
