//! 进度事件流 - 流水线向外部传输层推送日志、报告片段与输出路径

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// 进度事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Logs,
    Path,
    Report,
    /// 之前推送的报告片段作废，随后的片段是重新撰写的报告
    #[serde(rename = "report_reset")]
    ReportReset,
}

/// 进度事件，序列化为 `{"type": ..., "output": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub output: String,
}

impl ProgressEvent {
    pub fn logs(output: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Logs,
            output: output.into(),
        }
    }

    pub fn path(output: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Path,
            output: output.into(),
        }
    }

    pub fn report(output: impl Into<String>) -> Self {
        Self {
            kind: ProgressKind::Report,
            output: output.into(),
        }
    }

    pub fn report_reset() -> Self {
        Self {
            kind: ProgressKind::ReportReset,
            output: String::new(),
        }
    }
}

/// 有序的进度事件接收端
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, event: ProgressEvent);

    /// 是否连接了实时传输层，决定报告以流式还是阻塞方式生成
    fn is_live(&self) -> bool {
        false
    }
}

/// 丢弃所有事件
#[derive(Debug, Default, Clone)]
pub struct NoopProgress;

#[async_trait]
impl ProgressSink for NoopProgress {
    async fn emit(&self, _event: ProgressEvent) {}
}

/// 直接打印到终端
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    live: bool,
}

impl ConsoleProgress {
    pub fn new(live: bool) -> Self {
        Self { live }
    }
}

#[async_trait]
impl ProgressSink for ConsoleProgress {
    async fn emit(&self, event: ProgressEvent) {
        match event.kind {
            ProgressKind::Logs => println!("{}", event.output),
            ProgressKind::Path => println!("💾 {}", event.output),
            ProgressKind::Report => {
                print!("{}", event.output);
                let _ = std::io::stdout().flush();
            }
            ProgressKind::ReportReset => {
                println!("\n\n↩️ Discarding the partial report and starting over...\n")
            }
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// 在内存中记录事件
#[derive(Debug, Default)]
pub struct MemoryProgress {
    events: Mutex<Vec<ProgressEvent>>,
    live: bool,
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            live: true,
        }
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn logs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == ProgressKind::Logs)
            .map(|e| e.output)
            .collect()
    }

    /// 客户端最终看到的报告：最后一次重置之后的全部片段
    pub fn streamed_report(&self) -> String {
        let mut report = String::new();
        for event in self.events() {
            match event.kind {
                ProgressKind::Report => report.push_str(&event.output),
                ProgressKind::ReportReset => report.clear(),
                _ => {}
            }
        }
        report
    }
}

#[async_trait]
impl ProgressSink for MemoryProgress {
    async fn emit(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

/// 带有界队列的传输端：生产者只等待队列空位，由后台任务负责向慢速消费者转发
pub struct QueuedProgress {
    sender: mpsc::Sender<ProgressEvent>,
}

impl QueuedProgress {
    /// 创建队列，返回发送端与接收端
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// 创建队列并启动转发任务，每个事件以一行JSON写入writer
    pub fn spawn_json_lines<W>(capacity: usize, mut writer: W) -> (Self, JoinHandle<()>)
    where
        W: Write + Send + 'static,
    {
        let (sink, mut receiver) = Self::channel(capacity);
        let handle = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let line = match serde_json::to_string(&event) {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to serialize progress event");
                        continue;
                    }
                };
                if writeln!(writer, "{}", line).and_then(|_| writer.flush()).is_err() {
                    // 消费端已关闭
                    break;
                }
            }
        });
        (sink, handle)
    }
}

#[async_trait]
impl ProgressSink for QueuedProgress {
    async fn emit(&self, event: ProgressEvent) {
        if self.sender.send(event).await.is_err() {
            tracing::debug!("progress receiver dropped, event discarded");
        }
    }

    fn is_live(&self) -> bool {
        !self.sender.is_closed()
    }
}
