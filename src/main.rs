use anyhow::{Result, anyhow};
use clap::Parser;
use idea_researcher::cli::Args;
use idea_researcher::generator::progress::{ConsoleProgress, ProgressSink, QueuedProgress};
use idea_researcher::launch;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// 进度事件队列容量
const EVENT_QUEUE_CAPACITY: usize = 256;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("idea_researcher={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let json_events = args.json_events;
    let (config, request) = args.into_config()?;
    init_tracing(config.verbose);

    // 终端中流式输出报告，重定向时等报告完成后一次性输出
    let stream_to_console = std::io::stdout().is_terminal();
    let (progress, forwarder): (Arc<dyn ProgressSink>, _) = if json_events {
        let (sink, handle) = QueuedProgress::spawn_json_lines(EVENT_QUEUE_CAPACITY, std::io::stdout());
        (Arc::new(sink), Some(handle))
    } else {
        (Arc::new(ConsoleProgress::new(stream_to_console)), None)
    };

    let result = tokio::select! {
        result = launch(&config, request, progress.clone()) => result,
        _ = tokio::signal::ctrl_c() => Err(anyhow!("research cancelled")),
    };

    // 所有发送端释放后转发任务才会退出
    drop(progress);
    if let Some(handle) = forwarder {
        let _ = handle.await;
    }

    let output = result?;
    if !json_events && !stream_to_console {
        println!("{}", output.outcome.report);
    }
    Ok(())
}
