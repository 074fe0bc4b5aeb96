use crate::config::Config;
use crate::generator::context::ResearchContext;
use crate::generator::outlet;
use crate::generator::pipeline::Researcher;
use crate::generator::progress::{ProgressEvent, ProgressSink};
use crate::generator::types::{PipelineError, PipelineStage, ResearchOutcome, ResearchRequest};

use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 时间跟踪作用域
pub struct TimingScope {
    start_time: Instant,
    phase_start_times: HashMap<String, Instant>,
    /// 按结束顺序记录
    phase_durations: Vec<(String, Duration)>,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_start_times: HashMap::new(),
            phase_durations: Vec::new(),
        }
    }

    /// 开始一个新的阶段计时
    pub fn start_phase(&mut self, phase_name: &str) {
        self.phase_start_times
            .insert(phase_name.to_string(), Instant::now());
    }

    /// 结束一个阶段的计时
    pub fn end_phase(&mut self, phase_name: &str) -> Option<Duration> {
        let start_time = self.phase_start_times.remove(phase_name)?;
        let duration = start_time.elapsed();
        self.phase_durations
            .push((phase_name.to_string(), duration));
        Some(duration)
    }

    pub fn get_total_duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn get_phase_durations(&self) -> &[(String, Duration)] {
        &self.phase_durations
    }

    /// 获取格式化的执行时间报告
    pub fn generate_timing_report(&self) -> String {
        let mut report = format!(
            "⏱️ Total run time: {:.2}s",
            self.get_total_duration().as_secs_f64()
        );
        for (phase, duration) in &self.phase_durations {
            report.push_str(&format!("\n- {}: {:.3}s", phase, duration.as_secs_f64()));
        }
        report
    }
}

/// 时间跟踪常量
pub struct TimingKeys;

impl TimingKeys {
    pub const RESEARCH: &'static str = "research";
    pub const OUTPUT: &'static str = "output";
}

/// 一次工作流的产出
#[derive(Debug)]
pub struct WorkflowOutput {
    pub outcome: ResearchOutcome,
    pub report_path: PathBuf,
}

/// 启动研究工作流：按配置创建客户端，研究并保存报告
pub async fn launch(
    config: &Config,
    request: ResearchRequest,
    progress: Arc<dyn ProgressSink>,
) -> Result<WorkflowOutput> {
    let context = ResearchContext::new(config.clone(), progress)?;
    Ok(run_with_context(context, request).await?)
}

/// 在给定上下文中执行研究与输出
pub async fn run_with_context(
    context: ResearchContext,
    request: ResearchRequest,
) -> Result<WorkflowOutput, PipelineError> {
    let mut timing = TimingScope::new();
    let researcher = Researcher::new(context);
    let context = researcher.context();

    timing.start_phase(TimingKeys::RESEARCH);
    let outcome = researcher.run(request).await?;
    timing.end_phase(TimingKeys::RESEARCH);

    timing.start_phase(TimingKeys::OUTPUT);
    let report_path = outlet::save(context, &outcome)
        .await
        .map_err(|e| PipelineError::new(PipelineStage::Output, e))?;
    timing.end_phase(TimingKeys::OUTPUT);

    let progress = context.progress.as_ref();
    progress
        .emit(ProgressEvent::logs(timing.generate_timing_report()))
        .await;
    if context.cache.is_enabled() {
        progress
            .emit(ProgressEvent::logs(
                context.cache.generate_performance_report().summary(),
            ))
            .await;
    }

    Ok(WorkflowOutput {
        outcome,
        report_path,
    })
}
