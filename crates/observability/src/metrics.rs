//! Notifier 指标收集模块
//!
//! 基于 `metrics` facade 记录分发结果，并在内存中聚合后台任务结果。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use metrics::{counter, gauge, histogram};
use tracing::warn;

use contracts::{NotifyError, TaskOutcome, TaskStatus};
use notifier::{MetricsSnapshot, TaskSink};

/// `LatencyRecorder` 默认保留的样本数
pub const DEFAULT_LATENCY_SAMPLES: usize = 4096;

/// 记录一次 `notify` 调用的结果
pub fn record_notify(event_type: &'static str, result: &Result<(), NotifyError>) {
    let result = match result {
        Ok(()) => "ok",
        Err(NotifyError::HandlerNotFound { .. }) => "handler_not_found",
        Err(NotifyError::InvalidArgument { .. }) => "invalid_argument",
        Err(NotifyError::Resolution { .. }) => "resolution_failed",
        Err(NotifyError::Scheduler { .. }) => "scheduler_unavailable",
        Err(NotifyError::HandlersFailed(failures)) => {
            counter!("herald_handler_failures_total", "mode" => "sync")
                .increment(failures.len() as u64);
            "handlers_failed"
        }
    };
    counter!(
        "herald_notifications_total",
        "event_type" => event_type,
        "result" => result
    )
    .increment(1);
}

/// 记录 `notify` 调用耗时 (毫秒)
pub fn record_notify_latency_ms(event_type: &'static str, latency_ms: f64) {
    histogram!("herald_notify_latency_ms", "event_type" => event_type).record(latency_ms);
}

/// 记录后台任务结果
pub fn record_task_outcome(outcome: &TaskOutcome) {
    counter!(
        "herald_background_units_total",
        "event_type" => outcome.event_type,
        "status" => outcome.status_label()
    )
    .increment(1);

    if let Some(failure) = outcome.failure() {
        counter!("herald_handler_failures_total", "mode" => "async")
            .increment(failure.handler_failures().len() as u64);
        for handler_failure in failure.handler_failures() {
            counter!(
                "herald_handler_failures_by_handler_total",
                "handler" => handler_failure.handler_type()
            )
            .increment(1);
        }
    }
}

/// 将 `NotifierMetrics` 快照导出为 gauge
pub fn record_snapshot(snapshot: &MetricsSnapshot) {
    gauge!("herald_notifier_notifications").set(snapshot.notifications as f64);
    gauge!("herald_notifier_scheduled_units").set(snapshot.scheduled_units as f64);
    gauge!("herald_notifier_handler_invocations").set(snapshot.handler_invocations as f64);
    gauge!("herald_notifier_handler_failures").set(snapshot.handler_failures as f64);
    gauge!("herald_notifier_consumer_failures").set(snapshot.consumer_failures as f64);
    gauge!("herald_notifier_completed_units").set(snapshot.completed_units as f64);
    gauge!("herald_notifier_faulted_units").set(snapshot.faulted_units as f64);
    gauge!("herald_notifier_cancelled_units").set(snapshot.cancelled_units as f64);
    gauge!("herald_notifier_unobserved_failures").set(snapshot.unobserved_failures as f64);
}

/// Task sink 记录指标并输出故障日志
///
/// # Example
///
/// ```ignore
/// let options = AsyncOptions::builder()
///     .shared_task_sink(observability::metrics::metrics_task_sink())
///     .build()?;
/// ```
pub fn metrics_task_sink() -> TaskSink {
    Arc::new(|outcome: TaskOutcome| {
        record_task_outcome(&outcome);
        log_fault(&outcome);
    })
}

/// 同 `metrics_task_sink`，并把结果累加到 `aggregator`
pub fn aggregating_task_sink(aggregator: Arc<Mutex<OutcomeAggregator>>) -> TaskSink {
    Arc::new(move |outcome: TaskOutcome| {
        record_task_outcome(&outcome);
        log_fault(&outcome);
        match aggregator.lock() {
            Ok(mut aggregator) => aggregator.update(&outcome),
            Err(poisoned) => poisoned.into_inner().update(&outcome),
        }
    })
}

fn log_fault(outcome: &TaskOutcome) {
    if let TaskStatus::Faulted(failure) = &outcome.status {
        warn!(
            event = %outcome.event_name,
            event_type = outcome.event_type,
            error = %failure,
            "Background dispatch faulted"
        );
    }
}

/// 后台任务结果聚合器
///
/// 在内存中聚合结果，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct OutcomeAggregator {
    /// 任务总数
    pub total_units: u64,

    pub completed: u64,

    pub faulted: u64,

    pub cancelled: u64,

    /// 各事件类型的任务数
    pub units_by_event_type: HashMap<&'static str, u64>,

    /// 各处理器失败次数
    pub failures_by_handler: HashMap<&'static str, u64>,

    /// `notify` 调用耗时统计 (毫秒)
    pub latency_stats: LatencyRecorder,
}

impl OutcomeAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, outcome: &TaskOutcome) {
        self.total_units += 1;
        *self
            .units_by_event_type
            .entry(outcome.event_type)
            .or_insert(0) += 1;

        match &outcome.status {
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Cancelled => self.cancelled += 1,
            TaskStatus::Faulted(failure) => {
                self.faulted += 1;
                for handler_failure in failure.handler_failures() {
                    *self
                        .failures_by_handler
                        .entry(handler_failure.handler_type())
                        .or_insert(0) += 1;
                }
            }
        }
    }

    /// 记录一次 `notify` 耗时
    pub fn record_latency_ms(&mut self, latency_ms: f64) {
        self.latency_stats.record(latency_ms);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary {
            total_units: self.total_units,
            completed: self.completed,
            faulted: self.faulted,
            cancelled: self.cancelled,
            fault_rate: if self.total_units > 0 {
                self.faulted as f64 / self.total_units as f64 * 100.0
            } else {
                0.0
            },
            notify_latency_ms: self.latency_stats.summary(),
            failures_by_handler: self.failures_by_handler.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 结果摘要
#[derive(Debug, Clone, Default)]
pub struct OutcomeSummary {
    pub total_units: u64,
    pub completed: u64,
    pub faulted: u64,
    pub cancelled: u64,
    pub fault_rate: f64,
    pub notify_latency_ms: LatencySummary,
    pub failures_by_handler: HashMap<&'static str, u64>,
}

impl std::fmt::Display for OutcomeSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Outcome Summary ===")?;
        writeln!(f, "Background units: {}", self.total_units)?;
        writeln!(f, "Completed: {}", self.completed)?;
        writeln!(f, "Faulted: {} ({:.2}%)", self.faulted, self.fault_rate)?;
        writeln!(f, "Cancelled: {}", self.cancelled)?;
        writeln!(f, "Notify latency (ms): {}", self.notify_latency_ms)?;

        if !self.failures_by_handler.is_empty() {
            writeln!(f, "Failures by handler:")?;
            let mut handlers: Vec<_> = self.failures_by_handler.iter().collect();
            handlers.sort();
            for (handler, count) in handlers {
                writeln!(f, "  {}: {}", handler, count)?;
            }
        }

        Ok(())
    }
}

/// 延迟分布摘要 (毫秒)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p99: f64,
}

impl std::fmt::Display for LatencySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.3}, p50={:.3}, p99={:.3}, max={:.3}, mean={:.3} (n={})",
            self.min, self.p50, self.p99, self.max, self.mean, self.count
        )
    }
}

/// 延迟样本记录器
///
/// 保留最近 `capacity` 个样本用于分位数计算；最值与均值覆盖全部样本。
#[derive(Debug, Clone)]
pub struct LatencyRecorder {
    samples: VecDeque<f64>,
    capacity: usize,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Default for LatencyRecorder {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LATENCY_SAMPLES)
    }
}

impl LatencyRecorder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(DEFAULT_LATENCY_SAMPLES)),
            capacity: capacity.max(1),
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// 记录一个样本 (非有限值被忽略)
    pub fn record(&mut self, latency_ms: f64) {
        if !latency_ms.is_finite() {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);
        self.count += 1;
        self.sum += latency_ms;
        self.min = self.min.min(latency_ms);
        self.max = self.max.max(latency_ms);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn summary(&self) -> LatencySummary {
        if self.count == 0 {
            return LatencySummary::default();
        }

        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);

        LatencySummary {
            count: self.count,
            min: self.min,
            max: self.max,
            mean: self.sum / self.count as f64,
            p50: percentile(&sorted, 0.50),
            p99: percentile(&sorted, 0.99),
        }
    }
}

/// 最近秩分位数; `sorted` 非空且已排序
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
