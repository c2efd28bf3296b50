//! 投递指标收集模块
//!
//! 基于 DispatchOutcome 收集和统计投递流水线的运行指标。

use std::collections::BTreeMap;

use contracts::{DispatchOutcome, LatencySummary, OutcomeStatus};
use metrics::{counter, gauge, histogram};

/// 从 DispatchOutcome 记录指标
///
/// 每个 worker 完成一次投递尝试后调用。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_outcome;
///
/// let outcome = DispatchOutcome::sent(recipient, worker_id);
/// record_outcome(&outcome);
/// ```
pub fn record_outcome(outcome: &DispatchOutcome) {
    counter!(
        "mailcast_messages_total",
        "status" => outcome.status.as_str()
    )
    .increment(1);

    if let Some(error) = &outcome.error {
        record_delivery_failure(error.label());
    }

    record_send_latency_ms(outcome.elapsed_ms as f64);
}

/// 记录投递失败 (按失败类型)
pub fn record_delivery_failure(kind: &'static str) {
    counter!("mailcast_delivery_failures_total", "kind" => kind).increment(1);
}

/// 记录单次尝试耗时 (渲染 + 发送)
pub fn record_send_latency_ms(latency_ms: f64) {
    histogram!("mailcast_send_latency_ms").record(latency_ms);
}

/// 记录入队的收件人
pub fn record_recipient_enqueued() {
    counter!("mailcast_recipients_enqueued_total").increment(1);
}

/// 记录被跳过的格式错误行
pub fn record_malformed_record() {
    counter!("mailcast_records_malformed_total").increment(1);
}

/// 记录分发队列深度
pub fn record_queue_depth(depth: usize) {
    gauge!("mailcast_dispatch_queue_depth").set(depth as f64);
}

/// 记录活跃 worker 数
pub fn record_workers_active(active: usize) {
    gauge!("mailcast_workers_active").set(active as f64);
}

/// 投递指标聚合器
///
/// 在内存中聚合结果，便于在报告中输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DeliveryStatsAggregator {
    /// 成功数
    pub sent: u64,

    /// 失败数
    pub failed: u64,

    /// 各失败类型计数
    pub failures_by_kind: BTreeMap<&'static str, u64>,

    /// 各 worker 处理数
    pub per_worker: BTreeMap<usize, u64>,

    /// 尝试耗时统计 (毫秒)
    pub latency_stats: RunningStats,
}

impl DeliveryStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, outcome: &DispatchOutcome) {
        match outcome.status {
            OutcomeStatus::Sent => self.sent += 1,
            OutcomeStatus::Failed => self.failed += 1,
        }

        if let Some(error) = &outcome.error {
            *self.failures_by_kind.entry(error.label()).or_insert(0) += 1;
        }

        *self.per_worker.entry(outcome.worker_id).or_insert(0) += 1;
        self.latency_stats.push(outcome.elapsed_ms as f64);
    }

    /// 耗时摘要
    pub fn latency(&self) -> LatencySummary {
        LatencySummary::from(&self.latency_stats)
    }

    /// 生成摘要报告
    pub fn summary(&self) -> DeliverySummary {
        let attempts = self.sent + self.failed;
        DeliverySummary {
            attempts,
            sent: self.sent,
            failed: self.failed,
            failure_rate: if attempts > 0 {
                self.failed as f64 / attempts as f64 * 100.0
            } else {
                0.0
            },
            latency: self.latency(),
            failures_by_kind: self.failures_by_kind.clone(),
            per_worker: self.per_worker.clone(),
        }
    }
}

/// 投递摘要
#[derive(Debug, Clone, Default)]
pub struct DeliverySummary {
    pub attempts: u64,
    pub sent: u64,
    pub failed: u64,
    pub failure_rate: f64,
    pub latency: LatencySummary,
    pub failures_by_kind: BTreeMap<&'static str, u64>,
    pub per_worker: BTreeMap<usize, u64>,
}

impl std::fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Metrics Summary ===")?;
        writeln!(f, "Attempts: {}", self.attempts)?;
        writeln!(f, "Sent: {}", self.sent)?;
        writeln!(f, "Failed: {} ({:.2}%)", self.failed, self.failure_rate)?;
        writeln!(f, "Latency: {}", self.latency)?;

        if !self.failures_by_kind.is_empty() {
            writeln!(f, "Failures by kind:")?;
            for (kind, count) in &self.failures_by_kind {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }

        if !self.per_worker.is_empty() {
            writeln!(f, "Per worker:")?;
            for (worker, count) in &self.per_worker {
                writeln!(f, "  worker-{}: {}", worker, count)?;
            }
        }

        Ok(())
    }
}

impl From<&RunningStats> for LatencySummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min_ms: stats.min,
            max_ms: stats.max,
            mean_ms: stats.mean(),
            std_dev_ms: stats.std_dev(),
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
