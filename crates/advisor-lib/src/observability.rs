//! Observability for analysis runs
//!
//! Provides:
//! - Prometheus metrics (pools analyzed, issues by severity, errors by kind,
//!   retries, planner and gateway latency, potential savings)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec, Encoder,
    Gauge, Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::error::{AnalysisError, ErrorKind};
use crate::models::{PoolId, Recommendation, Severity};

/// Planner latency buckets (in seconds)
const PLAN_LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1,
];

/// Gateway latency buckets (in seconds)
const GATEWAY_LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    pools_analyzed: IntCounter,
    issues_total: IntCounterVec,
    errors_total: IntCounterVec,
    retries_total: IntCounter,
    anomalies_total: IntCounter,
    plan_latency_seconds: Histogram,
    gateway_latency_seconds: Histogram,
    potential_monthly_savings: Gauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            pools_analyzed: register_int_counter!(
                "pool_advisor_pools_analyzed_total",
                "Total number of node pools analyzed"
            )
            .expect("Failed to register pools_analyzed"),

            issues_total: register_int_counter_vec!(
                "pool_advisor_issues_total",
                "Total number of issues raised, by severity",
                &["severity"]
            )
            .expect("Failed to register issues_total"),

            errors_total: register_int_counter_vec!(
                "pool_advisor_errors_total",
                "Total number of per-pool errors, by kind",
                &["kind"]
            )
            .expect("Failed to register errors_total"),

            retries_total: register_int_counter!(
                "pool_advisor_retries_total",
                "Total number of retried upstream calls"
            )
            .expect("Failed to register retries_total"),

            anomalies_total: register_int_counter!(
                "pool_advisor_anomalies_total",
                "Total number of anomalous utilization samples"
            )
            .expect("Failed to register anomalies_total"),

            plan_latency_seconds: register_histogram!(
                "pool_advisor_plan_latency_seconds",
                "Time spent planning, estimating and classifying one pool",
                PLAN_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register plan_latency_seconds"),

            gateway_latency_seconds: register_histogram!(
                "pool_advisor_gateway_latency_seconds",
                "Time spent fetching utilization for one pool, retries included",
                GATEWAY_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register gateway_latency_seconds"),

            potential_monthly_savings: register_gauge!(
                "pool_advisor_potential_monthly_savings",
                "Total potential monthly savings of the last run"
            )
            .expect("Failed to register potential_monthly_savings"),
        }
    }
}

/// Handle to the process-wide engine metrics
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle (registers the collectors on first use)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new)
    }

    /// Increment the analyzed pools counter
    pub fn inc_pools_analyzed(&self) {
        self.inner().pools_analyzed.inc();
    }

    /// Increment the issues counter for a severity
    pub fn inc_issue(&self, severity: Severity) {
        self.inner()
            .issues_total
            .with_label_values(&[severity.label()])
            .inc();
    }

    /// Increment the per-pool errors counter for an error kind
    pub fn inc_error(&self, kind: ErrorKind) {
        self.inner().errors_total.with_label_values(&[kind.as_str()]).inc();
    }

    /// Increment the upstream retries counter
    pub fn inc_retries(&self) {
        self.inner().retries_total.inc();
    }

    /// Increment the metric anomalies counter
    pub fn inc_anomalies(&self) {
        self.inner().anomalies_total.inc();
    }

    /// Record a plan/advise/estimate/classify latency observation
    pub fn observe_plan_latency(&self, duration_secs: f64) {
        self.inner().plan_latency_seconds.observe(duration_secs);
    }

    /// Record a metrics gateway latency observation
    pub fn observe_gateway_latency(&self, duration_secs: f64) {
        self.inner().gateway_latency_seconds.observe(duration_secs);
    }

    /// Update the potential monthly savings gauge
    pub fn set_potential_monthly_savings(&self, amount: f64) {
        self.inner().potential_monthly_savings.set(amount);
    }

    /// Current value of the analyzed pools counter
    pub fn pools_analyzed(&self) -> u64 {
        self.inner().pools_analyzed.get()
    }

    /// Current value of the upstream retries counter
    pub fn retries(&self) -> u64 {
        self.inner().retries_total.get()
    }

    /// Prometheus text exposition of every registered metric
    pub fn render_text(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Dump the text exposition to a file (node-exporter textfile style)
    pub async fn write_textfile(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, self.render_text()).await
    }
}

/// Structured logger for analysis events
///
/// Every event carries `event` and `run_id` fields.
#[derive(Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    /// Create a logger that tags every event with `run_id`
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Log the start of an analysis run
    pub fn log_run_started(&self, pools: usize, subscriptions: usize, concurrency: usize) {
        info!(
            event = "run_started",
            run_id = %self.run_id,
            pools = pools,
            subscriptions = subscriptions,
            concurrency = concurrency,
            "Node pool analysis started"
        );
    }

    /// Log a sizing recommendation with its savings
    pub fn log_recommendation(&self, recommendation: &Recommendation, current_min: u32, savings_monthly: f64) {
        info!(
            event = "recommendation_generated",
            run_id = %self.run_id,
            pool_id = %recommendation.pool_id,
            current_min = current_min,
            recommended_min = recommendation.recommended_min,
            recommended_max = recommendation.recommended_max,
            phased = recommendation.phased,
            savings_monthly = savings_monthly,
            "Generated sizing recommendation"
        );
    }

    /// Log a metric anomaly (near-zero average with an elevated peak)
    pub fn log_anomaly(&self, pool_id: &PoolId, avg_cpu_pct: f64, peak_cpu_pct: f64) {
        warn!(
            event = "anomaly_detected",
            run_id = %self.run_id,
            pool_id = %pool_id,
            avg_cpu_pct = avg_cpu_pct,
            peak_cpu_pct = peak_cpu_pct,
            "Near-zero average CPU with elevated peak, keeping current sizing"
        );
    }

    /// Log a pool that produced a script error instead of a result
    pub fn log_pool_skipped(&self, pool_id: Option<&PoolId>, error: &AnalysisError) {
        let pool = pool_id.map(PoolId::as_str).unwrap_or("-");
        match error {
            AnalysisError::MetricsUnavailable { .. } => {
                info!(
                    event = "pool_skipped",
                    run_id = %self.run_id,
                    pool_id = %pool,
                    kind = %error.kind(),
                    error = %error,
                    "Metrics unavailable for pool"
                );
            }
            _ => {
                warn!(
                    event = "pool_skipped",
                    run_id = %self.run_id,
                    pool_id = %pool,
                    kind = %error.kind(),
                    error = %error,
                    "Pool could not be analyzed"
                );
            }
        }
    }

    /// Log a subscription whose deadline expired with pools unfinished
    pub fn log_deadline_exceeded(&self, subscription_id: &str, unfinished: usize, deadline_secs: u64) {
        warn!(
            event = "deadline_exceeded",
            run_id = %self.run_id,
            subscription_id = %subscription_id,
            unfinished = unfinished,
            deadline_secs = deadline_secs,
            "Subscription deadline exceeded, aborting remaining workers"
        );
    }

    /// Log the end of an analysis run
    pub fn log_run_finished(&self, analyzed: usize, issues: usize, errors: usize, total_monthly: f64) {
        info!(
            event = "run_finished",
            run_id = %self.run_id,
            pools_analyzed = analyzed,
            issues = issues,
            script_errors = errors,
            total_monthly_savings = total_monthly,
            "Node pool analysis finished"
        );
    }
}
