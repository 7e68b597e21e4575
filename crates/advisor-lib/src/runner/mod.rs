//! Analysis runner
//!
//! Fans pools out to a bounded set of workers per subscription, enforces a
//! wall-clock deadline per subscription, isolates per-pool failures as
//! [`ScriptError`]s, and folds everything into a [`RunReport`] once all
//! workers have been joined.

use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::aggregate::{Aggregator, DEFAULT_TOP_N};
use crate::classify::IssueClassifier;
use crate::config::{ConfigError, PolicyConfig};
use crate::cost::CostEstimator;
use crate::error::{AnalysisError, ScriptError};
use crate::gateway::MetricsGateway;
use crate::models::{Issue, NodePool, PoolId, UtilizationSample};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::planner::{CapacityPlanner, VmTypeAdvisor};
use crate::pricing::PricingCatalog;
use crate::report::RunReport;
use crate::retry::RetryPolicy;


/// Run-level settings
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Utilization window requested from the gateway
    pub lookback_days: u32,
    /// Maximum pools analyzed at once within a subscription
    pub concurrency: usize,
    /// Wall-clock budget for each subscription
    pub deadline: Duration,
    pub top_n: usize,
    pub retry: RetryPolicy,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            concurrency: 5,
            deadline: Duration::from_secs(300),
            top_n: DEFAULT_TOP_N,
            retry: RetryPolicy::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookback_days == 0 {
            return Err(ConfigError::Validation(
                "lookback_days must be greater than 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Validation(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        if self.deadline.is_zero() {
            return Err(ConfigError::Validation(
                "timeout must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry attempts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-pool analysis: fetch, plan, advise, estimate, classify
#[derive(Clone)]
pub struct PoolPipeline {
    planner: CapacityPlanner,
    advisor: VmTypeAdvisor,
    estimator: CostEstimator,
    classifier: IssueClassifier,
    logger: StructuredLogger,
    metrics: EngineMetrics,
}

impl PoolPipeline {
    pub fn new(policy: Arc<PolicyConfig>, catalog: Arc<PricingCatalog>, logger: StructuredLogger) -> Self {
        Self {
            advisor: VmTypeAdvisor::from_policy(&policy),
            estimator: CostEstimator::new(catalog, &policy),
            planner: CapacityPlanner::new(policy.clone()),
            classifier: IssueClassifier::new(policy),
            logger,
            metrics: EngineMetrics::new(),
        }
    }

    /// Everything after the fetch. Pure apart from logging and metrics.
    pub fn evaluate(&self, pool: &NodePool, sample: &UtilizationSample) -> Result<Option<Issue>, AnalysisError> {
        let start = Instant::now();
        sample.validate()?;

        let recommendation = self.planner.plan(pool, sample);
        let suggestion = if recommendation.is_anomalous {
            self.logger
                .log_anomaly(&recommendation.pool_id, sample.avg_cpu_pct, sample.peak_cpu_pct);
            self.metrics.inc_anomalies();
            None
        } else {
            self.advisor.advise(pool, sample)
        };

        let cost = self.estimator.estimate(pool, &recommendation)?;
        self.logger
            .log_recommendation(&recommendation, pool.current_min, cost.savings_monthly);

        let issue = self
            .classifier
            .classify(pool, sample, &recommendation, &cost, suggestion.as_ref());
        self.metrics
            .observe_plan_latency(start.elapsed().as_secs_f64());
        Ok(issue)
    }

    /// Fetch utilization with retries, then evaluate. A pool without metrics
    /// yields an informational issue rather than an error.
    pub async fn analyze(
        &self,
        gateway: &dyn MetricsGateway,
        retry: &RetryPolicy,
        pool: &NodePool,
        window_days: u32,
    ) -> Result<Option<Issue>, AnalysisError> {
        let pool_id = pool.id();
        let fetched = retry
            .run("utilization", || gateway.utilization(&pool_id, window_days))
            .await;

        match fetched {
            Ok(sample) => self.evaluate(pool, &sample),
            Err(AnalysisError::MetricsUnavailable { reason, .. }) => {
                debug!(pool_id = %pool_id, reason = %reason, "No metrics, raising informational issue");
                Ok(Some(self.classifier.metrics_unavailable(pool, &reason)))
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Default)]
struct Outcomes {
    issues: Vec<Issue>,
    script_errors: Vec<ScriptError>,
    analyzed: usize,
}

/// Runs a full analysis over an inventory
pub struct Analyzer {
    gateway: Arc<dyn MetricsGateway>,
    catalog: Arc<PricingCatalog>,
    config: AnalyzerConfig,
    logger: StructuredLogger,
    pipeline: PoolPipeline,
    metrics: EngineMetrics,
}

impl Analyzer {
    pub fn new(
        gateway: Arc<dyn MetricsGateway>,
        catalog: Arc<PricingCatalog>,
        policy: Arc<PolicyConfig>,
        config: AnalyzerConfig,
    ) -> Self {
        let run_id = format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ"));
        Self::with_run_id(gateway, catalog, policy, config, run_id)
    }

    pub fn with_run_id(
        gateway: Arc<dyn MetricsGateway>,
        catalog: Arc<PricingCatalog>,
        policy: Arc<PolicyConfig>,
        config: AnalyzerConfig,
        run_id: impl Into<String>,
    ) -> Self {
        let logger = StructuredLogger::new(run_id);
        Self {
            pipeline: PoolPipeline::new(policy, catalog.clone(), logger.clone()),
            gateway,
            catalog,
            config,
            logger,
            metrics: EngineMetrics::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        self.logger.run_id()
    }

    pub async fn run(&self, pools: Vec<NodePool>) -> RunReport {
        let pools_total = pools.len();
        let mut outcomes = Outcomes::default();

        let mut by_subscription: BTreeMap<String, Vec<NodePool>> = BTreeMap::new();
        for pool in pools {
            match pool.validate() {
                Ok(()) => by_subscription
                    .entry(pool.subscription_id.clone())
                    .or_default()
                    .push(pool),
                Err(e) => self.record_error(&mut outcomes, pool.id(), &e),
            }
        }

        self.logger
            .log_run_started(pools_total, by_subscription.len(), self.config.concurrency);

        for (subscription_id, pools) in by_subscription {
            self.run_subscription(&subscription_id, pools, &mut outcomes)
                .await;
        }

        outcomes.issues.sort_by(|a, b| a.pool_id.cmp(&b.pool_id));
        outcomes
            .script_errors
            .sort_by(|a, b| a.pool_id.cmp(&b.pool_id).then_with(|| a.kind.cmp(&b.kind)));

        let summary = Aggregator::new(self.config.top_n).aggregate(&outcomes.issues);
        self.metrics
            .set_potential_monthly_savings(summary.total_monthly);
        self.logger.log_run_finished(
            outcomes.analyzed,
            outcomes.issues.len(),
            outcomes.script_errors.len(),
            summary.total_monthly,
        );

        RunReport {
            run_id: self.run_id().to_string(),
            generated_at: Utc::now(),
            region: self.catalog.region().to_string(),
            lookback_days: self.config.lookback_days,
            pools_total,
            pools_analyzed: outcomes.analyzed,
            issues: outcomes.issues,
            script_errors: outcomes.script_errors,
            summary,
        }
    }

    async fn run_subscription(&self, subscription_id: &str, pools: Vec<NodePool>, outcomes: &mut Outcomes) {
        let deadline = tokio::time::Instant::now() + self.config.deadline;
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut pending: BTreeSet<PoolId> = BTreeSet::new();
        let mut workers = JoinSet::new();

        for pool in pools {
            pending.insert(pool.id());

            let semaphore = semaphore.clone();
            let gateway = self.gateway.clone();
            let pipeline = self.pipeline.clone();
            let retry = self.config.retry.clone();
            let window_days = self.config.lookback_days;

            workers.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        pipeline
                            .analyze(gateway.as_ref(), &retry, &pool, window_days)
                            .await
                    }
                    Err(_) => Err(AnalysisError::WorkerFailed(
                        "worker pool closed before the pool was scheduled".to_string(),
                    )),
                };
                (pool.id(), result)
            });
        }

        let mut timed_out = false;
        loop {
            match tokio::time::timeout_at(deadline, workers.join_next()).await {
                Ok(Some(Ok((pool_id, result)))) => {
                    pending.remove(&pool_id);
                    match result {
                        Ok(issue) => {
                            outcomes.analyzed += 1;
                            self.metrics.inc_pools_analyzed();
                            if let Some(issue) = issue {
                                self.metrics.inc_issue(issue.severity);
                                outcomes.issues.push(issue);
                            }
                        }
                        Err(e) => self.record_error(outcomes, pool_id, &e),
                    }
                }
                Ok(Some(Err(join_error))) => {
                    warn!(
                        subscription_id = %subscription_id,
                        error = %join_error,
                        "Pool worker did not complete"
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    self.logger.log_deadline_exceeded(
                        subscription_id,
                        pending.len(),
                        self.config.deadline.as_secs(),
                    );
                    workers.shutdown().await;
                    break;
                }
            }
        }

        for pool_id in pending {
            let error = if timed_out {
                AnalysisError::Timeout(self.config.deadline.as_secs())
            } else {
                AnalysisError::WorkerFailed("worker panicked before reporting a result".to_string())
            };
            self.record_error(outcomes, pool_id, &error);
        }
    }

    fn record_error(&self, outcomes: &mut Outcomes, pool_id: PoolId, error: &AnalysisError) {
        self.logger.log_pool_skipped(Some(&pool_id), error);
        self.metrics.inc_error(error.kind());
        outcomes.script_errors.push(ScriptError::for_pool(pool_id, error));
    }
}
