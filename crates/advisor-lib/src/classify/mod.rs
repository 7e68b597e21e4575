//! Turns recommendations and cost estimates into user-facing issues
//!
//! Severity is a function of monthly savings alone, except that anomalies
//! are always low severity. Guidance comes from the [`NextStep`] rule table.

mod next_steps;

pub use next_steps::NextStep;

use std::sync::Arc;

use crate::config::PolicyConfig;
use crate::models::{
    CostEstimate, Issue, NodePool, Recommendation, Severity, UtilizationSample, VmTypeSuggestion,
};

/// Monthly savings at or above which an issue is high severity
pub const HIGH_SAVINGS_THRESHOLD: f64 = 10_000.0;

/// Monthly savings at or above which an issue is medium severity
pub const MEDIUM_SAVINGS_THRESHOLD: f64 = 2_000.0;

pub fn severity_for_savings(monthly_savings: f64) -> Severity {
    if monthly_savings >= HIGH_SAVINGS_THRESHOLD {
        Severity::High
    } else if monthly_savings >= MEDIUM_SAVINGS_THRESHOLD {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[derive(Debug, Clone)]
pub struct IssueClassifier {
    config: Arc<PolicyConfig>,
}

impl IssueClassifier {
    pub fn new(config: Arc<PolicyConfig>) -> Self {
        Self { config }
    }

    /// Classify one analyzed pool. `None` means nothing worth reporting.
    pub fn classify(
        &self,
        pool: &NodePool,
        sample: &UtilizationSample,
        recommendation: &Recommendation,
        cost: &CostEstimate,
        suggestion: Option<&VmTypeSuggestion>,
    ) -> Option<Issue> {
        let savings = cost.savings_monthly;
        let anomalous = recommendation.is_anomalous;

        if savings <= 0.0 && !anomalous && suggestion.is_none() {
            return None;
        }

        let mut steps = Vec::new();
        if anomalous {
            steps.push(NextStep::VerifyAnomaly);
        } else if savings > 0.0 {
            steps.push(NextStep::ReduceMin);
            if !pool.autoscaling_enabled {
                steps.push(NextStep::EnableAutoscaling);
            }
        }
        if suggestion.is_some() {
            steps.push(NextStep::ChangeVmType);
        }
        if recommendation.phased {
            steps.push(NextStep::PhaseLargeReduction);
        }

        let severity = if anomalous {
            Severity::Low
        } else {
            severity_for_savings(savings)
        };

        Some(Issue {
            pool_id: pool.id(),
            cluster_id: pool.cluster_id.clone(),
            subscription_id: pool.subscription_id.clone(),
            title: self.title(pool, recommendation, savings, suggestion),
            severity,
            details: self.details(pool, sample, recommendation, cost, suggestion),
            next_steps: NextStep::compose(&steps),
            monthly_savings: savings.max(0.0),
        })
    }

    /// Informational issue for a pool whose cluster reports no metrics
    pub fn metrics_unavailable(&self, pool: &NodePool, reason: &str) -> Issue {
        Issue {
            pool_id: pool.id(),
            cluster_id: pool.cluster_id.clone(),
            subscription_id: pool.subscription_id.clone(),
            title: format!(
                "No utilization metrics for node pool {} in {}",
                pool.name,
                pool.cluster_name()
            ),
            severity: Severity::Low,
            details: format!(
                "Current sizing: min {} / max {} x {}. Sizing could not be evaluated: {}.",
                pool.current_min, pool.current_max, pool.vm_sku, reason
            ),
            next_steps: NextStep::compose(&[NextStep::EnableMonitoring]),
            monthly_savings: 0.0,
        }
    }

    fn title(
        &self,
        pool: &NodePool,
        recommendation: &Recommendation,
        savings: f64,
        suggestion: Option<&VmTypeSuggestion>,
    ) -> String {
        let cluster = pool.cluster_name();
        if recommendation.is_anomalous {
            format!(
                "Metric anomaly in node pool {} in {}: verify before resizing",
                pool.name, cluster
            )
        } else if savings > 0.0 {
            format!(
                "Reduce node pool {} in {} from {} to {} minimum nodes",
                pool.name, cluster, pool.current_min, recommendation.recommended_min
            )
        } else if let Some(suggestion) = suggestion {
            format!(
                "Node pool {} in {} fits {} VMs better",
                pool.name, cluster, suggestion.family
            )
        } else {
            format!("Review sizing of node pool {} in {}", pool.name, cluster)
        }
    }

    fn details(
        &self,
        pool: &NodePool,
        sample: &UtilizationSample,
        recommendation: &Recommendation,
        cost: &CostEstimate,
        suggestion: Option<&VmTypeSuggestion>,
    ) -> String {
        let mut lines = vec![
            format!(
                "Pool: {} ({} pool, {}, autoscaling {})",
                pool.id(),
                pool.role,
                pool.vm_sku,
                if pool.autoscaling_enabled { "enabled" } else { "disabled" }
            ),
            format!(
                "Current sizing: min {} / max {}; recommended: min {} / max {}",
                pool.current_min,
                pool.current_max,
                recommendation.recommended_min,
                recommendation.recommended_max
            ),
            format!(
                "Utilization over {} days: CPU avg {:.1}% / peak {:.1}%, memory avg {:.1}% / peak {:.1}%",
                sample.window_days,
                sample.avg_cpu_pct,
                sample.peak_cpu_pct,
                sample.avg_mem_pct,
                sample.peak_mem_pct
            ),
        ];
        if sample.peak_cpu_pct < self.config.cpu_underutil_threshold
            && sample.peak_mem_pct < self.config.mem_underutil_threshold
        {
            lines.push(format!(
                "Underutilized: CPU and memory peaks stay below {:.0}% / {:.0}%",
                self.config.cpu_underutil_threshold, self.config.mem_underutil_threshold
            ));
        }
        lines.push(format!("Rationale: {}", recommendation.rationale));
        lines.push(format!(
            "Monthly cost: current {:.2}, recommended {:.2}, savings {:.2} ({:.2} per year)",
            cost.current_monthly, cost.recommended_monthly, cost.savings_monthly, cost.savings_annual
        ));
        if let Some(suggestion) = suggestion {
            lines.push(match &suggestion.suggested_sku {
                Some(sku) => format!(
                    "VM type: consider {} such as {}; {}",
                    suggestion.family, sku, suggestion.reason
                ),
                None => format!("VM type: consider {}; {}", suggestion.family, suggestion.reason),
            });
        }
        lines.join("\n")
    }
}
