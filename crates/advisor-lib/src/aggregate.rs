//! Roll-up of issues into run totals and a top-N list

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::cost::MONTHS_PER_YEAR;
use crate::models::{Issue, PoolId, Severity};

pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopIssue {
    pub pool_id: PoolId,
    pub title: String,
    pub severity: Severity,
    pub monthly_savings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_monthly: f64,
    pub total_annual: f64,
    pub issue_count: usize,
    pub by_severity: SeverityCounts,
    pub top: Vec<TopIssue>,
}

#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    top_n: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_N)
    }
}

impl Aggregator {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Fold issues into a summary. The result does not depend on input order.
    pub fn aggregate(&self, issues: &[Issue]) -> Summary {
        let mut ranked: Vec<&Issue> = issues.iter().collect();
        ranked.sort_by(|a, b| rank(a, b));

        let mut by_severity = SeverityCounts::default();
        let mut total_monthly = 0.0;
        for issue in &ranked {
            by_severity.record(issue.severity);
            total_monthly += issue.monthly_savings;
        }

        let top = ranked
            .iter()
            .take(self.top_n)
            .map(|issue| TopIssue {
                pool_id: issue.pool_id.clone(),
                title: issue.title.clone(),
                severity: issue.severity,
                monthly_savings: issue.monthly_savings,
            })
            .collect();

        Summary {
            total_monthly,
            total_annual: total_monthly * MONTHS_PER_YEAR,
            issue_count: issues.len(),
            by_severity,
            top,
        }
    }
}

/// Savings descending, then pool ID ascending, then severity
fn rank(a: &Issue, b: &Issue) -> Ordering {
    b.monthly_savings
        .total_cmp(&a.monthly_savings)
        .then_with(|| a.pool_id.cmp(&b.pool_id))
        .then_with(|| a.severity.cmp(&b.severity))
        .then_with(|| a.title.cmp(&b.title))
}
