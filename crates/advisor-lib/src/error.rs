//! Per-pool analysis errors
//!
//! Every variant is recoverable: a failing pool is isolated and recorded,
//! the rest of the run continues. Fatal setup problems live in
//! [`crate::config::ConfigError`] instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::models::PoolId;
use crate::retry::Retryable;

#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    #[error("metrics unavailable for {pool_id}: {reason}")]
    MetricsUnavailable { pool_id: PoolId, reason: String },

    #[error("no pricing entry for VM SKU {vm_sku}")]
    PricingLookup { vm_sku: String },

    #[error("upstream throttled the request: {0}")]
    Throttled(String),

    #[error("transient upstream failure: {0}")]
    Transient(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("analysis deadline of {0}s exceeded before the pool finished")]
    Timeout(u64),

    #[error("worker failed: {0}")]
    WorkerFailed(String),
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::MetricsUnavailable { .. } => ErrorKind::MetricsUnavailable,
            AnalysisError::PricingLookup { .. } => ErrorKind::PricingLookup,
            AnalysisError::Throttled(_) => ErrorKind::Throttled,
            AnalysisError::Transient(_) => ErrorKind::Transient,
            AnalysisError::InvalidInput(_) => ErrorKind::InvalidInput,
            AnalysisError::Timeout(_) => ErrorKind::Timeout,
            AnalysisError::WorkerFailed(_) => ErrorKind::WorkerFailed,
        }
    }
}

impl Retryable for AnalysisError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::Throttled(_) | AnalysisError::Transient(_)
        )
    }
}

/// Error classification used in reports and metric labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MetricsUnavailable,
    PricingLookup,
    Throttled,
    Transient,
    InvalidInput,
    Timeout,
    WorkerFailed,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MetricsUnavailable => "metrics_unavailable",
            ErrorKind::PricingLookup => "pricing_lookup",
            ErrorKind::Throttled => "throttled",
            ErrorKind::Transient => "transient",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Timeout => "timeout",
            ErrorKind::WorkerFailed => "worker_failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pool that could not be analyzed, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<PoolId>,
    pub kind: ErrorKind,
    pub message: String,
}

impl ScriptError {
    pub fn for_pool(pool_id: PoolId, error: &AnalysisError) -> Self {
        Self {
            pool_id: Some(pool_id),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_upstream_failures_are_retryable() {
        assert!(AnalysisError::Throttled("429".into()).is_retryable());
        assert!(AnalysisError::Transient("reset".into()).is_retryable());
        assert!(!AnalysisError::PricingLookup {
            vm_sku: "Standard_X".into()
        }
        .is_retryable());
        assert!(!AnalysisError::MetricsUnavailable {
            pool_id: PoolId::from("aks/user1"),
            reason: "monitoring disabled".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_script_error_carries_kind_and_message() {
        let error = AnalysisError::PricingLookup {
            vm_sku: "Standard_Z9".into(),
        };
        let record = ScriptError::for_pool(PoolId::from("aks/gpu"), &error);
        assert_eq!(record.kind, ErrorKind::PricingLookup);
        assert!(record.message.contains("Standard_Z9"));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "pricing_lookup");
        assert_eq!(json["pool_id"], "aks/gpu");
    }
}
