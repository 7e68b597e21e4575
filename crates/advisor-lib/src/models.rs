//! Core data models for the node pool advisor

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AnalysisError;

/// Role of a node pool inside its cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolRole {
    System,
    User,
}

impl fmt::Display for PoolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolRole::System => write!(f, "system"),
            PoolRole::User => write!(f, "user"),
        }
    }
}

/// Node pool identity, rendered as `{cluster_id}/{pool_name}`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(String);

impl PoolId {
    pub fn new(cluster_id: &str, pool_name: &str) -> Self {
        Self(format!("{}/{}", cluster_id, pool_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into (cluster_id, pool_name). Cluster IDs may contain slashes,
    /// pool names never do.
    pub fn parts(&self) -> (&str, &str) {
        self.0.rsplit_once('/').unwrap_or(("", self.0.as_str()))
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PoolId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PoolId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

fn default_autoscaling() -> bool {
    true
}

/// Snapshot of a node pool's configuration for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePool {
    pub name: String,
    pub cluster_id: String,
    pub subscription_id: String,
    pub role: PoolRole,
    pub vm_sku: String,
    pub current_min: u32,
    pub current_max: u32,
    #[serde(default = "default_autoscaling")]
    pub autoscaling_enabled: bool,
}

impl NodePool {
    pub fn id(&self) -> PoolId {
        PoolId::new(&self.cluster_id, &self.name)
    }

    /// Short cluster name (last segment of a resource ID)
    pub fn cluster_name(&self) -> &str {
        self.cluster_id
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.cluster_id)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.name.trim().is_empty() || self.name.contains('/') {
            return Err(AnalysisError::InvalidInput(format!(
                "pool name {:?} must be non-empty and must not contain '/'",
                self.name
            )));
        }
        if self.cluster_id.trim().is_empty() {
            return Err(AnalysisError::InvalidInput(format!(
                "pool {} has an empty cluster_id",
                self.name
            )));
        }
        if self.current_min > self.current_max {
            return Err(AnalysisError::InvalidInput(format!(
                "pool {} has current_min {} greater than current_max {}",
                self.id(),
                self.current_min,
                self.current_max
            )));
        }
        Ok(())
    }
}

/// Average and peak utilization of one pool over a lookback window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationSample {
    pub pool_id: PoolId,
    pub window_days: u32,
    pub avg_cpu_pct: f64,
    pub peak_cpu_pct: f64,
    pub avg_mem_pct: f64,
    pub peak_mem_pct: f64,
}

impl UtilizationSample {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.window_days == 0 {
            return Err(AnalysisError::InvalidInput(format!(
                "sample for {} has a zero-day window",
                self.pool_id
            )));
        }
        let readings = [
            ("avg_cpu_pct", self.avg_cpu_pct),
            ("peak_cpu_pct", self.peak_cpu_pct),
            ("avg_mem_pct", self.avg_mem_pct),
            ("peak_mem_pct", self.peak_mem_pct),
        ];
        for (name, value) in readings {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(AnalysisError::InvalidInput(format!(
                    "sample for {} has {} = {} outside [0, 100]",
                    self.pool_id, name, value
                )));
            }
        }
        Ok(())
    }
}

/// Sizing recommendation for a node pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub pool_id: PoolId,
    pub recommended_min: u32,
    pub recommended_max: u32,
    /// Metrics contradict each other; sizing is left unchanged
    pub is_anomalous: bool,
    /// The accepted reduction is large enough to roll out in steps
    pub phased: bool,
    pub rationale: String,
}

/// Monthly and annual cost of current vs recommended sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub pool_id: PoolId,
    pub current_monthly: f64,
    pub recommended_monthly: f64,
    pub savings_monthly: f64,
    pub savings_annual: f64,
}

/// Issue severity. Serialized as its numeric level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Severity {
    High = 2,
    Medium = 3,
    Low = 4,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.level()
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            2 => Ok(Severity::High),
            3 => Ok(Severity::Medium),
            4 => Ok(Severity::Low),
            other => Err(format!("unsupported severity level {}", other)),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.level(), self.label())
    }
}

/// A classified, user-facing finding for one node pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub pool_id: PoolId,
    pub cluster_id: String,
    pub subscription_id: String,
    pub title: String,
    pub severity: Severity,
    pub details: String,
    pub next_steps: String,
    pub monthly_savings: f64,
}

/// Hourly list price of a VM SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingEntry {
    pub vm_sku: String,
    pub hourly_list_price: f64,
}

/// VM family that better matches a pool's workload shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmFamily {
    MemoryOptimized,
    ComputeOptimized,
}

impl fmt::Display for VmFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmFamily::MemoryOptimized => write!(f, "memory-optimized (E-series)"),
            VmFamily::ComputeOptimized => write!(f, "compute-optimized (F-series)"),
        }
    }
}

/// Advisory VM type change; never alters the numeric recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmTypeSuggestion {
    pub family: VmFamily,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_sku: Option<String>,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> NodePool {
        NodePool {
            name: "user1".to_string(),
            cluster_id: "/subscriptions/s1/resourceGroups/rg/providers/Microsoft.ContainerService/managedClusters/aks-prod".to_string(),
            subscription_id: "s1".to_string(),
            role: PoolRole::User,
            vm_sku: "Standard_D4s_v3".to_string(),
            current_min: 3,
            current_max: 10,
            autoscaling_enabled: true,
        }
    }

    #[test]
    fn test_pool_id_parts_with_resource_id() {
        let pool = pool();
        let id = pool.id();
        let (cluster, name) = id.parts();
        assert_eq!(cluster, pool.cluster_id);
        assert_eq!(name, "user1");
        assert_eq!(pool.cluster_name(), "aks-prod");
    }

    #[test]
    fn test_pool_validation_rejects_inverted_bounds() {
        let mut pool = pool();
        pool.current_min = 11;
        assert!(matches!(
            pool.validate(),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sample_validation_rejects_out_of_range() {
        let sample = UtilizationSample {
            pool_id: PoolId::from("aks/user1"),
            window_days: 30,
            avg_cpu_pct: 20.0,
            peak_cpu_pct: 120.0,
            avg_mem_pct: 10.0,
            peak_mem_pct: 15.0,
        };
        assert!(sample.validate().is_err());

        let zero_window = UtilizationSample {
            window_days: 0,
            peak_cpu_pct: 40.0,
            ..sample
        };
        assert!(zero_window.validate().is_err());
    }

    #[test]
    fn test_severity_serializes_as_number() {
        let json = serde_json::to_string(&Severity::Medium).unwrap();
        assert_eq!(json, "3");
        let parsed: Severity = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, Severity::High);
        assert!(serde_json::from_str::<Severity>("1").is_err());
    }

    #[test]
    fn test_autoscaling_defaults_to_enabled() {
        let json = r#"{
            "name": "sys",
            "cluster_id": "aks-dev",
            "subscription_id": "s1",
            "role": "system",
            "vm_sku": "Standard_D2s_v3",
            "current_min": 3,
            "current_max": 3
        }"#;
        let pool: NodePool = serde_json::from_str(json).unwrap();
        assert!(pool.autoscaling_enabled);
        assert_eq!(pool.role, PoolRole::System);
    }
}
