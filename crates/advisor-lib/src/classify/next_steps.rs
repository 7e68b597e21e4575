use serde::{Deserialize, Serialize};
use std::fmt;

/// Condition tags that select canned remediation guidance.
///
/// Declaration order is the order guidance appears in an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    ReduceMin,
    EnableAutoscaling,
    ChangeVmType,
    VerifyAnomaly,
    PhaseLargeReduction,
    EnableMonitoring,
}

impl NextStep {
    pub const ALL: [NextStep; 6] = [
        NextStep::ReduceMin,
        NextStep::EnableAutoscaling,
        NextStep::ChangeVmType,
        NextStep::VerifyAnomaly,
        NextStep::PhaseLargeReduction,
        NextStep::EnableMonitoring,
    ];

    pub fn guidance(self) -> &'static str {
        match self {
            NextStep::ReduceMin => {
                "Lower the node pool minimum to the recommended count and watch pending pods and \
                 node pressure for a full business cycle."
            }
            NextStep::EnableAutoscaling => {
                "Enable the cluster autoscaler on this static pool with the recommended min/max \
                 so capacity follows demand."
            }
            NextStep::ChangeVmType => {
                "Evaluate moving workloads to a node pool with the suggested VM family; create the \
                 new pool first, cordon and drain the old one, then remove it."
            }
            NextStep::VerifyAnomaly => {
                "Verify metric pipeline: near-zero average CPU with an elevated peak usually points \
                 to missing or misreported samples. Keep current sizing until the data is confirmed."
            }
            NextStep::PhaseLargeReduction => {
                "Roll out the reduction in phases (for example half now, half after a week of \
                 stable operation) rather than in one change."
            }
            NextStep::EnableMonitoring => {
                "Enable Container Insights or another metrics source for this cluster so the pool \
                 can be sized from observed utilization."
            }
        }
    }

    /// Order by rule table position, drop duplicates, and join the guidance
    pub fn compose(steps: &[NextStep]) -> String {
        let mut ordered = steps.to_vec();
        ordered.sort();
        ordered.dedup();
        ordered
            .iter()
            .map(|step| step.guidance())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for NextStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NextStep::ReduceMin => "reduce-min",
            NextStep::EnableAutoscaling => "enable-autoscaling",
            NextStep::ChangeVmType => "change-vm-type",
            NextStep::VerifyAnomaly => "verify-anomaly",
            NextStep::PhaseLargeReduction => "phase-large-reduction",
            NextStep::EnableMonitoring => "enable-monitoring",
        };
        f.write_str(name)
    }
}
