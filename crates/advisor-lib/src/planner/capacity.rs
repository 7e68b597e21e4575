//! Two-tier node pool sizing
//!
//! The minimum is sized from average CPU with the minimum safety margin, the
//! maximum from peak CPU with the maximum safety margin. The minimum is then
//! held above the role floor and above the per-run reduction cap; the maximum
//! is never lowered. Contradictory metrics short-circuit to "no change".

use std::sync::Arc;

use crate::config::PolicyConfig;
use crate::models::{NodePool, Recommendation, UtilizationSample};

/// Accepted reduction ratio above which a phased rollout is advised
pub const PHASED_REDUCTION_RATIO: f64 = 0.30;

/// Absorbs float noise before rounding up, so 10 * 0.5 stays 5
const CEIL_EPSILON: f64 = 1e-9;

const ANOMALY_RATIONALE: &str =
    "metric anomaly: near-zero average with elevated peak; recommend no change pending verification.";

/// Produces bounded min/max recommendations for node pools
#[derive(Debug, Clone)]
pub struct CapacityPlanner {
    config: Arc<PolicyConfig>,
}

impl CapacityPlanner {
    pub fn new(config: Arc<PolicyConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Near-zero average CPU together with a material peak in the same window
    pub fn is_anomalous(&self, sample: &UtilizationSample) -> bool {
        sample.avg_cpu_pct < self.config.anomaly_cpu_epsilon
            && sample.peak_cpu_pct >= self.config.cpu_underutil_threshold
    }

    /// Plan a recommendation for one pool. Pure: identical inputs always
    /// produce an identical recommendation.
    pub fn plan(&self, pool: &NodePool, sample: &UtilizationSample) -> Recommendation {
        let cfg = &self.config;

        if self.is_anomalous(sample) {
            return Recommendation {
                pool_id: pool.id(),
                recommended_min: pool.current_min,
                recommended_max: pool.current_max,
                is_anomalous: true,
                phased: false,
                rationale: ANOMALY_RATIONALE.to_string(),
            };
        }

        let current_min = f64::from(pool.current_min);
        let raw_min = ceil_nodes(
            current_min * (sample.avg_cpu_pct / 100.0) * (cfg.min_safety_margin_pct / 100.0),
        );
        let raw_max = ceil_nodes(
            current_min * (sample.peak_cpu_pct / 100.0) * (cfg.max_safety_margin_pct / 100.0),
        );

        let floor = cfg.floor_for(pool.role);
        let clamped_min = raw_min.max(floor);

        let min_allowed_by_cap = ceil_nodes(current_min * (1.0 - cfg.max_reduction_pct / 100.0));
        let mut recommended_min = clamped_min.max(min_allowed_by_cap);

        let recommended_max = pool.current_max.max(raw_max);

        let mut notes = vec![
            format!(
                "average CPU {:.1}% with {:.0}% safety margin needs {} node(s)",
                sample.avg_cpu_pct, cfg.min_safety_margin_pct, raw_min
            ),
            format!("{} pool floor is {}", pool.role, floor),
            format!(
                "{:.0}% reduction cap allows no fewer than {} node(s)",
                cfg.max_reduction_pct, min_allowed_by_cap
            ),
        ];

        if raw_max > pool.current_max {
            notes.push(format!(
                "peak CPU {:.1}% with {:.0}% safety margin needs {} node(s), raising max from {}",
                sample.peak_cpu_pct, cfg.max_safety_margin_pct, raw_max, pool.current_max
            ));
        } else {
            notes.push(format!(
                "max kept at {} to preserve headroom for traffic spikes (peak CPU {:.1}% needs {})",
                pool.current_max, sample.peak_cpu_pct, raw_max
            ));
        }

        if recommended_min > recommended_max {
            notes.push(format!(
                "min {} exceeds max {}; collapsed to a single-size pool of {}",
                recommended_min, recommended_max, recommended_max
            ));
            recommended_min = recommended_max;
        }

        let phased = reduction_ratio(pool.current_min, recommended_min) > PHASED_REDUCTION_RATIO;
        if phased {
            notes.push("phased implementation recommended".to_string());
        }

        Recommendation {
            pool_id: pool.id(),
            recommended_min,
            recommended_max,
            is_anomalous: false,
            phased,
            rationale: notes.join("; "),
        }
    }
}

/// Round a fractional node requirement up to whole nodes
fn ceil_nodes(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    // `as` saturates at u32::MAX
    (value - CEIL_EPSILON).ceil().max(0.0) as u32
}

/// Fraction of the current minimum removed by the recommendation
fn reduction_ratio(current_min: u32, recommended_min: u32) -> f64 {
    if current_min == 0 {
        return 0.0;
    }
    (f64::from(current_min) - f64::from(recommended_min)) / f64::from(current_min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PoolId, PoolRole};

    fn planner(config: PolicyConfig) -> CapacityPlanner {
        CapacityPlanner::new(Arc::new(config))
    }

    fn pool(role: PoolRole, current_min: u32, current_max: u32) -> NodePool {
        NodePool {
            name: "pool1".to_string(),
            cluster_id: "aks-prod".to_string(),
            subscription_id: "sub-1".to_string(),
            role,
            vm_sku: "Standard_D4s_v3".to_string(),
            current_min,
            current_max,
            autoscaling_enabled: true,
        }
    }

    fn sample(avg_cpu: f64, peak_cpu: f64) -> UtilizationSample {
        UtilizationSample {
            pool_id: PoolId::from("aks-prod/pool1"),
            window_days: 30,
            avg_cpu_pct: avg_cpu,
            peak_cpu_pct: peak_cpu,
            avg_mem_pct: 30.0,
            peak_mem_pct: 45.0,
        }
    }

    #[test]
    fn test_scenario_a_user_pool_capped_at_floor() {
        let planner = planner(PolicyConfig::default());
        let rec = planner.plan(&pool(PoolRole::User, 10, 20), &sample(20.0, 35.0));

        assert!(!rec.is_anomalous);
        assert_eq!(rec.recommended_min, 5);
        assert_eq!(rec.recommended_max, 20);
        // 50% cut exceeds the 30% phasing threshold
        assert!(rec.phased);
        assert!(rec.rationale.contains("phased implementation recommended"));
    }

    #[test]
    fn test_scenario_b_system_pool_floor() {
        let planner = planner(PolicyConfig::default());
        let rec = planner.plan(&pool(PoolRole::System, 4, 6), &sample(10.0, 20.0));

        assert_eq!(rec.recommended_min, 3);
        assert!(!rec.phased);
    }

    #[test]
    fn test_scenario_c_anomaly_keeps_current_sizing() {
        let planner = planner(PolicyConfig::default());
        let rec = planner.plan(&pool(PoolRole::User, 8, 12), &sample(0.0, 85.0));

        assert!(rec.is_anomalous);
        assert_eq!(rec.recommended_min, 8);
        assert_eq!(rec.recommended_max, 12);
        assert!(rec.rationale.starts_with("metric anomaly"));
    }

    #[test]
    fn test_near_zero_average_with_low_peak_is_not_anomalous() {
        let planner = planner(PolicyConfig::default());
        let rec = planner.plan(&pool(PoolRole::User, 8, 12), &sample(0.5, 10.0));
        assert!(!rec.is_anomalous);
    }

    #[test]
    fn test_peak_raises_max_but_never_lowers_it() {
        let planner = planner(PolicyConfig::default());

        // ceil(10 * 0.9 * 1.5) = 14 > current_max 12
        let rec = planner.plan(&pool(PoolRole::User, 10, 12), &sample(40.0, 90.0));
        assert_eq!(rec.recommended_max, 14);

        let rec = planner.plan(&pool(PoolRole::User, 10, 40), &sample(40.0, 50.0));
        assert_eq!(rec.recommended_max, 40);
    }

    #[test]
    fn test_high_utilization_raises_min() {
        let planner = planner(PolicyConfig::default());
        // ceil(6 * 0.8 * 1.5) = 8
        let rec = planner.plan(&pool(PoolRole::User, 6, 20), &sample(80.0, 95.0));
        assert_eq!(rec.recommended_min, 8);
        assert!(!rec.phased);
    }

    #[test]
    fn test_min_collapses_to_max_when_floor_exceeds_ceiling() {
        let planner = planner(PolicyConfig::default());
        // user floor 5 but the pool can never exceed 3 nodes
        let rec = planner.plan(&pool(PoolRole::User, 2, 3), &sample(10.0, 20.0));
        assert_eq!(rec.recommended_min, 3);
        assert_eq!(rec.recommended_max, 3);
        assert!(rec.rationale.contains("single-size pool"));
    }

    #[test]
    fn test_zero_minimum_pool_does_not_divide_by_zero() {
        let planner = planner(PolicyConfig {
            min_user_floor: 0,
            ..PolicyConfig::default()
        });
        let rec = planner.plan(&pool(PoolRole::User, 0, 5), &sample(30.0, 60.0));
        assert_eq!(rec.recommended_min, 0);
        assert!(!rec.phased);
    }

    #[test]
    fn test_plan_is_idempotent() {
        let planner = planner(PolicyConfig::default());
        let pool = pool(PoolRole::User, 17, 30);
        let sample = sample(33.3, 71.9);
        assert_eq!(planner.plan(&pool, &sample), planner.plan(&pool, &sample));
    }

    #[test]
    fn test_bounds_and_floor_invariants_hold_across_grid() {
        let planner = planner(PolicyConfig::default());
        for role in [PoolRole::System, PoolRole::User] {
            let floor = planner.config().floor_for(role);
            for current_min in 1..=30u32 {
                for extra in [0u32, 3, 10] {
                    let current_max = current_min + extra;
                    let pool = pool(role, current_min, current_max);
                    for avg in (0..=100).step_by(5) {
                        for peak in (avg..=100).step_by(10) {
                            let rec = planner.plan(&pool, &sample(avg as f64, peak as f64));
                            assert!(rec.recommended_min <= rec.recommended_max);
                            if !rec.is_anomalous && rec.recommended_max >= floor {
                                assert!(
                                    rec.recommended_min >= floor,
                                    "{:?} below floor {}",
                                    rec,
                                    floor
                                );
                            }
                            assert!(rec.recommended_max >= current_max);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_reduction_never_exceeds_cap() {
        for cap in [10.0, 25.0, 50.0, 75.0] {
            let planner = planner(PolicyConfig {
                max_reduction_pct: cap,
                min_user_floor: 1,
                min_system_floor: 1,
                ..PolicyConfig::default()
            });
            for current_min in 1..=40u32 {
                let pool = pool(PoolRole::User, current_min, current_min + 5);
                for avg in (1..=100).step_by(3) {
                    let rec = planner.plan(&pool, &sample(avg as f64, 100.0));
                    if rec.is_anomalous {
                        continue;
                    }
                    let reduction = (f64::from(current_min) - f64::from(rec.recommended_min))
                        / f64::from(current_min);
                    assert!(reduction <= cap / 100.0 + 1e-9, "cap {} violated: {:?}", cap, rec);
                }
            }
        }
    }

    #[test]
    fn test_min_is_monotonic_in_average_cpu() {
        let planner = planner(PolicyConfig::default());
        for current_min in [1u32, 4, 9, 10, 25] {
            let pool = pool(PoolRole::User, current_min, current_min * 2);
            let mut previous = 0;
            // start above the anomaly epsilon; the anomaly short-circuit is a separate state
            for avg in 1..=100 {
                let rec = planner.plan(&pool, &sample(avg as f64, 100.0));
                assert!(rec.recommended_min >= previous);
                previous = rec.recommended_min;
            }
        }
    }

    #[test]
    fn test_ceil_nodes_tolerates_float_noise() {
        assert_eq!(ceil_nodes(10.0 * 0.5), 5);
        assert_eq!(ceil_nodes(10.0 * 0.20 * 1.5), 3);
        assert_eq!(ceil_nodes(4.0 * 0.10 * 1.5), 1);
        assert_eq!(ceil_nodes(0.0), 0);
        assert_eq!(ceil_nodes(f64::NAN), 0);
        assert_eq!(ceil_nodes(2.01), 3);
    }
}
