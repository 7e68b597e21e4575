//! Sizing and pricing policy configuration
//!
//! Loaded once per run from (lowest to highest precedence) built-in
//! defaults, an optional TOML policy file, `POOL_ADVISOR_*` environment
//! variables and command-line overrides. The result is validated before any
//! pool is processed and shared read-only afterwards.

use ::config::builder::DefaultState;
use ::config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::models::PoolRole;

/// Environment variable prefix for policy settings
pub const ENV_PREFIX: &str = "POOL_ADVISOR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load policy configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("invalid policy configuration: {0}")]
    Validation(String),
}

/// Policy knobs for the planner, advisor and cost estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Headroom applied to average CPU when sizing the minimum (percent, > 0)
    #[serde(default = "default_safety_margin")]
    pub min_safety_margin_pct: f64,

    /// Headroom applied to peak CPU when sizing the maximum (percent, > 0)
    #[serde(default = "default_safety_margin")]
    pub max_safety_margin_pct: f64,

    /// Largest cut of the current minimum allowed in one recommendation
    #[serde(default = "default_max_reduction")]
    pub max_reduction_pct: f64,

    /// Minimum node count for user pools
    #[serde(default = "default_min_user_floor")]
    pub min_user_floor: u32,

    /// Minimum node count for system pools
    #[serde(default = "default_min_system_floor")]
    pub min_system_floor: u32,

    /// Negotiated discount off list price
    #[serde(default)]
    pub discount_pct: f64,

    /// Peak CPU at or above which a near-zero average is treated as an anomaly
    #[serde(default = "default_underutil_threshold")]
    pub cpu_underutil_threshold: f64,

    /// Peak memory below which (together with CPU) a pool is underutilized
    #[serde(default = "default_underutil_threshold")]
    pub mem_underutil_threshold: f64,

    /// Average CPU below which readings count as near-zero
    #[serde(default = "default_anomaly_epsilon")]
    pub anomaly_cpu_epsilon: f64,

    /// CPU/memory gap (percentage points) that triggers a VM family suggestion
    #[serde(default = "default_vm_skew_threshold")]
    pub vm_skew_threshold_pct: f64,
}

fn default_safety_margin() -> f64 {
    150.0
}

fn default_max_reduction() -> f64 {
    50.0
}

fn default_min_user_floor() -> u32 {
    5
}

fn default_min_system_floor() -> u32 {
    3
}

fn default_underutil_threshold() -> f64 {
    60.0
}

fn default_anomaly_epsilon() -> f64 {
    1.0
}

fn default_vm_skew_threshold() -> f64 {
    20.0
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_safety_margin_pct: default_safety_margin(),
            max_safety_margin_pct: default_safety_margin(),
            max_reduction_pct: default_max_reduction(),
            min_user_floor: default_min_user_floor(),
            min_system_floor: default_min_system_floor(),
            discount_pct: 0.0,
            cpu_underutil_threshold: default_underutil_threshold(),
            mem_underutil_threshold: default_underutil_threshold(),
            anomaly_cpu_epsilon: default_anomaly_epsilon(),
            vm_skew_threshold_pct: default_vm_skew_threshold(),
        }
    }
}

impl PolicyConfig {
    /// Load from an optional policy file and the environment, apply
    /// command-line overrides and validate.
    pub fn load(policy_file: Option<&Path>, overrides: &PolicyOverrides) -> Result<Self, ConfigError> {
        Self::load_with_env(policy_file, Environment::with_prefix(ENV_PREFIX), overrides)
    }

    /// [`PolicyConfig::load`] with an explicit environment source
    pub fn load_with_env(
        policy_file: Option<&Path>,
        env: Environment,
        overrides: &PolicyOverrides,
    ) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = policy_file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(env.try_parsing(true));

        let mut policy = Self::from_builder(builder)?;
        overrides.apply(&mut policy);
        policy.validate()?;
        Ok(policy)
    }

    /// Deserialize from prepared sources without validating
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Node floor for a pool role
    pub fn floor_for(&self, role: PoolRole) -> u32 {
        match role {
            PoolRole::System => self.min_system_floor,
            PoolRole::User => self.min_user_floor,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_safety_margin_pct.is_finite() || self.min_safety_margin_pct <= 0.0 {
            return Err(ConfigError::Validation(
                "min_safety_margin_pct must be greater than 0".to_string(),
            ));
        }
        if !self.max_safety_margin_pct.is_finite() || self.max_safety_margin_pct <= 0.0 {
            return Err(ConfigError::Validation(
                "max_safety_margin_pct must be greater than 0".to_string(),
            ));
        }
        validate_percentage("max_reduction_pct", self.max_reduction_pct)?;
        validate_percentage("discount_pct", self.discount_pct)?;
        validate_percentage("cpu_underutil_threshold", self.cpu_underutil_threshold)?;
        validate_percentage("mem_underutil_threshold", self.mem_underutil_threshold)?;
        validate_percentage("anomaly_cpu_epsilon", self.anomaly_cpu_epsilon)?;
        validate_percentage("vm_skew_threshold_pct", self.vm_skew_threshold_pct)?;
        Ok(())
    }
}

fn validate_percentage(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ConfigError::Validation(format!(
            "{} must be between 0 and 100 (got {})",
            name, value
        )));
    }
    Ok(())
}

/// Command-line values that take precedence over file and environment
#[derive(Debug, Clone, Default)]
pub struct PolicyOverrides {
    pub min_safety_margin_pct: Option<f64>,
    pub max_safety_margin_pct: Option<f64>,
    pub max_reduction_pct: Option<f64>,
    pub min_user_floor: Option<u32>,
    pub min_system_floor: Option<u32>,
    pub discount_pct: Option<f64>,
}

impl PolicyOverrides {
    pub fn apply(&self, policy: &mut PolicyConfig) {
        if let Some(value) = self.min_safety_margin_pct {
            policy.min_safety_margin_pct = value;
        }
        if let Some(value) = self.max_safety_margin_pct {
            policy.max_safety_margin_pct = value;
        }
        if let Some(value) = self.max_reduction_pct {
            policy.max_reduction_pct = value;
        }
        if let Some(value) = self.min_user_floor {
            policy.min_user_floor = value;
        }
        if let Some(value) = self.min_system_floor {
            policy.min_system_floor = value;
        }
        if let Some(value) = self.discount_pct {
            policy.discount_pct = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::config::FileFormat;
    use std::io::Write;

    fn from_toml(toml: &str) -> Result<PolicyConfig, ConfigError> {
        let builder = ::config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        PolicyConfig::from_builder(builder)
    }

    #[test]
    fn test_defaults_match_cli_defaults() {
        let policy = PolicyConfig::default();
        assert_eq!(policy.min_safety_margin_pct, 150.0);
        assert_eq!(policy.max_safety_margin_pct, 150.0);
        assert_eq!(policy.max_reduction_pct, 50.0);
        assert_eq!(policy.min_user_floor, 5);
        assert_eq!(policy.min_system_floor, 3);
        assert_eq!(policy.discount_pct, 0.0);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_empty_source_yields_defaults() {
        let policy = from_toml("").unwrap();
        assert_eq!(policy, PolicyConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let policy = from_toml("discount_pct = 20.0\nmin_user_floor = 2\n").unwrap();
        assert_eq!(policy.discount_pct, 20.0);
        assert_eq!(policy.min_user_floor, 2);
        assert_eq!(policy.min_system_floor, 3);
    }

    #[test]
    fn test_negative_floor_is_rejected_at_load() {
        assert!(matches!(
            from_toml("min_system_floor = -1\n"),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_non_positive_margin_is_rejected() {
        let policy = PolicyConfig {
            min_safety_margin_pct: 0.0,
            ..PolicyConfig::default()
        };
        assert!(matches!(policy.validate(), Err(ConfigError::Validation(_))));

        let policy = PolicyConfig {
            max_safety_margin_pct: -10.0,
            ..PolicyConfig::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_percentages_out_of_range_are_rejected() {
        let policy = PolicyConfig {
            discount_pct: 120.0,
            ..PolicyConfig::default()
        };
        assert!(policy.validate().is_err());

        let policy = PolicyConfig {
            max_reduction_pct: f64::NAN,
            ..PolicyConfig::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_overrides_take_precedence_over_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "discount_pct = 10.0").unwrap();
        writeln!(file, "max_reduction_pct = 40.0").unwrap();

        let overrides = PolicyOverrides {
            discount_pct: Some(25.0),
            ..PolicyOverrides::default()
        };
        let policy = PolicyConfig::load(Some(file.path()), &overrides).unwrap();
        assert_eq!(policy.discount_pct, 25.0);
        assert_eq!(policy.max_reduction_pct, 40.0);
    }

    fn env_source(vars: &[(&str, &str)]) -> Environment {
        let vars = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(vars))
    }

    #[test]
    fn test_environment_sets_tuning_thresholds() {
        let env = env_source(&[
            ("POOL_ADVISOR_ANOMALY_CPU_EPSILON", "5"),
            ("POOL_ADVISOR_VM_SKEW_THRESHOLD_PCT", "30.5"),
            ("POOL_ADVISOR_INVENTORY", "pools.json"),
        ]);
        let policy = PolicyConfig::load_with_env(None, env, &PolicyOverrides::default()).unwrap();
        assert_eq!(policy.anomaly_cpu_epsilon, 5.0);
        assert_eq!(policy.vm_skew_threshold_pct, 30.5);
        assert_eq!(policy.cpu_underutil_threshold, 60.0);
    }

    #[test]
    fn test_precedence_file_then_env_then_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "discount_pct = 10.0").unwrap();
        writeln!(file, "max_reduction_pct = 40.0").unwrap();
        writeln!(file, "min_user_floor = 4").unwrap();

        let env = env_source(&[
            ("POOL_ADVISOR_DISCOUNT_PCT", "15"),
            ("POOL_ADVISOR_MAX_REDUCTION_PCT", "35"),
        ]);
        let overrides = PolicyOverrides {
            discount_pct: Some(25.0),
            ..PolicyOverrides::default()
        };

        let policy = PolicyConfig::load_with_env(Some(file.path()), env, &overrides).unwrap();
        assert_eq!(policy.discount_pct, 25.0);
        assert_eq!(policy.max_reduction_pct, 35.0);
        assert_eq!(policy.min_user_floor, 4);
    }

    #[test]
    fn test_invalid_environment_value_fails_validation() {
        let env = env_source(&[("POOL_ADVISOR_MEM_UNDERUTIL_THRESHOLD", "150")]);
        assert!(matches!(
            PolicyConfig::load_with_env(None, env, &PolicyOverrides::default()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_override_fails_validation() {
        let overrides = PolicyOverrides {
            min_safety_margin_pct: Some(0.0),
            ..PolicyOverrides::default()
        };
        assert!(matches!(
            PolicyConfig::load(None, &overrides),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_floor_for_role() {
        let policy = PolicyConfig::default();
        assert_eq!(policy.floor_for(PoolRole::System), 3);
        assert_eq!(policy.floor_for(PoolRole::User), 5);
    }
}
