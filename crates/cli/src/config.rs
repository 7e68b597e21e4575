//! Command-line flags for policy and run settings

use advisor_lib::retry::RetryPolicy;
use advisor_lib::{AnalyzerConfig, PolicyConfig, PolicyOverrides};
use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use std::path::PathBuf;
use std::time::Duration;

/// Sizing policy flags shared by `analyze` and `show-config`.
///
/// Unset flags fall through to the policy file, then to `POOL_ADVISOR_*`
/// policy keys, then to built-in defaults.
#[derive(Debug, Clone, Args)]
pub struct PolicyArgs {
    /// Optional TOML policy file
    #[arg(long, env = "POOL_ADVISOR_POLICY_FILE")]
    pub policy_file: Option<PathBuf>,

    /// Negotiated discount off list price, in percent [default: 0]
    #[arg(long, env = "POOL_ADVISOR_DISCOUNT_PCT")]
    pub discount_pct: Option<f64>,

    /// Safety margin applied to average CPU when sizing the minimum [default: 150]
    #[arg(long, env = "POOL_ADVISOR_MIN_SAFETY_MARGIN_PCT")]
    pub min_safety_margin_pct: Option<f64>,

    /// Safety margin applied to peak CPU when sizing the maximum [default: 150]
    #[arg(long, env = "POOL_ADVISOR_MAX_SAFETY_MARGIN_PCT")]
    pub max_safety_margin_pct: Option<f64>,

    /// Largest allowed cut of the current minimum, in percent [default: 50]
    #[arg(long, env = "POOL_ADVISOR_MAX_REDUCTION_PCT")]
    pub max_reduction_pct: Option<f64>,

    /// Node floor for user pools [default: 5]
    #[arg(long, env = "POOL_ADVISOR_MIN_USER_POOL_NODES")]
    pub min_user_pool_nodes: Option<u32>,

    /// Node floor for system pools [default: 3]
    #[arg(long, env = "POOL_ADVISOR_MIN_SYSTEM_POOL_NODES")]
    pub min_system_pool_nodes: Option<u32>,
}

impl PolicyArgs {
    pub fn overrides(&self) -> PolicyOverrides {
        PolicyOverrides {
            min_safety_margin_pct: self.min_safety_margin_pct,
            max_safety_margin_pct: self.max_safety_margin_pct,
            max_reduction_pct: self.max_reduction_pct,
            min_user_floor: self.min_user_pool_nodes,
            min_system_floor: self.min_system_pool_nodes,
            discount_pct: self.discount_pct,
        }
    }

    /// Resolve and validate the effective policy
    pub fn load(&self) -> Result<PolicyConfig> {
        PolicyConfig::load(self.policy_file.as_deref(), &self.overrides())
            .context("Failed to load policy configuration")
    }
}

/// Flags for the `analyze` command
#[derive(Debug, Clone, Args)]
#[command(group(ArgGroup::new("metrics_source").required(true).args(["metrics_file", "metrics_url"])))]
#[command(group(ArgGroup::new("pricing_source").required(true).args(["pricing_file", "pricing_url"])))]
pub struct AnalyzeArgs {
    /// JSON inventory of node pools to analyze
    #[arg(long, env = "POOL_ADVISOR_INVENTORY")]
    pub inventory: PathBuf,

    /// JSON file of exported utilization samples
    #[arg(long, env = "POOL_ADVISOR_METRICS_FILE")]
    pub metrics_file: Option<PathBuf>,

    /// Base URL of the utilization metrics API
    #[arg(long, env = "POOL_ADVISOR_METRICS_URL")]
    pub metrics_url: Option<String>,

    /// JSON price list keyed by region
    #[arg(long, env = "POOL_ADVISOR_PRICING_FILE")]
    pub pricing_file: Option<PathBuf>,

    /// Base URL of the pricing API
    #[arg(long, env = "POOL_ADVISOR_PRICING_URL")]
    pub pricing_url: Option<String>,

    /// Region whose prices apply
    #[arg(long, env = "POOL_ADVISOR_REGION", default_value = "eastus")]
    pub region: String,

    /// Utilization lookback window in days
    #[arg(long, env = "POOL_ADVISOR_LOOKBACK_DAYS", default_value_t = 30)]
    pub lookback_days: u32,

    /// Maximum pools analyzed concurrently
    #[arg(long, env = "POOL_ADVISOR_CONCURRENCY", default_value_t = 5)]
    pub concurrency: usize,

    /// Deadline per subscription, in seconds
    #[arg(long, env = "POOL_ADVISOR_TIMEOUT_SECS", default_value_t = 300)]
    pub timeout_secs: u64,

    /// Number of top opportunities to list
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Directory for issues.json, script_errors.json and report.txt
    #[arg(long, env = "POOL_ADVISOR_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Write Prometheus text exposition of run metrics to this file
    #[arg(long, env = "POOL_ADVISOR_METRICS_TEXTFILE")]
    pub metrics_textfile: Option<PathBuf>,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

impl AnalyzeArgs {
    pub fn analyzer_config(&self) -> Result<AnalyzerConfig> {
        let config = AnalyzerConfig {
            lookback_days: self.lookback_days,
            concurrency: self.concurrency,
            deadline: Duration::from_secs(self.timeout_secs),
            top_n: self.top,
            retry: RetryPolicy::default(),
        };
        config.validate().context("Invalid run settings")?;
        Ok(config)
    }
}
