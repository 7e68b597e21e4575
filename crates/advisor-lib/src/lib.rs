//! Node pool capacity and cost advisor library
//!
//! This crate provides the core functionality for:
//! - Sizing recommendations for autoscaling and static node pools
//! - VM family suggestions from CPU/memory utilization skew
//! - Monthly and annual savings estimates from a pricing catalog
//! - Severity classification and aggregation of findings
//! - A bounded, deadline-aware analysis runner with retry and error isolation
//! - Structured logging and Prometheus run metrics

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod cost;
pub mod error;
pub mod files;
pub mod gateway;
pub mod inventory;
pub mod models;
pub mod observability;
pub mod planner;
pub mod pricing;
pub mod report;
pub mod retry;
pub mod runner;

pub use aggregate::{Aggregator, SeverityCounts, Summary, TopIssue, DEFAULT_TOP_N};
pub use classify::{IssueClassifier, NextStep};
pub use config::{ConfigError, PolicyConfig, PolicyOverrides};
pub use cost::CostEstimator;
pub use error::{AnalysisError, ErrorKind, ScriptError};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
pub use planner::{CapacityPlanner, VmTypeAdvisor};
pub use pricing::{PricingCatalog, PricingError, PricingSource};
pub use report::RunReport;
pub use retry::RetryPolicy;
pub use runner::{Analyzer, AnalyzerConfig, PoolPipeline};
