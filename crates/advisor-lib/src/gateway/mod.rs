//! Utilization metrics gateways
//!
//! A gateway answers one question: what did this pool's CPU and memory look
//! like over the lookback window? Implementations report failures as
//! [`AnalysisError`] so the runner can classify them without translation.

mod file;
mod http;

pub use file::FileMetricsGateway;
pub use http::HttpMetricsGateway;

use async_trait::async_trait;

use crate::error::AnalysisError;
use crate::models::{PoolId, UtilizationSample};

#[async_trait]
pub trait MetricsGateway: Send + Sync {
    /// Fetch the utilization sample for a pool over `window_days`
    async fn utilization(
        &self,
        pool_id: &PoolId,
        window_days: u32,
    ) -> Result<UtilizationSample, AnalysisError>;
}
