use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use super::MetricsGateway;
use crate::error::AnalysisError;
use crate::models::{PoolId, UtilizationSample};
use crate::observability::EngineMetrics;

#[derive(Debug, Deserialize)]
struct UtilizationResponse {
    window_days: u32,
    avg_cpu_pct: f64,
    peak_cpu_pct: f64,
    avg_mem_pct: f64,
    peak_mem_pct: f64,
}

/// Queries a monitoring API for pool utilization
pub struct HttpMetricsGateway {
    client: Client,
    base_url: Url,
    metrics: EngineMetrics,
}

impl HttpMetricsGateway {
    pub fn new(base_url: &str) -> Result<Self, AnalysisError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::InvalidInput(format!("failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(base_url)
            .map_err(|e| AnalysisError::InvalidInput(format!("invalid metrics URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AnalysisError::InvalidInput(format!(
                "metrics URL {} cannot be used as a base",
                base_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            metrics: EngineMetrics::new(),
        })
    }

    fn utilization_url(&self, pool_id: &PoolId, window_days: u32) -> Url {
        let (cluster, pool) = pool_id.parts();
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "v1", "utilization", cluster, pool]);
        }
        url.query_pairs_mut()
            .append_pair("window_days", &window_days.to_string());
        url
    }

    async fn fetch(&self, pool_id: &PoolId, window_days: u32) -> Result<UtilizationSample, AnalysisError> {
        let url = self.utilization_url(pool_id, window_days);
        debug!(pool_id = %pool_id, url = %url, "Fetching utilization");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AnalysisError::Transient(format!("request for {} failed: {}", pool_id, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(pool_id, status, body));
        }

        let body: UtilizationResponse = response.json().await.map_err(|e| {
            AnalysisError::InvalidInput(format!("malformed utilization response for {}: {}", pool_id, e))
        })?;

        if body.window_days != window_days {
            return Err(AnalysisError::InvalidInput(format!(
                "metrics API returned {} days for {}, expected {}",
                body.window_days, pool_id, window_days
            )));
        }

        let sample = UtilizationSample {
            pool_id: pool_id.clone(),
            window_days: body.window_days,
            avg_cpu_pct: body.avg_cpu_pct,
            peak_cpu_pct: body.peak_cpu_pct,
            avg_mem_pct: body.avg_mem_pct,
            peak_mem_pct: body.peak_mem_pct,
        };
        sample.validate()?;
        Ok(sample)
    }
}

fn map_status(pool_id: &PoolId, status: StatusCode, body: String) -> AnalysisError {
    match status {
        StatusCode::NOT_FOUND => AnalysisError::MetricsUnavailable {
            pool_id: pool_id.clone(),
            reason: if body.is_empty() {
                "monitoring has no data for this pool".to_string()
            } else {
                body
            },
        },
        StatusCode::TOO_MANY_REQUESTS => {
            AnalysisError::Throttled(format!("metrics API throttled request for {}", pool_id))
        }
        s if s.is_server_error() => {
            AnalysisError::Transient(format!("metrics API error ({}): {}", s, body))
        }
        s => AnalysisError::InvalidInput(format!("metrics API rejected request ({}): {}", s, body)),
    }
}

#[async_trait]
impl MetricsGateway for HttpMetricsGateway {
    async fn utilization(
        &self,
        pool_id: &PoolId,
        window_days: u32,
    ) -> Result<UtilizationSample, AnalysisError> {
        let start = Instant::now();
        let result = self.fetch(pool_id, window_days).await;
        self.metrics
            .observe_gateway_latency(start.elapsed().as_secs_f64());
        result
    }
}
