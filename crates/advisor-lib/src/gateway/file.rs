use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use super::MetricsGateway;
use crate::error::AnalysisError;
use crate::files::{read_json, LoadError};
use crate::models::{PoolId, UtilizationSample};

/// Serves samples exported ahead of time to a JSON array
#[derive(Debug, Clone, Default)]
pub struct FileMetricsGateway {
    samples: HashMap<PoolId, UtilizationSample>,
}

impl FileMetricsGateway {
    pub async fn load(path: &Path) -> Result<Self, LoadError> {
        let samples: Vec<UtilizationSample> = read_json(path).await?;
        let count = samples.len();
        let gateway = Self::from_samples(samples).map_err(|pool_id| LoadError::Invalid {
            path: path.to_path_buf(),
            reason: format!("duplicate sample for pool {}", pool_id),
        })?;
        debug!(path = %path.display(), samples = count, "Loaded utilization samples");
        Ok(gateway)
    }

    /// Index samples by pool; returns the first duplicated pool ID on conflict
    pub fn from_samples(samples: impl IntoIterator<Item = UtilizationSample>) -> Result<Self, PoolId> {
        let mut map = HashMap::new();
        for sample in samples {
            if map.contains_key(&sample.pool_id) {
                return Err(sample.pool_id);
            }
            map.insert(sample.pool_id.clone(), sample);
        }
        Ok(Self { samples: map })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[async_trait]
impl MetricsGateway for FileMetricsGateway {
    async fn utilization(
        &self,
        pool_id: &PoolId,
        window_days: u32,
    ) -> Result<UtilizationSample, AnalysisError> {
        let sample = self
            .samples
            .get(pool_id)
            .ok_or_else(|| AnalysisError::MetricsUnavailable {
                pool_id: pool_id.clone(),
                reason: "no utilization sample exported for this pool".to_string(),
            })?;

        if sample.window_days != window_days {
            return Err(AnalysisError::InvalidInput(format!(
                "sample for {} covers {} days, expected {}",
                pool_id, sample.window_days, window_days
            )));
        }

        sample.validate()?;
        Ok(sample.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample(pool: &str, window_days: u32, avg_cpu: f64) -> UtilizationSample {
        UtilizationSample {
            pool_id: PoolId::from(pool),
            window_days,
            avg_cpu_pct: avg_cpu,
            peak_cpu_pct: 80.0,
            avg_mem_pct: 40.0,
            peak_mem_pct: 55.0,
        }
    }

    #[tokio::test]
    async fn test_returns_matching_sample() {
        let gateway = FileMetricsGateway::from_samples(vec![sample("aks/user1", 30, 20.0)]).unwrap();
        let found = gateway
            .utilization(&PoolId::from("aks/user1"), 30)
            .await
            .unwrap();
        assert_eq!(found.avg_cpu_pct, 20.0);
    }

    #[tokio::test]
    async fn test_missing_pool_is_metrics_unavailable() {
        let gateway = FileMetricsGateway::default();
        let err = gateway
            .utilization(&PoolId::from("aks/none"), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MetricsUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_window_mismatch_is_invalid_input() {
        let gateway = FileMetricsGateway::from_samples(vec![sample("aks/user1", 7, 20.0)]).unwrap();
        let err = gateway
            .utilization(&PoolId::from("aks/user1"), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_sample_is_invalid_input() {
        let gateway = FileMetricsGateway::from_samples(vec![sample("aks/user1", 30, 140.0)]).unwrap();
        let err = gateway
            .utilization(&PoolId::from("aks/user1"), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn test_duplicate_samples_rejected() {
        let result = FileMetricsGateway::from_samples(vec![
            sample("aks/user1", 30, 20.0),
            sample("aks/user1", 30, 25.0),
        ]);
        assert_eq!(result.unwrap_err(), PoolId::from("aks/user1"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"pool_id": "aks-prod/user1", "window_days": 30, "avg_cpu_pct": 20.0,
                 "peak_cpu_pct": 45.0, "avg_mem_pct": 35.0, "peak_mem_pct": 50.0}}]"#
        )
        .unwrap();

        let gateway = FileMetricsGateway::load(file.path()).await.unwrap();
        assert_eq!(gateway.len(), 1);
    }
}
