//! File- and HTTP-backed pricing sources

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{PricingCatalog, PricingError, PricingSource};
use crate::files::read_json;
use crate::models::PricingEntry;

/// Reads a `{ "<region>": [ entries ] }` document from disk
#[derive(Debug, Clone)]
pub struct FilePricingSource {
    path: PathBuf,
}

impl FilePricingSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PricingSource for FilePricingSource {
    async fn load_catalog(&self, region: &str) -> Result<PricingCatalog, PricingError> {
        let mut regions: HashMap<String, Vec<PricingEntry>> = read_json(&self.path).await?;

        let key = regions
            .keys()
            .find(|name| name.eq_ignore_ascii_case(region))
            .cloned()
            .ok_or_else(|| PricingError::RegionNotFound(region.to_string()))?;
        let entries = regions.remove(&key).unwrap_or_default();

        debug!(
            path = %self.path.display(),
            region = %region,
            entries = entries.len(),
            "Loaded pricing file"
        );

        PricingCatalog::from_entries(region, entries)
    }
}

#[derive(Debug, Deserialize)]
struct PriceRecord {
    #[serde(alias = "sku")]
    vm_sku: String,
    #[serde(alias = "retail_price")]
    hourly_list_price: f64,
}

/// Fetches a region's price list from a pricing API
pub struct HttpPricingSource {
    client: Client,
    base_url: Url,
}

impl HttpPricingSource {
    pub fn new(base_url: &str) -> Result<Self, PricingError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, PricingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PricingError::Request(format!("failed to create HTTP client: {}", e)))?;

        let base_url = Url::parse(base_url).map_err(|e| PricingError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self { client, base_url })
    }

    fn prices_url(&self, region: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", "v1", "prices"]);
        }
        url.query_pairs_mut().append_pair("region", region);
        url
    }
}

#[async_trait]
impl PricingSource for HttpPricingSource {
    async fn load_catalog(&self, region: &str) -> Result<PricingCatalog, PricingError> {
        let url = self.prices_url(region);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PricingError::Request(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PricingError::RegionNotFound(region.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PricingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let records: Vec<PriceRecord> = response
            .json()
            .await
            .map_err(|e| PricingError::Request(format!("failed to parse price list: {}", e)))?;

        debug!(region = %region, entries = records.len(), "Fetched price list");

        PricingCatalog::from_entries(
            region,
            records.into_iter().map(|record| PricingEntry {
                vm_sku: record.vm_sku,
                hourly_list_price: record.hourly_list_price,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::LoadError;
    use mockito::Matcher;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_source_selects_region() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "eastus": [{{"vm_sku": "Standard_D4s_v3", "hourly_list_price": 0.192}}],
                "westeurope": [{{"vm_sku": "Standard_D4s_v3", "hourly_list_price": 0.23}}]
            }}"#
        )
        .unwrap();

        let source = FilePricingSource::new(file.path());
        let catalog = source.load_catalog("WestEurope").await.unwrap();
        assert_eq!(catalog.region(), "WestEurope");
        assert_eq!(catalog.list_price("Standard_D4s_v3").unwrap(), 0.23);
    }

    #[tokio::test]
    async fn test_file_source_missing_region() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"eastus": []}}"#).unwrap();

        let err = FilePricingSource::new(file.path())
            .load_catalog("northeurope")
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::RegionNotFound(ref r) if r == "northeurope"));
    }

    #[tokio::test]
    async fn test_file_source_unreadable_file() {
        let err = FilePricingSource::new("/nonexistent/prices.json")
            .load_catalog("eastus")
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::Load(LoadError::Read { .. })));
    }

    #[tokio::test]
    async fn test_http_source_fetches_region() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/prices")
            .match_query(Matcher::UrlEncoded("region".into(), "eastus".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"vm_sku": "Standard_D4s_v3", "hourly_list_price": 0.192}]"#)
            .create_async()
            .await;

        let source = HttpPricingSource::new(&server.url()).unwrap();
        let catalog = source.load_catalog("eastus").await.unwrap();

        mock.assert_async().await;
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.list_price("Standard_D4s_v3").unwrap(), 0.192);
    }

    #[tokio::test]
    async fn test_http_source_server_error_is_retryable() {
        use crate::retry::Retryable;

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/prices")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let err = HttpPricingSource::new(&server.url())
            .unwrap()
            .load_catalog("eastus")
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::Status { status: 503, .. }));
        assert!(err.is_retryable());
    }
}
