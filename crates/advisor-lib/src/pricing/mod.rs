//! VM pricing catalog
//!
//! The catalog maps VM SKUs to hourly list prices for one region. It is
//! loaded once per run from a [`PricingSource`] and shared read-only by all
//! workers.

mod source;

pub use source::{FilePricingSource, HttpPricingSource};

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::error::AnalysisError;
use crate::files::LoadError;
use crate::models::PricingEntry;
use crate::retry::Retryable;

#[derive(Debug, Error)]
pub enum PricingError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("pricing source has no catalog for region {0}")]
    RegionNotFound(String),

    #[error("pricing request failed: {0}")]
    Request(String),

    #[error("pricing API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("invalid pricing URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid pricing entry for {vm_sku}: {reason}")]
    InvalidEntry { vm_sku: String, reason: String },
}

impl Retryable for PricingError {
    fn is_retryable(&self) -> bool {
        match self {
            PricingError::Request(_) => true,
            PricingError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Source of regional price lists
#[async_trait]
pub trait PricingSource: Send + Sync {
    async fn load_catalog(&self, region: &str) -> Result<PricingCatalog, PricingError>;
}

/// Hourly list prices keyed by SKU (case-insensitive)
#[derive(Debug, Clone, Default)]
pub struct PricingCatalog {
    region: String,
    entries: HashMap<String, PricingEntry>,
}

impl PricingCatalog {
    pub fn from_entries(
        region: impl Into<String>,
        entries: impl IntoIterator<Item = PricingEntry>,
    ) -> Result<Self, PricingError> {
        let mut map = HashMap::new();
        for entry in entries {
            if !entry.hourly_list_price.is_finite() || entry.hourly_list_price < 0.0 {
                return Err(PricingError::InvalidEntry {
                    vm_sku: entry.vm_sku,
                    reason: format!("hourly price {} is negative or not finite", entry.hourly_list_price),
                });
            }
            map.insert(entry.vm_sku.to_ascii_lowercase(), entry);
        }
        Ok(Self {
            region: region.into(),
            entries: map,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, vm_sku: &str) -> Option<&PricingEntry> {
        self.entries.get(&vm_sku.to_ascii_lowercase())
    }

    /// Hourly list price, or a recoverable lookup error for unknown SKUs
    pub fn list_price(&self, vm_sku: &str) -> Result<f64, AnalysisError> {
        self.get(vm_sku)
            .map(|entry| entry.hourly_list_price)
            .ok_or_else(|| AnalysisError::PricingLookup {
                vm_sku: vm_sku.to_string(),
            })
    }

    /// Hourly price after the negotiated discount
    pub fn effective_price(&self, vm_sku: &str, discount_pct: f64) -> Result<f64, AnalysisError> {
        Ok(self.list_price(vm_sku)? * (1.0 - discount_pct / 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PricingCatalog {
        PricingCatalog::from_entries(
            "eastus",
            vec![
                PricingEntry {
                    vm_sku: "Standard_D4s_v3".to_string(),
                    hourly_list_price: 0.192,
                },
                PricingEntry {
                    vm_sku: "Standard_E4s_v5".to_string(),
                    hourly_list_price: 0.252,
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = catalog();
        assert_eq!(catalog.region(), "eastus");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.list_price("standard_d4s_v3").unwrap(), 0.192);
    }

    #[test]
    fn test_unknown_sku_is_lookup_error() {
        let err = catalog().list_price("Standard_NC6").unwrap_err();
        assert!(matches!(err, AnalysisError::PricingLookup { ref vm_sku } if vm_sku == "Standard_NC6"));
    }

    #[test]
    fn test_discount_applied_to_list_price() {
        let price = catalog().effective_price("Standard_D4s_v3", 20.0).unwrap();
        assert!((price - 0.1536).abs() < 1e-12);
    }

    #[test]
    fn test_negative_price_rejected() {
        let result = PricingCatalog::from_entries(
            "eastus",
            vec![PricingEntry {
                vm_sku: "Standard_X1".to_string(),
                hourly_list_price: -1.0,
            }],
        );
        assert!(matches!(result, Err(PricingError::InvalidEntry { .. })));
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(PricingError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(PricingError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!PricingError::Status { status: 403, body: String::new() }.is_retryable());
        assert!(!PricingError::RegionNotFound("mars".into()).is_retryable());
    }
}
