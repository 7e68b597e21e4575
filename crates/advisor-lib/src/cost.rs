//! Monthly and annual cost of current versus recommended sizing

use std::sync::Arc;

use crate::config::PolicyConfig;
use crate::error::AnalysisError;
use crate::models::{CostEstimate, NodePool, Recommendation};
use crate::pricing::PricingCatalog;

/// Billing hours in a month
pub const HOURS_PER_MONTH: f64 = 730.0;

pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Prices the baseline (minimum) node count before and after a recommendation
#[derive(Debug, Clone)]
pub struct CostEstimator {
    catalog: Arc<PricingCatalog>,
    discount_pct: f64,
}

impl CostEstimator {
    pub fn new(catalog: Arc<PricingCatalog>, config: &PolicyConfig) -> Self {
        Self {
            catalog,
            discount_pct: config.discount_pct,
        }
    }

    pub fn effective_hourly_price(&self, vm_sku: &str) -> Result<f64, AnalysisError> {
        self.catalog.effective_price(vm_sku, self.discount_pct)
    }

    pub fn estimate(
        &self,
        pool: &NodePool,
        recommendation: &Recommendation,
    ) -> Result<CostEstimate, AnalysisError> {
        let hourly = self.effective_hourly_price(&pool.vm_sku)?;

        let current_monthly = pool.current_min as f64 * hourly * HOURS_PER_MONTH;
        let recommended_monthly = recommendation.recommended_min as f64 * hourly * HOURS_PER_MONTH;
        let savings_monthly = current_monthly - recommended_monthly;

        Ok(CostEstimate {
            pool_id: pool.id(),
            current_monthly,
            recommended_monthly,
            savings_monthly,
            savings_annual: savings_monthly * MONTHS_PER_YEAR,
        })
    }
}
