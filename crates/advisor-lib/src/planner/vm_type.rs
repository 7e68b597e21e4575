//! VM family advice from CPU/memory skew
//!
//! When average memory pressure is far above average CPU (or the reverse) the
//! pool is paying for the wrong resource shape. The advisor proposes a
//! memory- or compute-optimized family of the same vCPU size; it never
//! changes the numeric sizing recommendation.

use crate::config::PolicyConfig;
use crate::models::{NodePool, UtilizationSample, VmFamily, VmTypeSuggestion};

/// vCPU sizes offered by the E-series (v5)
const MEMORY_OPTIMIZED_SIZES: &[u32] = &[2, 4, 8, 16, 20, 32, 48, 64, 96];

/// vCPU sizes offered by the F-series (v2)
const COMPUTE_OPTIMIZED_SIZES: &[u32] = &[2, 4, 8, 16, 32, 48, 64, 72];

/// Parsed form of an Azure VM SKU such as `Standard_D4s_v3`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkuParts {
    pub family: String,
    pub vcpus: u32,
    pub features: String,
    pub version: Option<String>,
}

impl SkuParts {
    pub fn parse(sku: &str) -> Option<Self> {
        let body = sku
            .strip_prefix("Standard_")
            .or_else(|| sku.strip_prefix("standard_"))
            .unwrap_or(sku);

        let (size, version) = match body.split_once('_') {
            Some((size, version)) => (size, Some(version.to_string())),
            None => (body, None),
        };

        let family_len = size.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let digits_len = size[family_len..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .count();
        if family_len == 0 || digits_len == 0 {
            return None;
        }

        let vcpus = size[family_len..family_len + digits_len].parse().ok()?;
        Some(Self {
            family: size[..family_len].to_ascii_uppercase(),
            vcpus,
            features: size[family_len + digits_len..].to_string(),
            version,
        })
    }

    fn is_family(&self, family: VmFamily) -> bool {
        match family {
            VmFamily::MemoryOptimized => self.family.starts_with('E') || self.family.starts_with('M'),
            VmFamily::ComputeOptimized => self.family.starts_with('F'),
        }
    }
}

/// Suggests an alternate VM family when utilization is skewed
#[derive(Debug, Clone)]
pub struct VmTypeAdvisor {
    skew_threshold_pct: f64,
}

impl VmTypeAdvisor {
    pub fn new(skew_threshold_pct: f64) -> Self {
        Self { skew_threshold_pct }
    }

    pub fn from_policy(config: &PolicyConfig) -> Self {
        Self::new(config.vm_skew_threshold_pct)
    }

    pub fn advise(&self, pool: &NodePool, sample: &UtilizationSample) -> Option<VmTypeSuggestion> {
        let gap = sample.avg_mem_pct - sample.avg_cpu_pct;

        let (family, reason) = if gap > self.skew_threshold_pct {
            (
                VmFamily::MemoryOptimized,
                format!(
                    "average memory {:.1}% exceeds average CPU {:.1}% by {:.1} points",
                    sample.avg_mem_pct, sample.avg_cpu_pct, gap
                ),
            )
        } else if -gap > self.skew_threshold_pct {
            (
                VmFamily::ComputeOptimized,
                format!(
                    "average CPU {:.1}% exceeds average memory {:.1}% by {:.1} points",
                    sample.avg_cpu_pct, sample.avg_mem_pct, -gap
                ),
            )
        } else {
            return None;
        };

        let parts = SkuParts::parse(&pool.vm_sku);
        if parts.as_ref().is_some_and(|p| p.is_family(family)) {
            return None;
        }

        Some(VmTypeSuggestion {
            family,
            suggested_sku: parts.and_then(|p| equivalent_sku(family, p.vcpus)),
            reason,
        })
    }
}

fn equivalent_sku(family: VmFamily, vcpus: u32) -> Option<String> {
    match family {
        VmFamily::MemoryOptimized if MEMORY_OPTIMIZED_SIZES.contains(&vcpus) => {
            Some(format!("Standard_E{}s_v5", vcpus))
        }
        VmFamily::ComputeOptimized if COMPUTE_OPTIMIZED_SIZES.contains(&vcpus) => {
            Some(format!("Standard_F{}s_v2", vcpus))
        }
        _ => None,
    }
}
