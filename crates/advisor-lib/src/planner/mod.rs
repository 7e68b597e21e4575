//! Node pool sizing and VM type advice

mod capacity;
mod vm_type;

pub use capacity::{CapacityPlanner, PHASED_REDUCTION_RATIO};
pub use vm_type::{SkuParts, VmTypeAdvisor};
