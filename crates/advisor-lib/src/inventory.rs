//! Node pool inventory loading

use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::files::{read_json, LoadError};
use crate::models::NodePool;

/// Load the pools to analyze from a JSON array of [`NodePool`].
///
/// Per-pool field problems (e.g. `current_min > current_max`) are left for
/// the runner to report as script errors and take no part in the duplicate
/// check. A repeated ID among valid pools makes the whole file invalid.
pub async fn load_inventory(path: &Path) -> Result<Vec<NodePool>, LoadError> {
    let pools: Vec<NodePool> = read_json(path).await?;

    let mut seen = HashSet::new();
    for pool in pools.iter().filter(|p| p.validate().is_ok()) {
        if !seen.insert(pool.id()) {
            return Err(LoadError::Invalid {
                path: path.to_path_buf(),
                reason: format!("pool {} is listed more than once", pool.id()),
            });
        }
    }

    let subscriptions: HashSet<&str> = pools.iter().map(|p| p.subscription_id.as_str()).collect();
    info!(
        path = %path.display(),
        pools = pools.len(),
        subscriptions = subscriptions.len(),
        "Loaded node pool inventory"
    );

    Ok(pools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::models::PoolRole;
    use std::io::Write;

    fn write_inventory(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_inventory() {
        let file = write_inventory(
            r#"[
                {"name": "system", "cluster_id": "aks-prod", "subscription_id": "sub-1",
                 "role": "system", "vm_sku": "Standard_D4s_v3", "current_min": 3, "current_max": 5},
                {"name": "batch", "cluster_id": "aks-prod", "subscription_id": "sub-1",
                 "role": "user", "vm_sku": "Standard_D8s_v3", "current_min": 6, "current_max": 6,
                 "autoscaling_enabled": false}
            ]"#,
        );

        let pools = load_inventory(file.path()).await.unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].role, PoolRole::System);
        assert!(pools[0].autoscaling_enabled);
        assert!(!pools[1].autoscaling_enabled);
    }

    #[tokio::test]
    async fn test_duplicate_pool_rejected() {
        let file = write_inventory(
            r#"[
                {"name": "apps", "cluster_id": "aks", "subscription_id": "s", "role": "user",
                 "vm_sku": "Standard_D4s_v3", "current_min": 1, "current_max": 2},
                {"name": "apps", "cluster_id": "aks", "subscription_id": "s", "role": "user",
                 "vm_sku": "Standard_D4s_v3", "current_min": 1, "current_max": 2}
            ]"#,
        );

        let err = load_inventory(file.path()).await.unwrap_err();
        assert!(matches!(err, LoadError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_invalid_pool_does_not_count_as_duplicate() {
        // "a/b" + "c" and "a" + "b/c" both render as a/b/c; only the second is malformed
        let file = write_inventory(
            r#"[
                {"name": "c", "cluster_id": "a/b", "subscription_id": "s", "role": "user",
                 "vm_sku": "Standard_D4s_v3", "current_min": 1, "current_max": 2},
                {"name": "b/c", "cluster_id": "a", "subscription_id": "s", "role": "user",
                 "vm_sku": "Standard_D4s_v3", "current_min": 1, "current_max": 2}
            ]"#,
        );

        let pools = load_inventory(file.path()).await.unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].id(), pools[1].id());
        assert!(pools[0].validate().is_ok());
        assert!(matches!(pools[1].validate(), Err(AnalysisError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_malformed_inventory_is_parse_error() {
        let file = write_inventory(r#"[{"name": "apps"}]"#);
        let err = load_inventory(file.path()).await.unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }
}
