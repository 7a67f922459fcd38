//! Export of a few fresh obfs4 lines for downstream bridge lists.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bridges::{BridgeLine, FetchedBridges, TransportClass};
use crate::store::{save_json, StoreError};

/// `{ "bridges": [...] }` document consumed by client configs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeExport {
    pub bridges: Vec<BridgeLine>,
}

impl BridgeExport {
    /// The first `count` obfs4 lines of a fetch pass.
    pub fn from_fetch(fetched: &FetchedBridges, count: usize) -> Self {
        let bridges = fetched
            .get(&TransportClass::Obfs4Ipv4)
            .map(|lines| lines.iter().take(count).cloned().collect())
            .unwrap_or_default();
        Self { bridges }
    }
}

/// Write the export. Returns `false` when there was nothing to export.
pub fn write_export(path: &Path, fetched: &FetchedBridges, count: usize) -> Result<bool, StoreError> {
    let export = BridgeExport::from_fetch(fetched, count);
    if export.bridges.is_empty() {
        warn!("No obfs4 bridges fetched, leaving {} untouched", path.display());
        return Ok(false);
    }
    save_json(path, &export)?;
    info!("Exported {} bridge(s) to {}", export.bridges.len(), path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_exports_first_obfs4_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config").join("bridges.json");

        let mut fetched = FetchedBridges::new();
        fetched.insert(
            TransportClass::Obfs4Ipv4,
            ["obfs4 A", "obfs4 B", "obfs4 C"]
                .iter()
                .filter_map(BridgeLine::new)
                .collect(),
        );

        assert!(write_export(&path, &fetched, 2).unwrap());
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value, serde_json::json!({"bridges": ["obfs4 A", "obfs4 B"]}));
    }

    #[test]
    fn test_empty_fetch_skips_export() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridges.json");
        assert!(!write_export(&path, &FetchedBridges::new(), 2).unwrap());
        assert!(!path.exists());
    }
}
