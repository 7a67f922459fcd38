//! Per-transport bridge set documents.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::bridges::BridgeLine;

/// On-disk shape of `<transport>_bridges.json`: sorted, unique lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSetFile {
    #[serde(default)]
    pub bridges: Vec<String>,
}

impl BridgeSetFile {
    pub fn from_set(set: &BTreeSet<BridgeLine>) -> Self {
        Self {
            bridges: set.iter().map(|line| line.as_str().to_string()).collect(),
        }
    }

    /// Convert to a set, trimming lines and dropping blanks and duplicates.
    pub fn into_set(self) -> BTreeSet<BridgeLine> {
        self.bridges.into_iter().filter_map(BridgeLine::new).collect()
    }
}
