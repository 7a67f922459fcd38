//! Entry bridge usage history.

use serde::{Deserialize, Serialize};

use crate::bridges::BridgeLine;

/// Which bridges have served as the local proxy's entry point, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    #[serde(default)]
    pub last_used_bridge: Option<BridgeLine>,
    #[serde(default)]
    pub used_bridges: Vec<BridgeLine>,
}

impl History {
    /// Record a successful use. The sequence is append-only.
    pub fn record_use(&mut self, bridge: &BridgeLine) {
        self.last_used_bridge = Some(bridge.clone());
        self.used_bridges.push(bridge.clone());
    }
}
