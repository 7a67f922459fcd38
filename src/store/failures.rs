//! Bootstrap failure counters and the entry bridge blacklist.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::bridges::BridgeLine;

/// Failure attempts per entry bridge plus the resulting blacklist.
///
/// Blacklisting is monotonic: the engine only ever adds entries. Removal
/// happens exclusively through [`FailureRecord::clear`] and
/// [`FailureRecord::clear_all`], which back the manual CLI command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FailureFile", into = "FailureFile")]
pub struct FailureRecord {
    blacklisted: BTreeSet<BridgeLine>,
    attempts: BTreeMap<BridgeLine, u32>,
}

impl FailureRecord {
    /// Count one bootstrap failure. Returns `true` if this failure pushed the
    /// bridge onto the blacklist.
    pub fn record_failure(&mut self, bridge: &BridgeLine, threshold: u32) -> bool {
        let count = self.attempts.entry(bridge.clone()).or_insert(0);
        *count += 1;
        if *count >= threshold && !self.blacklisted.contains(bridge) {
            self.blacklisted.insert(bridge.clone());
            return true;
        }
        false
    }

    pub fn is_blacklisted(&self, bridge: &BridgeLine) -> bool {
        self.blacklisted.contains(bridge)
    }

    pub fn attempts(&self, bridge: &BridgeLine) -> u32 {
        self.attempts.get(bridge).copied().unwrap_or(0)
    }

    pub fn blacklisted(&self) -> impl Iterator<Item = &BridgeLine> {
        self.blacklisted.iter()
    }

    pub fn blacklist_len(&self) -> usize {
        self.blacklisted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blacklisted.is_empty() && self.attempts.is_empty()
    }

    /// Forget everything about one bridge. Returns whether it was known.
    pub fn clear(&mut self, bridge: &BridgeLine) -> bool {
        let was_listed = self.blacklisted.remove(bridge);
        let had_attempts = self.attempts.remove(bridge).is_some();
        was_listed || had_attempts
    }

    /// Forget all failures and blacklist entries.
    pub fn clear_all(&mut self) {
        self.blacklisted.clear();
        self.attempts.clear();
    }
}

/// On-disk shape of `failedBridges.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FailureFile {
    #[serde(rename = "failedBridges", default)]
    failed_bridges: FailedBridges,
    #[serde(default)]
    attempts: BTreeMap<String, u32>,
}

/// Older files stored the blacklist as a plain list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum FailedBridges {
    Map(BTreeMap<String, bool>),
    List(Vec<String>),
}

impl Default for FailedBridges {
    fn default() -> Self {
        FailedBridges::Map(BTreeMap::new())
    }
}

impl From<FailureFile> for FailureRecord {
    fn from(file: FailureFile) -> Self {
        let blacklisted = match file.failed_bridges {
            FailedBridges::Map(map) => map
                .into_iter()
                .filter(|(_, listed)| *listed)
                .filter_map(|(line, _)| BridgeLine::new(line))
                .collect(),
            FailedBridges::List(list) => list.into_iter().filter_map(BridgeLine::new).collect(),
        };
        let attempts = file
            .attempts
            .into_iter()
            .filter_map(|(line, count)| BridgeLine::new(line).map(|l| (l, count)))
            .collect();
        Self {
            blacklisted,
            attempts,
        }
    }
}

impl From<FailureRecord> for FailureFile {
    fn from(record: FailureRecord) -> Self {
        Self {
            failed_bridges: FailedBridges::Map(
                record
                    .blacklisted
                    .into_iter()
                    .map(|line| (line.into(), true))
                    .collect(),
            ),
            attempts: record
                .attempts
                .into_iter()
                .map(|(line, count)| (line.into(), count))
                .collect(),
        }
    }
}
