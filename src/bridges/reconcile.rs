//! Merge freshly fetched lines into the persisted sets.

use std::collections::BTreeSet;

use super::{BridgeLine, BridgeSets, FetchedBridges, TransportClass};

/// Outcome of merging one fetch pass into the persisted state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Lines not known under any transport class before this pass, in page
    /// order. Every class is present, possibly with an empty list.
    pub new_by_class: FetchedBridges,
    /// Persisted sets with this pass merged in.
    pub updated: BridgeSets,
}

impl Reconciliation {
    pub fn new_count(&self) -> usize {
        super::total_lines(&self.new_by_class)
    }

    pub fn has_new(&self) -> bool {
        self.new_count() > 0
    }
}

/// Compute the new lines per class and the merged sets.
///
/// A line counts as new only if it is absent from every persisted class and
/// has not already been reported under an earlier class in this pass. Sets
/// only ever grow.
pub fn reconcile(fetched: &FetchedBridges, persisted: &BridgeSets) -> Reconciliation {
    let mut known: BTreeSet<&BridgeLine> = persisted.values().flatten().collect();
    let mut new_by_class = FetchedBridges::new();
    let mut updated = persisted.clone();

    for class in TransportClass::ALL {
        let lines = fetched.get(&class).map(Vec::as_slice).unwrap_or_default();
        let mut fresh = Vec::new();
        for line in lines {
            if known.insert(line) {
                fresh.push(line.clone());
            }
        }
        new_by_class.insert(class, fresh);

        updated
            .entry(class)
            .or_default()
            .extend(lines.iter().cloned());
    }

    Reconciliation {
        new_by_class,
        updated,
    }
}
