//! Entry bridge selection for the local Tor proxy.
//!
//! Only governs which bridge the supervised Tor process uses to reach the
//! network. The transports being scraped are a fixed set of endpoints.

use std::collections::{BTreeSet, HashSet};

use rand::Rng;
use thiserror::Error;

use super::BridgeLine;
use crate::store::{FailureRecord, History};

/// Neither the persisted pool nor the built-in defaults had a usable bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No usable entry bridge: pool and default bridges are all blacklisted or excluded")]
pub struct NoCandidateAvailable;

/// Pick the entry bridge for the next proxy launch.
///
/// The pool is the persisted obfs4 set minus the most recently used bridge,
/// minus blacklisted bridges, minus anything in `exclude` (bridges that
/// already failed during this run). When that leaves nothing, a random
/// non-blacklisted default bridge is used instead.
pub fn select_candidate(
    pool: &BTreeSet<BridgeLine>,
    history: &History,
    failures: &FailureRecord,
    defaults: &[BridgeLine],
    exclude: &HashSet<BridgeLine>,
) -> Result<BridgeLine, NoCandidateAvailable> {
    let last_used = history.last_used_bridge.as_ref();

    let candidates: Vec<&BridgeLine> = pool
        .iter()
        .filter(|line| Some(*line) != last_used)
        .filter(|line| !failures.is_blacklisted(line))
        .filter(|line| !exclude.contains(*line))
        .collect();

    if let Some(choice) = pick_random(&candidates) {
        return Ok(choice.clone());
    }

    let fallbacks: Vec<&BridgeLine> = defaults
        .iter()
        .filter(|line| !failures.is_blacklisted(line))
        .filter(|line| !exclude.contains(*line))
        .collect();

    match pick_random(&fallbacks) {
        Some(choice) => {
            tracing::info!("Bridge pool exhausted, falling back to a default bridge");
            Ok(choice.clone())
        }
        None => Err(NoCandidateAvailable),
    }
}

fn pick_random<'a>(candidates: &[&'a BridgeLine]) -> Option<&'a BridgeLine> {
    if candidates.is_empty() {
        return None;
    }
    let idx = rand::rng().random_range(0..candidates.len());
    Some(candidates[idx])
}
