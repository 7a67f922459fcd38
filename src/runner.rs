//! One acquisition run: proxy up, fetch, reconcile, persist.
//!
//! A run is a sequence of cycles. Each cycle picks an entry bridge,
//! bootstraps the local proxy on it, fetches every listing through the proxy,
//! and merges the result into the persisted sets. Cycles repeat until enough
//! new lines have been found or the cycle budget is spent. Every run ends in a
//! [`RunOutcome`]; nothing escapes as an error.

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::bridges::{
    reconcile, select_candidate, total_lines, BridgeLine, BridgeSource, FetchedBridges,
    TransportClass,
};
use crate::config::Config;
use crate::notify::{failure_message, no_new_message, success_message};
use crate::store::{FailureRecord, History, StateStore, StoreError};
use crate::tor::{ProxySession, Supervisor, TorLauncher};

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunFailure {
    #[error("No entry bridge candidate available")]
    NoCandidate,
    #[error("Tor failed to bootstrap with {attempts} candidate bridge(s)")]
    ProxyUnavailable { attempts: u32 },
    #[error("Tor could not be started: {0}")]
    ProxyLaunch(String),
    #[error("Fetching bridges failed: {0}")]
    FetchFailed(String),
    #[error("Saving state failed: {0}")]
    Persistence(String),
}

impl From<StoreError> for RunFailure {
    fn from(e: StoreError) -> Self {
        RunFailure::Persistence(e.to_string())
    }
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    /// Lines that were not known before this run.
    pub new_by_class: FetchedBridges,
    /// Everything fetched across all cycles, in fetch order.
    pub fetched: FetchedBridges,
    /// Entry bridges the proxy bootstrapped on, one per cycle.
    pub entry_bridges: Vec<BridgeLine>,
    pub cycles: u32,
}

impl Delta {
    pub fn new_count(&self) -> usize {
        total_lines(&self.new_by_class)
    }

    pub fn fetched_count(&self) -> usize {
        total_lines(&self.fetched)
    }

    fn absorb(&mut self, cycle: CycleResult) {
        for (class, lines) in cycle.new_by_class {
            self.new_by_class.entry(class).or_default().extend(lines);
        }
        for (class, lines) in cycle.fetched {
            self.fetched.entry(class).or_default().extend(lines);
        }
        self.entry_bridges.push(cycle.entry_bridge);
        self.cycles += 1;
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success(Delta),
    NoNewData(Delta),
    Failure(RunFailure),
}

impl RunOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::Failure(_))
    }

    /// Report text for the notifier.
    pub fn message(&self) -> String {
        match self {
            RunOutcome::Success(delta) => success_message(&delta.new_by_class),
            RunOutcome::NoNewData(delta) => no_new_message(delta.fetched_count()),
            RunOutcome::Failure(reason) => failure_message(&reason.to_string()),
        }
    }

    pub fn delta(&self) -> Option<&Delta> {
        match self {
            RunOutcome::Success(delta) | RunOutcome::NoNewData(delta) => Some(delta),
            RunOutcome::Failure(_) => None,
        }
    }
}

/// Policy knobs for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub min_new_bridges: usize,
    pub max_cycles: u32,
    pub cycle_delay: Duration,
    pub failure_threshold: u32,
    pub max_candidate_attempts: u32,
    pub default_bridges: Vec<BridgeLine>,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_new_bridges: config.run.min_new_bridges,
            max_cycles: config.run.max_cycles.max(1),
            cycle_delay: config.run.cycle_delay(),
            failure_threshold: config.selection.failure_threshold.max(1),
            max_candidate_attempts: config.selection.max_candidate_attempts.max(1),
            default_bridges: config.selection.default_bridge_lines(),
        }
    }
}

struct CycleResult {
    new_by_class: FetchedBridges,
    fetched: FetchedBridges,
    entry_bridge: BridgeLine,
}

/// Drives cycles against a proxy supervisor, a listing source and the store.
pub struct Runner<L: TorLauncher, S: BridgeSource> {
    supervisor: Supervisor<L>,
    source: S,
    store: StateStore,
    options: RunOptions,
}

impl<L: TorLauncher, S: BridgeSource> Runner<L, S> {
    pub fn new(supervisor: Supervisor<L>, source: S, store: StateStore, options: RunOptions) -> Self {
        Self {
            supervisor,
            source,
            store,
            options,
        }
    }

    /// Run cycles until enough new lines are found or the budget is spent.
    ///
    /// A failing cycle fails the run only when it is the first one. Later
    /// failures end the run with what earlier cycles already persisted, since
    /// those lines would never be reported as new again.
    pub async fn run(&mut self) -> RunOutcome {
        let mut delta = Delta::default();
        // Entry bridges that failed to bootstrap anywhere in this run
        let mut exclude = HashSet::new();

        for cycle in 1..=self.options.max_cycles {
            if cycle > 1 {
                info!(
                    "Only {} new bridge(s) so far, waiting {}s before cycle {}",
                    delta.new_count(),
                    self.options.cycle_delay.as_secs(),
                    cycle
                );
                tokio::time::sleep(self.options.cycle_delay).await;
            }

            match self.cycle(&mut exclude).await {
                Ok(result) => delta.absorb(result),
                Err(reason) if delta.cycles == 0 => {
                    error!("Run failed: {}", reason);
                    return RunOutcome::Failure(reason);
                }
                Err(reason) => {
                    warn!(
                        "Cycle {} failed, keeping results of {} earlier cycle(s): {}",
                        cycle, delta.cycles, reason
                    );
                    break;
                }
            }

            if delta.new_count() >= self.options.min_new_bridges {
                break;
            }
        }

        if delta.new_count() > 0 {
            info!(
                "Found {} new bridge(s) in {} cycle(s)",
                delta.new_count(),
                delta.cycles
            );
            RunOutcome::Success(delta)
        } else {
            info!("No new bridges after {} cycle(s)", delta.cycles);
            RunOutcome::NoNewData(delta)
        }
    }

    async fn cycle(
        &mut self,
        exclude: &mut HashSet<BridgeLine>,
    ) -> Result<CycleResult, RunFailure> {
        let mut history = self.store.load_history();
        let mut failures = self.store.load_failures();

        let session = self
            .acquire_proxy(&history, &mut failures, exclude)
            .await?;
        let entry_bridge = session.bridge().clone();

        let blacklist: HashSet<BridgeLine> = failures.blacklisted().cloned().collect();
        let fetched = self
            .source
            .fetch_all(session.socks_url(), &blacklist)
            .await;
        self.supervisor.shutdown(session).await;
        let fetched = fetched.map_err(|e| RunFailure::FetchFailed(e.to_string()))?;

        history.record_use(&entry_bridge);
        self.store.save_history(&history)?;

        let reconciliation = reconcile(&fetched, &self.store.load_bridge_sets());
        let changed = self.store.save_bridge_sets(&reconciliation.updated)?;
        info!(
            "Fetched {} line(s), {} new, {} set file(s) updated",
            total_lines(&fetched),
            reconciliation.new_count(),
            changed
        );

        Ok(CycleResult {
            new_by_class: reconciliation.new_by_class,
            fetched,
            entry_bridge,
        })
    }

    /// Try candidates until one bootstraps. Timeouts are charged to the
    /// candidate and persisted before the next attempt.
    async fn acquire_proxy(
        &mut self,
        history: &History,
        failures: &mut FailureRecord,
        exclude: &mut HashSet<BridgeLine>,
    ) -> Result<ProxySession<L::Handle>, RunFailure> {
        let pool = self
            .store
            .load_bridge_sets()
            .remove(&TransportClass::Obfs4Ipv4)
            .unwrap_or_default();

        for attempt in 1..=self.options.max_candidate_attempts {
            let candidate = match select_candidate(
                &pool,
                history,
                failures,
                &self.options.default_bridges,
                exclude,
            ) {
                Ok(candidate) => candidate,
                Err(_) if attempt == 1 => return Err(RunFailure::NoCandidate),
                Err(_) => {
                    return Err(RunFailure::ProxyUnavailable {
                        attempts: attempt - 1,
                    })
                }
            };

            info!(
                "Bootstrapping Tor via {} (attempt {}/{})",
                candidate.transport_name(),
                attempt,
                self.options.max_candidate_attempts
            );

            match self.supervisor.acquire(&candidate).await {
                Ok(session) => return Ok(session),
                Err(e) if e.is_candidate_failure() => {
                    warn!("{}", e);
                    if failures.record_failure(&candidate, self.options.failure_threshold) {
                        warn!("Blacklisted entry bridge: {}", candidate);
                    }
                    self.store.save_failures(failures)?;
                    exclude.insert(candidate);
                }
                Err(e) => return Err(RunFailure::ProxyLaunch(e.to_string())),
            }
        }

        Err(RunFailure::ProxyUnavailable {
            attempts: self.options.max_candidate_attempts,
        })
    }
}
