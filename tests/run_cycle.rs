//! End-to-end runs against a fake Tor launcher and a fake listing source.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bridgefetch::bridges::{
    BridgeLine, BridgeSets, BridgeSource, FetchEngine, FetchError, FetchedBridges,
    TransportClass,
};
use bridgefetch::config::FetchConfig;
use bridgefetch::runner::{RunFailure, RunOptions, RunOutcome, Runner};
use bridgefetch::store::{StateStore, StorePaths};
use bridgefetch::tor::{
    ProxyError, Readiness, Supervisor, SupervisorSettings, TorLauncher, TorrcSpec,
};
use tempfile::tempdir;

fn line(s: &str) -> BridgeLine {
    BridgeLine::new(s).unwrap()
}

/// Bootstraps every bridge except the ones listed as dead.
#[derive(Clone, Default)]
struct FakeLauncher {
    dead: Arc<HashSet<BridgeLine>>,
    launch_error: bool,
    started: Arc<Mutex<Vec<BridgeLine>>>,
}

impl FakeLauncher {
    fn with_dead(dead: &[&str]) -> Self {
        Self {
            dead: Arc::new(dead.iter().map(|s| line(s)).collect()),
            ..Default::default()
        }
    }

    fn started(&self) -> Vec<BridgeLine> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl TorLauncher for FakeLauncher {
    type Handle = bool;

    async fn terminate_existing(&self) {}

    async fn start(&self, spec: &TorrcSpec) -> Result<bool, ProxyError> {
        if self.launch_error {
            return Err(ProxyError::Launch("tor: not found".to_string()));
        }
        self.started.lock().unwrap().push(spec.bridge.clone());
        Ok(!self.dead.contains(&spec.bridge))
    }

    async fn check_ready(&self, handle: &mut bool) -> Readiness {
        if *handle {
            Readiness::Ready
        } else {
            Readiness::Pending
        }
    }

    async fn stop(&self, _handle: bool) {}
}

/// Serves a scripted listing per call; the last script repeats.
#[derive(Clone)]
struct FakeSource {
    scripts: Arc<Vec<FetchedBridges>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeSource {
    fn new(scripts: Vec<FetchedBridges>) -> Self {
        Self {
            scripts: Arc::new(scripts),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BridgeSource for FakeSource {
    async fn fetch_all(
        &self,
        proxy_url: &str,
        blacklist: &HashSet<BridgeLine>,
    ) -> Result<FetchedBridges, FetchError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(proxy_url.to_string());
            calls.len() - 1
        };
        let script = &self.scripts[call.min(self.scripts.len() - 1)];
        Ok(script
            .iter()
            .map(|(class, lines)| {
                let kept = lines
                    .iter()
                    .filter(|l| !blacklist.contains(*l))
                    .cloned()
                    .collect();
                (*class, kept)
            })
            .collect())
    }
}

fn obfs4(lines: &[&str]) -> FetchedBridges {
    let mut fetched = FetchedBridges::new();
    fetched.insert(
        TransportClass::Obfs4Ipv4,
        lines.iter().map(|s| line(s)).collect(),
    );
    fetched
}

fn settings(dir: &Path) -> SupervisorSettings {
    SupervisorSettings {
        tor_dir: dir.join("tor"),
        transport_plugin: PathBuf::from("/usr/bin/lyrebird"),
        socks_port: 19050,
        control_port: 19051,
        bootstrap_timeout: Duration::from_secs(180),
        poll_interval: Duration::from_secs(10),
    }
}

fn options(defaults: &[&str]) -> RunOptions {
    RunOptions {
        min_new_bridges: 1,
        max_cycles: 1,
        cycle_delay: Duration::from_secs(10),
        failure_threshold: 2,
        max_candidate_attempts: 3,
        default_bridges: defaults.iter().map(|s| line(s)).collect(),
    }
}

fn seed_pool(store: &StateStore, lines: &[&str]) {
    let mut sets = BridgeSets::new();
    sets.insert(
        TransportClass::Obfs4Ipv4,
        lines.iter().map(|s| line(s)).collect::<BTreeSet<_>>(),
    );
    store.save_bridge_sets(&sets).unwrap();
}

async fn run_once(
    dir: &Path,
    launcher: &FakeLauncher,
    source: &FakeSource,
    options: RunOptions,
) -> RunOutcome {
    let supervisor = Supervisor::new(launcher.clone(), settings(dir));
    let store = StateStore::new(StorePaths::new(dir));
    Runner::new(supervisor, source.clone(), store, options)
        .run()
        .await
}

#[tokio::test(start_paused = true)]
async fn test_new_bridges_are_persisted_and_reported() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(StorePaths::new(dir.path()));
    seed_pool(&store, &["obfs4 L1"]);

    let launcher = FakeLauncher::default();
    let source = FakeSource::new(vec![obfs4(&["obfs4 L1", "obfs4 L2"])]);

    let outcome = run_once(dir.path(), &launcher, &source, options(&[])).await;
    let delta = match outcome {
        RunOutcome::Success(delta) => delta,
        other => panic!("expected success, got {:?}", other),
    };
    assert_eq!(
        delta.new_by_class[&TransportClass::Obfs4Ipv4],
        vec![line("obfs4 L2")]
    );
    assert_eq!(source.calls(), vec!["socks5h://127.0.0.1:19050"]);

    let raw = std::fs::read_to_string(dir.path().join("obfs4_bridges.json")).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed, serde_json::json!({"bridges": ["obfs4 L1", "obfs4 L2"]}));

    let history = store.load_history();
    assert_eq!(history.last_used_bridge, Some(line("obfs4 L1")));
    assert_eq!(history.used_bridges, vec![line("obfs4 L1")]);
}

#[tokio::test(start_paused = true)]
async fn test_rerun_without_new_data_leaves_sets_untouched() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(StorePaths::new(dir.path()));
    seed_pool(&store, &["obfs4 L1", "obfs4 L2"]);
    let before = std::fs::read(dir.path().join("obfs4_bridges.json")).unwrap();

    let launcher = FakeLauncher::default();
    let source = FakeSource::new(vec![obfs4(&["obfs4 L2", "obfs4 L1"])]);

    let first = run_once(dir.path(), &launcher, &source, options(&[])).await;
    assert!(matches!(first, RunOutcome::NoNewData(_)));
    let second = run_once(dir.path(), &launcher, &source, options(&[])).await;
    assert!(matches!(second, RunOutcome::NoNewData(_)));

    let after = std::fs::read(dir.path().join("obfs4_bridges.json")).unwrap();
    assert_eq!(before, after);

    // The second run avoids the entry bridge used by the first
    let started = launcher.started();
    assert_eq!(started.len(), 2);
    assert_ne!(started[0], started[1]);
    assert_eq!(store.load_history().used_bridges, started);
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_timeout_counts_one_failure_and_falls_back() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(StorePaths::new(dir.path()));
    seed_pool(&store, &["obfs4 DEAD"]);

    let launcher = FakeLauncher::with_dead(&["obfs4 DEAD"]);
    let source = FakeSource::new(vec![obfs4(&["obfs4 NEW"])]);

    let start = tokio::time::Instant::now();
    let outcome = run_once(dir.path(), &launcher, &source, options(&["obfs4 DEFAULT"])).await;
    assert!(matches!(outcome, RunOutcome::Success(_)));
    // Full budget spent on the dead bridge, then one poll on the default
    assert_eq!(start.elapsed(), Duration::from_secs(190));

    assert_eq!(
        launcher.started(),
        vec![line("obfs4 DEAD"), line("obfs4 DEFAULT")]
    );
    let failures = store.load_failures();
    assert_eq!(failures.attempts(&line("obfs4 DEAD")), 1);
    assert!(!failures.is_blacklisted(&line("obfs4 DEAD")));
    assert_eq!(
        store.load_history().last_used_bridge,
        Some(line("obfs4 DEFAULT"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_repeated_failures_blacklist_the_bridge() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(StorePaths::new(dir.path()));
    seed_pool(&store, &["obfs4 DEAD"]);

    let launcher = FakeLauncher::with_dead(&["obfs4 DEAD"]);
    let source = FakeSource::new(vec![obfs4(&[])]);

    for _ in 0..3 {
        let outcome = run_once(dir.path(), &launcher, &source, options(&["obfs4 DEFAULT"])).await;
        assert!(matches!(outcome, RunOutcome::NoNewData(_)));
    }

    let failures = store.load_failures();
    assert_eq!(failures.attempts(&line("obfs4 DEAD")), 2);
    assert!(failures.is_blacklisted(&line("obfs4 DEAD")));

    // Third run never tried the blacklisted bridge
    assert_eq!(
        launcher.started(),
        vec![
            line("obfs4 DEAD"),
            line("obfs4 DEFAULT"),
            line("obfs4 DEAD"),
            line("obfs4 DEFAULT"),
            line("obfs4 DEFAULT"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_blacklisted_lines_are_not_reported() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(StorePaths::new(dir.path()));
    let mut failures = store.load_failures();
    failures.record_failure(&line("obfs4 BAD"), 1);
    store.save_failures(&failures).unwrap();

    let launcher = FakeLauncher::default();
    let source = FakeSource::new(vec![obfs4(&["obfs4 BAD", "obfs4 GOOD"])]);

    let outcome = run_once(dir.path(), &launcher, &source, options(&["obfs4 DEFAULT"])).await;
    match outcome {
        RunOutcome::Success(delta) => assert_eq!(
            delta.new_by_class[&TransportClass::Obfs4Ipv4],
            vec![line("obfs4 GOOD")]
        ),
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_candidate_fails_the_run() {
    let dir = tempdir().unwrap();
    let launcher = FakeLauncher::default();
    let source = FakeSource::new(vec![obfs4(&["obfs4 X"])]);

    let outcome = run_once(dir.path(), &launcher, &source, options(&[])).await;
    assert_eq!(outcome, RunOutcome::Failure(RunFailure::NoCandidate));
    assert!(source.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_every_candidate_failing_fails_the_run() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(StorePaths::new(dir.path()));
    seed_pool(&store, &["obfs4 A", "obfs4 B", "obfs4 C", "obfs4 D"]);

    let launcher = FakeLauncher::with_dead(&["obfs4 A", "obfs4 B", "obfs4 C", "obfs4 D"]);
    let source = FakeSource::new(vec![obfs4(&[])]);

    let outcome = run_once(dir.path(), &launcher, &source, options(&[])).await;
    assert_eq!(
        outcome,
        RunOutcome::Failure(RunFailure::ProxyUnavailable { attempts: 3 })
    );
    assert!(outcome.is_failure());

    // Three distinct candidates, one failure each
    let started: HashSet<BridgeLine> = launcher.started().into_iter().collect();
    assert_eq!(started.len(), 3);
    let failures = store.load_failures();
    for bridge in &started {
        assert_eq!(failures.attempts(bridge), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_launch_error_is_not_charged_to_the_bridge() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(StorePaths::new(dir.path()));
    seed_pool(&store, &["obfs4 A"]);

    let launcher = FakeLauncher {
        launch_error: true,
        ..Default::default()
    };
    let source = FakeSource::new(vec![obfs4(&[])]);

    let outcome = run_once(dir.path(), &launcher, &source, options(&[])).await;
    assert!(matches!(
        outcome,
        RunOutcome::Failure(RunFailure::ProxyLaunch(_))
    ));
    assert!(store.load_failures().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cycles_until_enough_new_bridges() {
    let dir = tempdir().unwrap();
    let launcher = FakeLauncher::default();
    let source = FakeSource::new(vec![
        obfs4(&["obfs4 N1"]),
        obfs4(&["obfs4 N1"]),
        obfs4(&["obfs4 N2"]),
        obfs4(&["obfs4 N3"]),
    ]);
    let mut opts = options(&["obfs4 DEFAULT"]);
    opts.min_new_bridges = 2;
    opts.max_cycles = 5;

    let outcome = run_once(dir.path(), &launcher, &source, opts).await;
    let delta = match outcome {
        RunOutcome::Success(delta) => delta,
        other => panic!("expected success, got {:?}", other),
    };
    assert_eq!(delta.cycles, 3);
    assert_eq!(
        delta.new_by_class[&TransportClass::Obfs4Ipv4],
        vec![line("obfs4 N1"), line("obfs4 N2")]
    );
    assert_eq!(delta.fetched_count(), 3);
    assert_eq!(source.calls().len(), 3);
}

#[tokio::test]
async fn test_unreachable_listings_fail_the_run() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(StorePaths::new(dir.path()));
    seed_pool(&store, &["obfs4 L1"]);
    let before = std::fs::read(dir.path().join("obfs4_bridges.json")).unwrap();

    let mut config = FetchConfig {
        max_attempts: 2,
        retry_delay_secs: 0,
        timeout_secs: 2,
        ..Default::default()
    };
    for class in TransportClass::ALL {
        config
            .endpoints
            .insert(class.as_str().to_string(), "http://127.0.0.1:9/".to_string());
    }

    let mut tor = settings(dir.path());
    tor.poll_interval = Duration::from_millis(1);
    tor.bootstrap_timeout = Duration::from_millis(10);
    let supervisor = Supervisor::new(FakeLauncher::default(), tor);
    let mut runner = Runner::new(supervisor, FetchEngine::new(config), store, options(&[]));

    let outcome = runner.run().await;
    assert!(outcome.is_failure());
    assert!(matches!(
        outcome,
        RunOutcome::Failure(RunFailure::FetchFailed(_))
    ));
    assert!(outcome.message().contains("Bridge fetch failed"));

    let after = std::fs::read(dir.path().join("obfs4_bridges.json")).unwrap();
    assert_eq!(before, after);
}

#[tokio::test(start_paused = true)]
async fn test_later_cycle_failure_keeps_earlier_results() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(StorePaths::new(dir.path()));

    // N1 is listed by the distributor but cannot carry the proxy
    let launcher = FakeLauncher::with_dead(&["obfs4 N1"]);
    let source = FakeSource::new(vec![obfs4(&["obfs4 N1"])]);
    let mut opts = options(&["obfs4 DEFAULT"]);
    opts.min_new_bridges = 2;
    opts.max_cycles = 3;
    opts.max_candidate_attempts = 1;

    let outcome = run_once(dir.path(), &launcher, &source, opts).await;
    let delta = match outcome {
        RunOutcome::Success(delta) => delta,
        other => panic!("expected success, got {:?}", other),
    };
    assert_eq!(delta.cycles, 1);
    assert_eq!(
        delta.new_by_class[&TransportClass::Obfs4Ipv4],
        vec![line("obfs4 N1")]
    );
    assert_eq!(
        launcher.started(),
        vec![line("obfs4 DEFAULT"), line("obfs4 N1")]
    );
    assert_eq!(store.load_failures().attempts(&line("obfs4 N1")), 1);
    assert_eq!(source.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_candidate_stays_excluded_across_cycles() {
    let dir = tempdir().unwrap();
    let store = StateStore::new(StorePaths::new(dir.path()));
    seed_pool(&store, &["obfs4 A"]);

    let launcher = FakeLauncher::with_dead(&["obfs4 A"]);
    let source = FakeSource::new(vec![obfs4(&[])]);
    let mut opts = options(&["obfs4 D"]);
    opts.failure_threshold = 3;
    opts.max_cycles = 2;

    let outcome = run_once(dir.path(), &launcher, &source, opts).await;
    let delta = match outcome {
        RunOutcome::NoNewData(delta) => delta,
        other => panic!("expected no new data, got {:?}", other),
    };
    assert_eq!(delta.cycles, 2);
    assert_eq!(
        launcher.started(),
        vec![line("obfs4 A"), line("obfs4 D"), line("obfs4 D")]
    );
    assert_eq!(store.load_failures().attempts(&line("obfs4 A")), 1);
}
