//! The `run` command: one full acquisition run plus reporting.

use chrono::Utc;
use console::style;

use crate::archive::write_archive;
use crate::bridges::{FetchEngine, TransportClass};
use crate::config::{Config, Settings};
use crate::export::write_export;
use crate::notify::{notifier_from_config, Report};
use crate::runner::{RunFailure, RunOptions, RunOutcome, Runner};
use crate::store::StateStore;
use crate::tor::{CTorLauncher, ProxyError, Supervisor, SupervisorSettings};

/// Flags of the `run` subcommand.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub no_notify: bool,
    pub max_cycles: Option<u32>,
    pub min_new: Option<usize>,
}

fn build_supervisor(
    config: &Config,
    settings: &Settings,
) -> Result<Supervisor<CTorLauncher>, ProxyError> {
    let launcher = CTorLauncher::from_config(&config.tor)?;
    let supervisor_settings =
        SupervisorSettings::from_config(&config.tor, settings.tor_dir.clone())?;
    Ok(Supervisor::new(launcher, supervisor_settings))
}

/// Run the pipeline, then export, archive and report.
pub async fn cmd_run(
    settings: &Settings,
    config: &Config,
    args: RunArgs,
) -> anyhow::Result<RunOutcome> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    settings.ensure_directories()?;

    let mut options = RunOptions::from_config(config);
    if let Some(max_cycles) = args.max_cycles {
        options.max_cycles = max_cycles.max(1);
    }
    if let Some(min_new) = args.min_new {
        options.min_new_bridges = min_new;
    }

    let outcome = match build_supervisor(config, settings) {
        Ok(supervisor) => {
            let source = FetchEngine::new(config.fetch.clone());
            let store = StateStore::new(settings.paths.clone());
            Runner::new(supervisor, source, store, options).run().await
        }
        Err(e) => RunOutcome::Failure(RunFailure::ProxyLaunch(e.to_string())),
    };

    print_outcome(&outcome);

    if let (Some(path), Some(delta)) = (&config.run.export_path, outcome.delta()) {
        let path = config.resolve_path(&path.to_string_lossy(), &settings.data_dir);
        if let Err(e) = write_export(&path, &delta.fetched, config.run.export_count) {
            tracing::warn!("Export failed: {}", e);
        }
    }

    let mut report = Report::new(outcome.message());
    if let RunOutcome::Success(ref delta) = outcome {
        if config.run.archive {
            match write_archive(&settings.archive_dir, &delta.new_by_class, Utc::now()) {
                Ok(Some(path)) => report = report.with_attachment(path),
                Ok(None) => {}
                Err(e) => tracing::warn!("Archive failed: {}", e),
            }
        }
    }

    if !args.no_notify {
        let notifier = notifier_from_config(&config.notify)?;
        if let Err(e) = notifier.send(&report).await {
            eprintln!("{} Failed to send report: {}", style("!").yellow(), e);
        }
    }

    Ok(outcome)
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Success(delta) => {
            println!(
                "{} {} new bridge(s) in {} cycle(s)",
                style("✓").green(),
                delta.new_count(),
                delta.cycles
            );
            for class in TransportClass::ALL {
                let count = delta.new_by_class.get(&class).map_or(0, Vec::len);
                if count > 0 {
                    println!("  {:<16} {}", class.title(), count);
                }
            }
        }
        RunOutcome::NoNewData(delta) => {
            println!(
                "{} No new bridges ({} fetched, all known)",
                style("-").dim(),
                delta.fetched_count()
            );
        }
        RunOutcome::Failure(reason) => {
            eprintln!("{} {}", style("✗").red(), reason);
        }
    }
}
