//! The `status` command.

use console::style;

use crate::bridges::TransportClass;
use crate::config::Settings;
use crate::store::StateStore;

/// Show persisted bridge counts, entry bridge history and blacklist size.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let store = StateStore::new(settings.paths.clone());
    let sets = store.load_bridge_sets();
    let history = store.load_history();
    let failures = store.load_failures();

    println!("\n{}", style("Bridge Status").bold());
    println!("{}", "-".repeat(40));
    println!("{:<16} {}", "Data dir:", settings.data_dir.display());

    for class in TransportClass::ALL {
        let count = sets.get(&class).map_or(0, |set| set.len());
        println!("{:<16} {}", format!("{}:", class.title()), count);
    }

    println!();
    match history.last_used_bridge {
        Some(ref bridge) => println!("{:<16} {}", "Last entry:", bridge),
        None => println!("{:<16} {}", "Last entry:", style("never").dim()),
    }
    println!("{:<16} {}", "Entries used:", history.used_bridges.len());

    let blacklisted = failures.blacklist_len();
    let count = if blacklisted > 0 {
        style(blacklisted.to_string()).yellow()
    } else {
        style(blacklisted.to_string()).green()
    };
    println!("{:<16} {}", "Blacklisted:", count);

    Ok(())
}
