//! Manual blacklist management.

use console::style;

use crate::bridges::BridgeLine;
use crate::config::Settings;
use crate::store::StateStore;

/// List blacklisted entry bridges with their failure counts.
pub async fn cmd_blacklist_list(settings: &Settings) -> anyhow::Result<()> {
    let store = StateStore::new(settings.paths.clone());
    let failures = store.load_failures();

    if failures.blacklist_len() == 0 {
        println!("{} No blacklisted bridges", style("!").yellow());
        return Ok(());
    }

    for bridge in failures.blacklisted() {
        println!(
            "{} {}",
            style(format!("[{} failures]", failures.attempts(bridge))).dim(),
            bridge
        );
    }
    println!("\n{} blacklisted", failures.blacklist_len());
    Ok(())
}

/// Clear one bridge, or every failure record when `line` is `None`.
pub async fn cmd_blacklist_clear(settings: &Settings, line: Option<&str>) -> anyhow::Result<()> {
    let store = StateStore::new(settings.paths.clone());
    let mut failures = store.load_failures();

    match line {
        Some(raw) => {
            let bridge = BridgeLine::new(raw)
                .ok_or_else(|| anyhow::anyhow!("Bridge line must not be empty"))?;
            if !failures.clear(&bridge) {
                println!("{} Bridge not found in failure records", style("!").yellow());
                return Ok(());
            }
            store.save_failures(&failures)?;
            println!("{} Cleared {}", style("✓").green(), bridge);
        }
        None => {
            let count = failures.blacklist_len();
            failures.clear_all();
            store.save_failures(&failures)?;
            println!(
                "{} Cleared {} blacklisted bridge(s) and all failure counts",
                style("✓").green(),
                count
            );
        }
    }

    Ok(())
}
