//! The `notify-failure` command.

use console::style;

use crate::config::Config;
use crate::notify::{failure_message, notifier_from_config, Report};

const DEFAULT_FAILURE_REASON: &str = "The Tor bridge fetching process encountered an error.";

/// Send a failure report on behalf of a crashed run.
pub async fn cmd_notify_failure(config: &Config, message: Option<&str>) -> anyhow::Result<()> {
    let reason = message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_FAILURE_REASON);

    let notifier = notifier_from_config(&config.notify)?;
    notifier.send(&Report::new(failure_message(reason))).await?;

    println!("{} Failure notification sent", style("✓").green());
    Ok(())
}
