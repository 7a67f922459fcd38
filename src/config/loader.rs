//! Configuration loading and merging logic.

use std::path::PathBuf;

use super::{Config, Settings};

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
    /// Data directory (--data-dir flag), overrides config and environment.
    pub data_dir: Option<PathBuf>,
}

/// Load config from an explicit path or via auto-discovery.
async fn load_file_config(options: &LoadOptions) -> Config {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        return match Config::load_from_path(config_path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Config::default_with_env()
            }
        };
    }

    // Priority 2: Auto-discover via prefer
    Config::load().await
}

/// Load settings and config, resolving every path the run needs.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = load_file_config(&options).await;

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd.clone()
    } else {
        config.base_dir().unwrap_or_else(|| cwd.clone())
    };

    let mut settings = if let Some(ref dir) = options.data_dir {
        Settings::with_data_dir(config.resolve_path(&dir.to_string_lossy(), &cwd))
    } else if let Some(ref dir) = config.data_dir {
        Settings::with_data_dir(config.resolve_path(dir, &base_dir))
    } else {
        Settings::default()
    };

    settings.tor_dir = config.tor.resolved_data_dir(&settings.data_dir);

    tracing::debug!("Data directory: {}", settings.data_dir.display());
    tracing::debug!("Tor directory: {}", settings.tor_dir.display());

    (settings, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_relative_data_dir_resolves_against_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridgefetch.toml");
        std::fs::write(&path, "data_dir = \"state\"\n").unwrap();

        let options = LoadOptions {
            config_path: Some(path),
            ..Default::default()
        };
        let (settings, _) = load_settings_with_options(options).await;
        assert_eq!(settings.data_dir, dir.path().join("state"));
        assert_eq!(settings.tor_dir, dir.path().join("state").join("tor"));
    }

    #[tokio::test]
    async fn test_cli_data_dir_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridgefetch.toml");
        std::fs::write(&path, "data_dir = \"state\"\n").unwrap();

        let override_dir = dir.path().join("override");
        let options = LoadOptions {
            config_path: Some(path),
            data_dir: Some(override_dir.clone()),
            ..Default::default()
        };
        let (settings, _) = load_settings_with_options(options).await;
        assert_eq!(settings.data_dir, override_dir);
        assert_eq!(settings.paths.history, override_dir.join("history.json"));
    }

    #[tokio::test]
    async fn test_explicit_tor_dir_is_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bridgefetch.toml");
        std::fs::write(
            &path,
            "data_dir = \"/srv/bridges\"\n[tor]\ndata_dir = \"/run/tor-client\"\n",
        )
        .unwrap();

        let options = LoadOptions {
            config_path: Some(path),
            ..Default::default()
        };
        let (settings, _) = load_settings_with_options(options).await;
        assert_eq!(settings.data_dir, PathBuf::from("/srv/bridges"));
        assert_eq!(settings.tor_dir, PathBuf::from("/run/tor-client"));
    }
}
