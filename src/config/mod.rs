//! Configuration management for bridgefetch using the prefer crate.

pub mod fetch;
mod loader;
pub mod notify;
pub mod run;
pub mod tor;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::store::StorePaths;

pub use fetch::FetchConfig;
pub use loader::{load_settings_with_options, LoadOptions};
pub use notify::NotifyConfig;
pub use run::{RunConfig, SelectionConfig};
pub use tor::TorConfig;

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Tor process settings.
    #[serde(default)]
    pub tor: TorConfig,
    /// Listing fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Entry bridge selection settings.
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Run loop settings.
    #[serde(default)]
    pub run: RunConfig,
    /// Notification settings.
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers bridgefetch config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("bridgefetch").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("{}", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            // No config file found, use defaults with env overrides
            Err(_) => Self::default_with_env(),
        }
    }

    /// Create a default config with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        self.tor = self.tor.with_env_overrides();
        self.notify = self.notify.with_env_overrides();
        if let Ok(dir) = std::env::var("BRIDGEFETCH_DATA_DIR") {
            if !dir.is_empty() {
                self.data_dir = Some(dir);
            }
        }
        self
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Validate every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.fetch.validate()?;
        if self.selection.failure_threshold == 0 {
            return Err("selection.failure_threshold must be at least 1".to_string());
        }
        if self.run.max_cycles == 0 {
            return Err("run.max_cycles must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Resolved application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Locations of the persisted JSON documents.
    pub paths: StorePaths,
    /// Tor working directory (torrc, log, DataDirectory).
    pub tor_dir: PathBuf,
    /// Directory for generated archives.
    pub archive_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bridgefetch");
        Self::with_data_dir(data_dir)
    }
}

impl Settings {
    /// Create settings rooted at a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            paths: StorePaths::new(&data_dir),
            tor_dir: data_dir.join("tor"),
            archive_dir: data_dir.join("archives"),
            data_dir,
        }
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (label, dir) in [
            ("data", &self.data_dir),
            ("tor", &self.tor_dir),
            ("archive", &self.archive_dir),
        ] {
            std::fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        label,
                        dir.display(),
                        e
                    ),
                )
            })?;
        }
        Ok(())
    }
}
