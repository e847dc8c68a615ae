//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.appinsights.toml` files.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".appinsights.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Analysis service settings.
    #[serde(default)]
    pub compute: ComputeConfig,

    /// Durable store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Analysis service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Base URL of the analysis service.
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Number of competitors the service should return.
    #[serde(default = "default_num_results")]
    pub num_results: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            num_results: default_num_results(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_service_url() -> String {
    "http://localhost:8080/".to_string()
}

fn default_num_results() -> usize {
    10
}

fn default_timeout() -> u64 {
    300 // analyses usually take 1-3 minutes
}

/// Durable store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the analysis store.
    ///
    /// Defaults to `<platform data dir>/appinsights`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl StoreConfig {
    /// The directory the store should use.
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.data_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|dir| dir.join("appinsights"))
            .unwrap_or_else(|| PathBuf::from(".appinsights"))
    }
}

/// Report rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Characters of each app description shown before truncating.
    #[serde(default = "default_preview_chars")]
    pub description_preview_chars: usize,

    /// Include review quotes under each insight.
    #[serde(default = "default_true")]
    pub include_quotes: bool,

    /// Include sentiment labels under each insight.
    #[serde(default = "default_true")]
    pub include_sentiments: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            description_preview_chars: default_preview_chars(),
            include_quotes: true,
            include_sentiments: true,
        }
    }
}

fn default_preview_chars() -> usize {
    200
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.service_url {
            self.compute.service_url = url.clone();
        }
        if let Some(num_results) = args.num_results {
            self.compute.num_results = num_results;
        }
        if let Some(timeout) = args.timeout {
            self.compute.timeout_seconds = timeout;
        }
        if let Some(ref dir) = args.data_dir {
            self.store.data_dir = Some(dir.clone());
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.compute.num_results, 10);
        assert_eq!(config.compute.timeout_seconds, 300);
        assert_eq!(config.report.description_preview_chars, 200);
        assert_eq!(config.general.format, OutputFormat::Markdown);
        assert!(config.store.data_dir.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
format = "json"
verbose = true

[compute]
service_url = "https://insights.example.com/"
num_results = 5

[store]
data_dir = "/var/lib/appinsights"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.format, OutputFormat::Json);
        assert!(config.general.verbose);
        assert_eq!(config.compute.service_url, "https://insights.example.com/");
        assert_eq!(config.compute.num_results, 5);
        assert_eq!(config.compute.timeout_seconds, 300);
        assert_eq!(
            config.store.resolve_data_dir(),
            PathBuf::from("/var/lib/appinsights")
        );
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[compute]"));
        assert!(toml_str.contains("[report]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.compute.service_url, default_service_url());
    }

    #[test]
    fn test_resolve_data_dir_default_ends_with_app_name() {
        let dir = StoreConfig::default().resolve_data_dir();
        assert!(dir.ends_with("appinsights") || dir.ends_with(".appinsights"));
    }
}
