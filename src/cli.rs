//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// AppInsights - AI competitive analyses for mobile apps
///
/// Browse your previous analyses, open one, or run a new analysis of an
/// app against its competitors. Results are cached per user, app and region.
///
/// Examples:
///   appinsights --user alice --list
///   appinsights --user alice --open "com.instagram.android;de"
///   appinsights --user alice --app com.instagram.android --region de
///   appinsights --user alice --app com.instagram.android --region de --refresh
///   appinsights --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Signed-in user id
    ///
    /// Every analysis is stored under this user's namespace.
    #[arg(
        short,
        long,
        env = "APPINSIGHTS_USER",
        required_unless_present = "init_config"
    )]
    pub user: Option<String>,

    /// List previous analyses, newest first
    #[arg(short, long, conflicts_with_all = ["open", "app"])]
    pub list: bool,

    /// Open a previous analysis by its key (e.g. "com.instagram.android;de")
    #[arg(long, value_name = "KEY", conflicts_with = "app")]
    pub open: Option<String>,

    /// Application id to analyze
    #[arg(short, long, value_name = "APP_ID", requires = "region")]
    pub app: Option<String>,

    /// Two-letter store region
    #[arg(short, long, value_name = "CC", requires = "app")]
    pub region: Option<String>,

    /// Run a fresh analysis even if one is already stored
    #[arg(long, requires = "app")]
    pub refresh: bool,

    /// Analysis service URL
    #[arg(long, value_name = "URL", env = "APPINSIGHTS_SERVICE_URL")]
    pub service_url: Option<String>,

    /// Number of competitors to request
    #[arg(long, value_name = "COUNT")]
    pub num_results: Option<usize>,

    /// Analysis request timeout in seconds
    ///
    /// Analyses usually take one to three minutes. Default: from config or 300s.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Directory of the analysis store
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Write the rendered view to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .appinsights.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .appinsights.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for rendered views.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// What the invocation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    List,
    Open(String),
    Analyze {
        app_id: String,
        region: String,
        refresh: bool,
    },
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The requested mode; `None` when no mode flag was given.
    pub fn mode(&self) -> Option<Mode> {
        if self.list {
            return Some(Mode::List);
        }
        if let Some(ref key) = self.open {
            return Some(Mode::Open(key.clone()));
        }
        match (&self.app, &self.region) {
            (Some(app_id), Some(region)) => Some(Mode::Analyze {
                app_id: app_id.clone(),
                region: region.clone(),
                refresh: self.refresh,
            }),
            _ => None,
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let modes = [self.list, self.open.is_some(), self.app.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if modes == 0 {
            return Err("One of --list, --open or --app/--region is required".to_string());
        }
        if modes > 1 {
            return Err("Use only one of --list, --open or --app/--region".to_string());
        }
        if self.app.is_some() != self.region.is_some() {
            return Err("--app and --region must be given together".to_string());
        }

        if let Some(ref url) = self.service_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Service URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.num_results == Some(0) {
            return Err("Number of results must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            user: Some("alice".to_string()),
            list: false,
            open: None,
            app: Some("com.instagram.android".to_string()),
            region: Some("de".to_string()),
            refresh: false,
            service_url: None,
            num_results: None,
            timeout: None,
            data_dir: None,
            output: None,
            format: None,
            config: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_mode_selection() {
        let mut args = make_args();
        assert_eq!(
            args.mode(),
            Some(Mode::Analyze {
                app_id: "com.instagram.android".to_string(),
                region: "de".to_string(),
                refresh: false,
            })
        );

        args.app = None;
        args.region = None;
        args.list = true;
        assert_eq!(args.mode(), Some(Mode::List));

        args.list = false;
        args.open = Some("com.a;de".to_string());
        assert_eq!(args.mode(), Some(Mode::Open("com.a;de".to_string())));
    }

    #[test]
    fn test_validation_requires_one_mode() {
        let mut args = make_args();
        assert!(args.validate().is_ok());

        args.app = None;
        args.region = None;
        assert!(args.validate().is_err());

        args.list = true;
        args.open = Some("com.a;de".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.service_url = Some("ftp://insights".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_values() {
        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.num_results = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "appinsights",
            "--user",
            "alice",
            "--app",
            "com.a",
            "--region",
            "de",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert!(args.validate().is_ok());

        assert!(Args::try_parse_from(["appinsights", "--user", "alice", "--app", "com.a"]).is_err());
    }
}
