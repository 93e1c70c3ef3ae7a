use anyhow::{Context, Result};
use cctop_core::MonitorSettings;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Command line arguments
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Live status of local Claude Code sessions")]
pub struct Config {
    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Projects root (defaults to ~/.claude/projects)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Refresh tick in milliseconds
    #[arg(short = 't', long)]
    pub tick_ms: Option<u64>,

    /// Seconds between full rescans
    #[arg(long)]
    pub full_scan_secs: Option<u64>,

    /// Print the current sessions as JSON and exit
    #[arg(long)]
    pub once: bool,

    /// Write logs to this file instead of the default state directory
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Engine windows and intervals
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// UI settings
    #[serde(default)]
    pub ui: UiSettings,
}

/// UI-related settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiSettings {
    /// Color status cells
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_color() -> bool {
    true
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            color: default_color(),
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // An explicit path must exist
        if let Some(p) = path {
            return Self::from_file(p);
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("cctop/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/cctop/config.toml")),
            dirs::home_dir().map(|p| p.join(".cctop.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Merge CLI config into settings (CLI takes precedence)
    pub fn merge_cli(&mut self, cli: &Config) {
        if let Some(root) = &cli.root {
            self.monitor.root = Some(root.clone());
        }
        if let Some(tick_ms) = cli.tick_ms {
            self.monitor.tick_ms = tick_ms;
        }
        if let Some(full_scan_secs) = cli.full_scan_secs {
            self.monitor.full_scan_secs = full_scan_secs;
        }
        // A one-shot run has nothing to be woken up for
        if cli.once {
            self.monitor.watch = false;
        }
    }

    /// Validate and normalize settings values
    ///
    /// Clamps the tick and full-scan interval so a typo cannot spin the CPU.
    pub fn validate(&mut self) {
        const MIN_TICK_MS: u64 = 10;
        const MIN_FULL_SCAN_SECS: u64 = 1;

        if self.monitor.tick_ms < MIN_TICK_MS {
            self.monitor.tick_ms = MIN_TICK_MS;
        }
        if self.monitor.full_scan_secs < MIN_FULL_SCAN_SECS {
            self.monitor.full_scan_secs = MIN_FULL_SCAN_SECS;
        }
    }
}

/// Default log file: `<state dir>/cctop/cctop.log`
pub fn default_log_path() -> Option<PathBuf> {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .map(|d| d.join("cctop").join("cctop.log"))
}
