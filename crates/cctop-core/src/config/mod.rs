//! Tunable windows and intervals for the scanning engine.
//!
//! The freshness windows are empirical tuning values rather than a contract,
//! so every one of them is a settings field with a serde default.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Engine settings (the `[monitor]` table of the config file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Projects root; defaults to `$CLAUDE_CONFIG_DIR/projects` or `~/.claude/projects`
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Timer period driving re-evaluation (milliseconds)
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Maximum age of the last full scan before another one runs (seconds)
    #[serde(default = "default_full_scan_secs")]
    pub full_scan_secs: u64,

    /// Inactive sessions whose log is older than this are hidden (hours)
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,

    /// A log touched this recently is treated as still producing output (ms)
    #[serde(default = "default_recency_window_ms")]
    pub recency_window_ms: u64,

    /// A subagent log touched this recently keeps its parent running (seconds)
    #[serde(default = "default_subagent_window_secs")]
    pub subagent_window_secs: u64,

    /// How far a log may be created before its process started (seconds)
    #[serde(default = "default_match_before_secs")]
    pub process_match_before_secs: u64,

    /// How far a log may be created after its process started (seconds)
    #[serde(default = "default_match_after_secs")]
    pub process_match_after_secs: u64,

    /// Executable base name identifying assistant processes
    #[serde(default = "default_process_name")]
    pub process_name: String,

    /// Bytes read from the end of a log for status classification
    #[serde(default = "default_tail_bytes")]
    pub tail_bytes: u64,

    /// Register filesystem watches for early invalidation
    #[serde(default = "default_watch")]
    pub watch: bool,
}

fn default_tick_ms() -> u64 {
    200
}

fn default_full_scan_secs() -> u64 {
    5
}

fn default_stale_after_hours() -> u64 {
    24
}

fn default_recency_window_ms() -> u64 {
    3_000
}

fn default_subagent_window_secs() -> u64 {
    60
}

fn default_match_before_secs() -> u64 {
    5
}

fn default_match_after_secs() -> u64 {
    300
}

fn default_process_name() -> String {
    "claude".to_string()
}

fn default_tail_bytes() -> u64 {
    128 * 1024
}

fn default_watch() -> bool {
    true
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            root: None,
            tick_ms: default_tick_ms(),
            full_scan_secs: default_full_scan_secs(),
            stale_after_hours: default_stale_after_hours(),
            recency_window_ms: default_recency_window_ms(),
            subagent_window_secs: default_subagent_window_secs(),
            process_match_before_secs: default_match_before_secs(),
            process_match_after_secs: default_match_after_secs(),
            process_name: default_process_name(),
            tail_bytes: default_tail_bytes(),
            watch: default_watch(),
        }
    }
}

impl MonitorSettings {
    /// Projects root directory, resolving the default when unset
    pub fn projects_root(&self) -> PathBuf {
        if let Some(root) = &self.root {
            return root.clone();
        }
        default_projects_root()
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn full_scan_interval(&self) -> Duration {
        Duration::from_secs(self.full_scan_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_hours * 3600)
    }

    pub fn recency_window(&self) -> Duration {
        Duration::from_millis(self.recency_window_ms)
    }

    pub fn subagent_window(&self) -> Duration {
        Duration::from_secs(self.subagent_window_secs)
    }

    pub fn match_before(&self) -> Duration {
        Duration::from_secs(self.process_match_before_secs)
    }

    pub fn match_after(&self) -> Duration {
        Duration::from_secs(self.process_match_after_secs)
    }
}

/// `$CLAUDE_CONFIG_DIR/projects`, else `~/.claude/projects`
pub fn default_projects_root() -> PathBuf {
    if let Some(dir) = std::env::var_os("CLAUDE_CONFIG_DIR").filter(|v| !v.is_empty()) {
        return PathBuf::from(dir).join("projects");
    }
    dirs::home_dir()
        .unwrap_or_default()
        .join(".claude")
        .join("projects")
}
