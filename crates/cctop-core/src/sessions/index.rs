//! Per-project `sessions-index.json` files and the project directory naming scheme.
//!
//! Claude Code names each project directory by replacing every `/` of the
//! project's absolute path with `-`, e.g. `/Users/vm/project` is stored as
//! `-Users-vm-project`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::{MonitorError, Result};

/// File name of the per-project index
pub const INDEX_FILE: &str = "sessions-index.json";

/// Entry in the `sessions-index.json` file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIndexEntry {
    pub session_id: String,
    #[serde(default)]
    pub full_path: Option<String>,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub message_count: Option<usize>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_sidechain: bool,
}

/// The `sessions-index.json` file structure
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectIndex {
    pub version: u32,
    #[serde(default)]
    pub original_path: Option<String>,
    #[serde(default)]
    pub entries: Vec<SessionIndexEntry>,
}

impl ProjectIndex {
    /// Read and parse `<project_dir>/sessions-index.json`
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join(INDEX_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| MonitorError::io(&path, e))?;
        serde_json::from_str(&content).map_err(|e| MonitorError::json(&path, e))
    }

    /// Index entries keyed by session id
    pub fn by_session(&self) -> HashMap<&str, &SessionIndexEntry> {
        self.entries
            .iter()
            .map(|e| (e.session_id.as_str(), e))
            .collect()
    }
}

/// Encode a path to the directory name used by Claude Code.
/// Example: `/Users/vm/project` -> `-Users-vm-project`
///
/// Claude Code maps every character outside `[A-Za-z0-9-]` to `-`, so dots
/// and underscores collapse the same way separators do.
pub fn encode_project_dir(path: &str) -> String {
    path.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

/// Best-effort inverse of [`encode_project_dir`].
///
/// Dashes that were part of a directory name cannot be told apart from
/// separators, so this is only the last fallback for a project path.
pub fn decode_project_dir(name: &str) -> PathBuf {
    let decoded = name.replace('-', "/");
    if decoded.starts_with('/') {
        PathBuf::from(decoded)
    } else {
        PathBuf::from(format!("/{}", decoded))
    }
}
