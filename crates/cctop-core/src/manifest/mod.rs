//! Project display names from manifest files.
//!
//! Probes the common ecosystem manifests at a project root in a fixed order
//! and takes the first name found. Results are memoized per directory and
//! stamped with the manifests' modification times, so editing a manifest
//! invalidates the entry on the next lookup.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::Value;
use tracing::debug;

use crate::cache::{FsStat, StampedCache, StatProvider};
use crate::error::{MonitorError, Result};

/// Manifest files in probe order
const MANIFESTS: &[&str] = &[
    "package.json",
    "Cargo.toml",
    "pyproject.toml",
    "go.mod",
    "composer.json",
];

/// Extract a name from one manifest file
fn read_manifest_name(path: &Path, file_name: &str) -> Result<Option<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| MonitorError::io(path, e))?;

    let name = match file_name {
        "package.json" | "composer.json" => {
            let value: Value =
                serde_json::from_str(&content).map_err(|e| MonitorError::json(path, e))?;
            value
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
        }
        "Cargo.toml" => {
            let table = parse_toml(path, &content)?;
            toml_str(&table, &["package", "name"])
        }
        "pyproject.toml" => {
            let table = parse_toml(path, &content)?;
            toml_str(&table, &["project", "name"])
                .or_else(|| toml_str(&table, &["tool", "poetry", "name"]))
        }
        "go.mod" => go_module_name(&content),
        _ => None,
    };

    Ok(name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()))
}

fn parse_toml(path: &Path, content: &str) -> Result<toml::Table> {
    toml::from_str(content).map_err(|source| MonitorError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

/// Walk nested tables and return a string leaf
fn toml_str(table: &toml::Table, keys: &[&str]) -> Option<String> {
    let (last, parents) = keys.split_last()?;
    let mut current = table;
    for key in parents {
        current = current.get(*key)?.as_table()?;
    }
    current.get(*last)?.as_str().map(str::to_string)
}

/// Last segment of the `module` directive: `module github.com/acme/tool` -> `tool`
fn go_module_name(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .find_map(|l| l.strip_prefix("module "))
        .map(|m| m.trim().trim_matches('"'))
        .and_then(|m| m.rsplit('/').next())
        .map(str::to_string)
}

/// Last path segment, used when no manifest names the project
pub fn fallback_name(project_path: &Path) -> String {
    project_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| project_path.to_string_lossy().to_string())
}

/// Memoizing manifest lookup
pub struct ManifestResolver {
    cache: StampedCache<PathBuf, Vec<Option<SystemTime>>, Option<String>>,
    stat: Box<dyn StatProvider>,
}

impl Default for ManifestResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestResolver {
    pub fn new() -> Self {
        Self::with_stat(Box::new(FsStat))
    }

    pub fn with_stat(stat: Box<dyn StatProvider>) -> Self {
        Self {
            cache: StampedCache::new(),
            stat,
        }
    }

    /// Manifest-derived name for a project, if any manifest carries one
    pub fn resolve(&mut self, project_path: &Path) -> Option<String> {
        let stamp: Vec<Option<SystemTime>> = MANIFESTS
            .iter()
            .map(|m| self.stat.modified(&project_path.join(m)))
            .collect();

        // No manifest present at all: nothing to read
        if stamp.iter().all(Option::is_none) {
            return None;
        }

        self.cache
            .get_or_insert_with(project_path.to_path_buf(), stamp, || {
                probe_manifests(project_path)
            })
            .clone()
    }

    /// Display name: manifest name, else the last path segment
    pub fn display_name(&mut self, project_path: &Path) -> String {
        self.resolve(project_path)
            .unwrap_or_else(|| fallback_name(project_path))
    }

    #[cfg(test)]
    fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

fn probe_manifests(project_path: &Path) -> Option<String> {
    for file_name in MANIFESTS {
        let path = project_path.join(file_name);
        if !path.is_file() {
            continue;
        }
        match read_manifest_name(&path, file_name) {
            Ok(Some(name)) => return Some(name),
            Ok(None) => continue,
            Err(e) => {
                debug!(error = %e, "skipping unreadable manifest");
                continue;
            }
        }
    }
    None
}
