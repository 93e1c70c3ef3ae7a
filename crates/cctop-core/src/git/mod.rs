//! Git branch lookup for project directories.
//!
//! Branches recorded in logs are preferred; this is the fallback when none
//! is recorded or the log caught a detached HEAD.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::cache::StampedCache;
use crate::error::{MonitorError, Result};

/// Symbolic ref git reports for a detached HEAD; never shown as a branch
pub const DETACHED_HEAD: &str = "HEAD";

/// Whether a recorded branch is usable as-is
pub fn is_concrete_branch(branch: &str) -> bool {
    let b = branch.trim();
    !b.is_empty() && b != DETACHED_HEAD
}

/// Source of live branch names
pub trait BranchLookup: Send + Sync {
    fn current_branch(&self, dir: &Path) -> Option<String>;
}

/// Runs `git -C <dir> rev-parse --abbrev-ref HEAD`
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCli;

impl BranchLookup for GitCli {
    fn current_branch(&self, dir: &Path) -> Option<String> {
        fetch_branch(dir)
            .map_err(|e| debug!(dir = %dir.display(), error = %e, "git branch lookup failed"))
            .ok()
            .flatten()
    }
}

/// Fetch the current branch name for a directory
fn fetch_branch(dir: &Path) -> Result<Option<String>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .output()
        .map_err(|e| MonitorError::Command {
            command: "git rev-parse".to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Ok(None);
    }
    let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(Some(branch).filter(|b| is_concrete_branch(b)))
}

/// Branch memo per project path.
///
/// Branches change through external checkouts, so the owner clears this
/// wholesale at the start of every full scan instead of stamping entries.
pub struct BranchCache {
    cache: StampedCache<PathBuf, (), Option<String>>,
    lookup: Box<dyn BranchLookup>,
}

impl Default for BranchCache {
    fn default() -> Self {
        Self::new(Box::new(GitCli))
    }
}

impl BranchCache {
    pub fn new(lookup: Box<dyn BranchLookup>) -> Self {
        Self {
            cache: StampedCache::new(),
            lookup,
        }
    }

    /// Get the branch for a directory, querying git once per full scan
    pub fn get(&mut self, dir: &Path) -> Option<String> {
        let lookup = &self.lookup;
        self.cache
            .get_or_insert_with(dir.to_path_buf(), (), || lookup.current_branch(dir))
            .clone()
    }

    /// Forget every memoized branch
    pub fn clear(&mut self) {
        self.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingLookup {
        calls: Arc<AtomicUsize>,
    }

    impl BranchLookup for CountingLookup {
        fn current_branch(&self, _dir: &Path) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some("main".to_string())
        }
    }

    #[test]
    fn test_is_concrete_branch() {
        assert!(is_concrete_branch("main"));
        assert!(is_concrete_branch("feature/x"));
        assert!(!is_concrete_branch("HEAD"));
        assert!(!is_concrete_branch(""));
        assert!(!is_concrete_branch("  "));
    }

    #[test]
    fn test_branch_cache_memoizes_until_cleared() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut cache = BranchCache::new(Box::new(CountingLookup {
            calls: calls.clone(),
        }));

        assert_eq!(cache.get(Path::new("/repo")).as_deref(), Some("main"));
        assert_eq!(cache.get(Path::new("/repo")).as_deref(), Some("main"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.clear();
        cache.get(Path::new("/repo"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_git_cli_non_repo_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert_eq!(GitCli.current_branch(&tmp.path().join("missing")), None);
    }
}
