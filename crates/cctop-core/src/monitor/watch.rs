//! Directory change notifications.
//!
//! The notify callback runs on the watcher's own thread and does nothing but
//! set a shared dirty flag; the refresh cycle picks it up on the next tick.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

/// Set by the watcher thread, consumed by the refresh cycle
#[derive(Debug, Clone, Default)]
pub struct DirtyFlag(Arc<AtomicBool>);

impl DirtyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Read and clear the flag
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Non-recursive watches on the projects root and each project directory
pub struct DirWatcher {
    watcher: RecommendedWatcher,
    watched: HashSet<PathBuf>,
    /// Directories whose last watch attempt failed
    failed: HashSet<PathBuf>,
}

impl DirWatcher {
    pub fn new(dirty: DirtyFlag) -> notify::Result<Self> {
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_relevant(&event.kind) => dirty.mark(),
            Ok(_) => {}
            Err(e) => warn!("watcher error: {e}"),
        })?;

        Ok(Self {
            watcher,
            watched: HashSet::new(),
            failed: HashSet::new(),
        })
    }

    /// Watch exactly `dirs`: add new ones, drop ones that went away.
    ///
    /// Failures are retried on the next sync; only the first failure for a
    /// directory is a warning.
    pub fn sync<I>(&mut self, dirs: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let wanted: HashSet<PathBuf> = dirs.into_iter().collect();
        self.failed.retain(|d| wanted.contains(d));

        let gone: Vec<PathBuf> = self.watched.difference(&wanted).cloned().collect();
        for dir in gone {
            // The directory may already be deleted; the watch died with it
            let _ = self.watcher.unwatch(&dir);
            self.watched.remove(&dir);
        }

        for dir in wanted {
            if self.watched.contains(&dir) {
                continue;
            }
            self.watch(dir);
        }
    }

    fn watch(&mut self, dir: PathBuf) {
        match self.watcher.watch(&dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                debug!(path = %dir.display(), "watching directory");
                self.failed.remove(&dir);
                self.watched.insert(dir);
            }
            Err(e) if self.failed.contains(&dir) => {
                debug!(path = %dir.display(), "still unable to watch directory: {e}")
            }
            Err(e) => {
                warn!(path = %dir.display(), "failed to watch directory: {e}");
                self.failed.insert(dir);
            }
        }
    }

    pub fn is_watching(&self, dir: &Path) -> bool {
        self.watched.contains(dir)
    }

    pub fn len(&self) -> usize {
        self.watched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }

    /// Release every watch
    pub fn unwatch_all(&mut self) {
        for dir in self.watched.drain() {
            let _ = self.watcher.unwatch(&dir);
        }
    }
}

impl Drop for DirWatcher {
    fn drop(&mut self) {
        self.unwatch_all();
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind};

    #[test]
    fn test_dirty_flag_take_clears() {
        let flag = DirtyFlag::new();
        assert!(!flag.take());
        flag.clone().mark();
        assert!(flag.is_set());
        assert!(flag.take());
        assert!(!flag.is_set());
    }

    #[test]
    fn test_relevant_events() {
        assert!(is_relevant(&EventKind::Create(CreateKind::File)));
        assert!(!is_relevant(&EventKind::Access(AccessKind::Any)));
    }

    #[test]
    fn test_sync_tracks_directories() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        std::fs::create_dir(&a).unwrap();
        std::fs::create_dir(&b).unwrap();

        let mut watcher = DirWatcher::new(DirtyFlag::new()).unwrap();
        watcher.sync(vec![a.clone(), b.clone(), tmp.path().join("missing")]);
        assert!(watcher.is_watching(&a));
        assert!(watcher.is_watching(&b));
        assert_eq!(watcher.len(), 2);

        watcher.sync(vec![a.clone()]);
        assert!(!watcher.is_watching(&b));

        watcher.unwatch_all();
        assert!(watcher.is_empty());
    }

    #[test]
    fn test_repeated_watch_failures_are_remembered() {
        let tmp = tempfile::TempDir::new().unwrap();
        let missing = tmp.path().join("projects");

        let mut watcher = DirWatcher::new(DirtyFlag::new()).unwrap();
        watcher.sync(vec![missing.clone()]);
        watcher.sync(vec![missing.clone()]);
        assert!(watcher.failed.contains(&missing));
        assert!(!watcher.is_watching(&missing));

        std::fs::create_dir(&missing).unwrap();
        watcher.sync(vec![missing.clone()]);
        assert!(watcher.is_watching(&missing));
        assert!(watcher.failed.is_empty());

        watcher.sync(Vec::new());
        watcher.sync(vec![tmp.path().join("gone")]);
        watcher.sync(Vec::new());
        assert!(watcher.failed.is_empty());
    }
}
