//! The refresh cycle: full scans on an interval, quick scans in between.
//!
//! [`SessionMonitor::tick`] is called on every timer tick by the host loop.
//! It does nothing unless a watched directory changed or the full-scan
//! interval elapsed, and it never runs two scans at once because it takes
//! `&mut self`.

mod cache;
mod watch;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

pub use cache::{CachedSessionEntry, SessionCache};
pub use watch::{DirWatcher, DirtyFlag};

use crate::cache::{Clock, FsStat, StatProvider, SystemClock};
use crate::config::MonitorSettings;
use crate::git::{BranchLookup, GitCli};
use crate::process::{system_process_table, ProcessCorrelator, ProcessTable};
use crate::sessions::{SessionRow, SessionScanner};

/// Which path the last refresh took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Full,
    Quick,
}

/// Owns every cache and produces the sorted session list
pub struct SessionMonitor {
    scanner: SessionScanner,
    correlator: ProcessCorrelator,
    cache: SessionCache,
    clock: Arc<dyn Clock>,
    stat: Arc<dyn StatProvider>,
    full_scan_interval: Duration,
    dirty: DirtyFlag,
    watcher: Option<DirWatcher>,
    last_scan: Option<ScanKind>,
}

impl SessionMonitor {
    /// Monitor backed by the real filesystem, process table and git
    pub fn new(settings: &MonitorSettings) -> Self {
        let mut monitor = Self::with_parts(
            settings,
            system_process_table(),
            Box::new(GitCli),
            Arc::new(SystemClock),
            Arc::new(FsStat),
        );
        if settings.watch {
            monitor.enable_watching();
        }
        monitor
    }

    /// Monitor with injected seams and no directory watching
    pub fn with_parts(
        settings: &MonitorSettings,
        table: Box<dyn ProcessTable>,
        branch_lookup: Box<dyn BranchLookup>,
        clock: Arc<dyn Clock>,
        stat: Arc<dyn StatProvider>,
    ) -> Self {
        Self {
            scanner: SessionScanner::new(settings, stat.clone(), branch_lookup),
            correlator: ProcessCorrelator::new(table, settings),
            cache: SessionCache::new(),
            clock,
            stat,
            full_scan_interval: settings.full_scan_interval(),
            dirty: DirtyFlag::new(),
            watcher: None,
            last_scan: None,
        }
    }

    /// Start notify-based watching; without it only the interval drives scans
    pub fn enable_watching(&mut self) {
        match DirWatcher::new(self.dirty.clone()) {
            Ok(watcher) => self.watcher = Some(watcher),
            Err(e) => warn!("file watching unavailable, relying on polling: {e}"),
        }
    }

    pub fn mark_dirty(&self) {
        self.dirty.mark();
    }

    /// Full scan if due, quick scan otherwise
    pub fn refresh(&mut self) -> Vec<SessionRow> {
        let now = self.clock.now();
        if self.cache.needs_full_scan(now, self.full_scan_interval) {
            self.full_scan()
        } else {
            self.quick_scan()
        }
    }

    /// Re-enumerate everything and replace the cache wholesale
    pub fn full_scan(&mut self) -> Vec<SessionRow> {
        let now = self.clock.now();
        self.scanner.clear_branches();

        let active = self.correlator.active_sessions(self.scanner.root());
        let sessions = self.scanner.scan(&active, now);
        self.cache.replace(sessions, active, now);
        self.last_scan = Some(ScanKind::Full);

        if let Some(watcher) = self.watcher.as_mut() {
            let mut dirs = self.scanner.project_dirs();
            dirs.push(self.scanner.root().to_path_buf());
            watcher.sync(dirs);
        }

        self.cache.rows()
    }

    /// Re-stat cached logs and re-classify the ones that changed
    pub fn quick_scan(&mut self) -> Vec<SessionRow> {
        let now = self.clock.now();
        let scanner = &self.scanner;
        let changed = self.cache.quick_scan(
            self.stat.as_ref(),
            now,
            |entry, active, modified, now| {
                scanner.classify_log(entry, active, modified, now)
            },
        );
        self.last_scan = Some(ScanKind::Quick);
        if changed > 0 {
            debug!(changed, "quick scan updated sessions");
        }
        self.cache.rows()
    }

    /// One timer tick: refresh only when something changed or a full scan is due.
    ///
    /// Returns `None` when nothing needed doing.
    pub fn tick(&mut self) -> Option<Vec<SessionRow>> {
        let due = self
            .cache
            .needs_full_scan(self.clock.now(), self.full_scan_interval);
        let dirty = self.dirty.take();
        if !due && !dirty {
            return None;
        }
        Some(self.refresh())
    }

    /// Rows from the last refresh
    pub fn rows(&self) -> Vec<SessionRow> {
        self.cache.rows()
    }

    pub fn last_scan(&self) -> Option<ScanKind> {
        self.last_scan
    }

    pub fn last_full_scan(&self) -> Option<SystemTime> {
        self.cache.last_full_scan()
    }

    /// Release directory watches
    pub fn shutdown(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.unwatch_all();
            info!("session monitor stopped");
        }
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
