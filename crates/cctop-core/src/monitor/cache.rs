//! The session cache that quick scans update in place.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::cache::StatProvider;
use crate::process::ActiveProcessSet;
use crate::sessions::classifier::subagents_dir;
use crate::sessions::{sort_rows, ScannedSession, SessionRow, SessionStatus};

/// One displayed session plus the file facts a quick scan checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSessionEntry {
    pub path: PathBuf,
    pub session_id: String,
    /// Log mtime at the last (re)classification
    pub modified: SystemTime,
    pub row: SessionRow,
    /// `<session-id>/subagents` beside the log
    pub subagents_dir: PathBuf,
}

impl From<ScannedSession> for CachedSessionEntry {
    fn from(s: ScannedSession) -> Self {
        Self {
            session_id: s.row.session_id.clone(),
            subagents_dir: subagents_dir(&s.path),
            path: s.path,
            modified: s.modified,
            row: s.row,
        }
    }
}

/// Result of the last full scan, refreshed cheaply between full scans
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
    entries: Vec<CachedSessionEntry>,
    active: ActiveProcessSet,
    last_full_scan: Option<SystemTime>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a full scan is required at `now`
    pub fn needs_full_scan(&self, now: SystemTime, interval: Duration) -> bool {
        match self.last_full_scan {
            None => true,
            Some(last) => now
                .duration_since(last)
                .map(|elapsed| elapsed >= interval)
                .unwrap_or(false),
        }
    }

    /// Replace everything with the result of a full scan
    pub fn replace(&mut self, sessions: Vec<ScannedSession>, active: ActiveProcessSet, now: SystemTime) {
        self.entries = sessions.into_iter().map(CachedSessionEntry::from).collect();
        self.active = active;
        self.last_full_scan = Some(now);
    }

    /// Re-stat every cached log and re-classify only the ones whose mtime moved.
    ///
    /// Uses the active set captured by the last full scan. Project name, branch
    /// and message count are left untouched; entries whose log vanished are
    /// dropped. Returns the number of entries that changed.
    pub fn quick_scan(
        &mut self,
        stat: &dyn StatProvider,
        now: SystemTime,
        mut classify: impl FnMut(&CachedSessionEntry, &ActiveProcessSet, SystemTime, SystemTime) -> SessionStatus,
    ) -> usize {
        let active = &self.active;
        let mut changed = 0;

        self.entries.retain_mut(|entry| {
            let modified = match stat.modified(&entry.path) {
                Some(m) => m,
                None => {
                    changed += 1;
                    return false;
                }
            };
            if modified == entry.modified {
                return true;
            }

            entry.row.status = classify(entry, active, modified, now);
            entry.row.last_active = modified.into();
            entry.modified = modified;
            changed += 1;
            true
        });

        changed
    }

    /// Rows in display order
    pub fn rows(&self) -> Vec<SessionRow> {
        let mut rows: Vec<SessionRow> = self.entries.iter().map(|e| e.row.clone()).collect();
        sort_rows(&mut rows);
        rows
    }

    pub fn entries(&self) -> &[CachedSessionEntry] {
        &self.entries
    }

    pub fn last_full_scan(&self) -> Option<SystemTime> {
        self.last_full_scan
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
