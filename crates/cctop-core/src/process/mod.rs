//! Correlating live `claude` processes with session logs.
//!
//! A process launched with `--resume <id>` names its session exactly. Any
//! other process is matched heuristically: its working directory selects the
//! project's log directory and the log created closest to the process start
//! time, within a bounded window, is taken as its session.

mod table;

pub use table::{system_process_table, ProcessEntry, ProcessTable, SysinfoTable};

use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::config::MonitorSettings;
use crate::sessions::index::encode_project_dir;

/// How a process was tied to its session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchConfidence {
    /// Session id passed on the command line
    Exact,
    /// Log creation time near the process start; `delta` is their distance
    Heuristic { delta: Duration },
}

/// One process-to-session correlation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessMatch {
    pub session_id: String,
    pub confidence: MatchConfidence,
}

/// A session log considered for heuristic matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCandidate {
    pub session_id: String,
    pub created: SystemTime,
}

/// Session ids currently backed by a live process.
///
/// Built once per full scan and replaced wholesale, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveProcessSet {
    ids: HashSet<String>,
}

impl ActiveProcessSet {
    pub fn contains(&self, session_id: &str) -> bool {
        self.ids.contains(session_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ActiveProcessSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

fn base_name(arg: &str) -> &str {
    arg.rsplit(['/', '\\']).next().unwrap_or(arg)
}

/// Whether a command line runs the assistant executable `name`.
///
/// Matches the executable itself and interpreter launches such as
/// `node /usr/local/bin/claude`.
pub fn is_assistant_process(args: &[String], name: &str) -> bool {
    args.iter().take(2).any(|a| base_name(a) == name)
}

/// Session id passed via `--resume`/`-r`/`--session-id`, if any
pub fn resume_session_id(args: &[String]) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg
            .strip_prefix("--resume=")
            .or_else(|| arg.strip_prefix("--session-id="))
        {
            return Some(value.to_string()).filter(|v| !v.is_empty());
        }
        if matches!(arg.as_str(), "--resume" | "-r" | "--session-id") {
            // `--resume` without a value opens a picker; no id to take
            return iter
                .next()
                .filter(|v| !v.starts_with('-') && !v.is_empty())
                .cloned();
        }
    }
    None
}

/// Pick the log whose creation time is closest to `started`.
///
/// Only logs created in `[started - before, started + after]` qualify; ties
/// go to the smallest absolute distance.
pub fn match_by_start_time(
    candidates: &[LogCandidate],
    started: SystemTime,
    before: Duration,
    after: Duration,
) -> Option<ProcessMatch> {
    candidates
        .iter()
        .filter_map(|c| {
            let (delta, created_before_start) = match c.created.duration_since(started) {
                Ok(d) => (d, false),
                Err(e) => (e.duration(), true),
            };
            let in_window = if created_before_start {
                delta <= before
            } else {
                delta <= after
            };
            in_window.then_some((delta, c))
        })
        .min_by_key(|(delta, _)| *delta)
        .map(|(delta, c)| ProcessMatch {
            session_id: c.session_id.clone(),
            confidence: MatchConfidence::Heuristic { delta },
        })
}

#[derive(Deserialize)]
struct TimestampLine {
    timestamp: Option<DateTime<Utc>>,
}

/// First record timestamp, for filesystems without birth times
fn first_record_time(path: &Path) -> Option<SystemTime> {
    use std::io::{BufRead, BufReader};

    let file = std::fs::File::open(path).ok()?;
    BufReader::new(file)
        .lines()
        .take(20)
        .map_while(|l| l.ok())
        .find_map(|l| serde_json::from_str::<TimestampLine>(&l).ok()?.timestamp)
        .map(SystemTime::from)
}

/// Session logs in a project directory with their creation times
pub fn log_candidates(project_dir: &Path) -> Vec<LogCandidate> {
    let entries = match std::fs::read_dir(project_dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
        .filter_map(|path| {
            let session_id = path.file_stem()?.to_str()?.to_string();
            let created = std::fs::metadata(&path)
                .and_then(|m| m.created())
                .ok()
                .or_else(|| first_record_time(&path))?;
            Some(LogCandidate {
                session_id,
                created,
            })
        })
        .collect()
}

/// Builds the [`ActiveProcessSet`] from the OS process table
pub struct ProcessCorrelator {
    table: Box<dyn ProcessTable>,
    process_name: String,
    before: Duration,
    after: Duration,
}

impl ProcessCorrelator {
    pub fn new(table: Box<dyn ProcessTable>, settings: &MonitorSettings) -> Self {
        Self {
            table,
            process_name: settings.process_name.clone(),
            before: settings.match_before(),
            after: settings.match_after(),
        }
    }

    /// Correlate every assistant process under `root`.
    ///
    /// Failures for one process only drop that process.
    pub fn correlate(&self, root: &Path) -> Vec<ProcessMatch> {
        let processes = match self.table.list() {
            Ok(p) => p,
            Err(e) => {
                debug!(error = %e, "process listing failed");
                return Vec::new();
            }
        };

        processes
            .iter()
            .filter(|p| is_assistant_process(&p.args, &self.process_name))
            .filter_map(|p| self.correlate_one(p, root))
            .collect()
    }

    fn correlate_one(&self, process: &ProcessEntry, root: &Path) -> Option<ProcessMatch> {
        if let Some(session_id) = resume_session_id(&process.args) {
            return Some(ProcessMatch {
                session_id,
                confidence: MatchConfidence::Exact,
            });
        }

        let cwd = self
            .table
            .cwd(process.pid)
            .map_err(|e| debug!(pid = process.pid, error = %e, "cwd lookup failed"))
            .ok()?;
        let started = self
            .table
            .start_time(process.pid)
            .map_err(|e| debug!(pid = process.pid, error = %e, "start time lookup failed"))
            .ok()?;

        let project_dir = root.join(encode_project_dir(&cwd.to_string_lossy()));
        let found = match_by_start_time(
            &log_candidates(&project_dir),
            started,
            self.before,
            self.after,
        );
        if found.is_none() {
            debug!(pid = process.pid, dir = %project_dir.display(), "no log within match window");
        }
        found
    }

    /// Session ids backed by a live process right now
    pub fn active_sessions(&self, root: &Path) -> ActiveProcessSet {
        self.correlate(root)
            .into_iter()
            .map(|m| m.session_id)
            .collect()
    }
}
