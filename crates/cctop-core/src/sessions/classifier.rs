//! Session status inference from process liveness and the log tail.
//!
//! The last substantive record decides a base status; two recency overrides
//! then suppress flapping between `waiting`/`idle` and `running` while a turn
//! is still being written or a subagent is working.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::tail::{AssistantContent, LogRecord, RecordKind};
use super::types::SessionStatus;
use crate::config::MonitorSettings;

/// Directory holding a session's subagent logs: `<dir>/<session-id>/subagents`
pub fn subagents_dir(log_path: &Path) -> PathBuf {
    log_path.with_extension("").join("subagents")
}

/// Newest modification time of the `*.jsonl` files in a subagents directory
pub fn latest_subagent_activity(dir: &Path) -> Option<SystemTime> {
    std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
        .filter_map(|p| std::fs::metadata(&p).and_then(|m| m.modified()).ok())
        .max()
}

/// Base status from the newest substantive record.
///
/// Unknown record types and an empty tail fail open to `Running`.
pub fn base_status(records: &[LogRecord]) -> SessionStatus {
    let last = records.iter().rev().find(|r| !r.kind().is_metadata());
    let record = match last {
        Some(r) => r,
        None => return SessionStatus::Running,
    };

    match record.kind() {
        RecordKind::User | RecordKind::Progress | RecordKind::QueueOperation => {
            SessionStatus::Running
        }
        RecordKind::Assistant => match record.assistant_content() {
            AssistantContent::ToolUse => SessionStatus::Waiting,
            AssistantContent::Text => SessionStatus::Idle,
            AssistantContent::Empty => SessionStatus::Running,
        },
        _ => SessionStatus::Running,
    }
}

/// Maps liveness + log tail + freshness to a [`SessionStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusClassifier {
    /// Log modified within this window keeps `idle`/`waiting` at `running`
    pub recency_window: Duration,
    /// Subagent log modified within this window keeps `waiting` at `running`
    pub subagent_window: Duration,
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::from_settings(&MonitorSettings::default())
    }
}

impl StatusClassifier {
    pub fn from_settings(settings: &MonitorSettings) -> Self {
        Self {
            recency_window: settings.recency_window(),
            subagent_window: settings.subagent_window(),
        }
    }

    /// Classify one session.
    ///
    /// `subagent_activity` is only called when the `waiting` override needs it,
    /// so inactive sessions never touch the subagents directory.
    pub fn classify(
        &self,
        is_active: bool,
        records: &[LogRecord],
        modified: SystemTime,
        now: SystemTime,
        subagent_activity: impl FnOnce() -> Option<SystemTime>,
    ) -> SessionStatus {
        if !is_active {
            return SessionStatus::Inactive;
        }

        match base_status(records) {
            SessionStatus::Idle if within(modified, now, self.recency_window) => {
                SessionStatus::Running
            }
            SessionStatus::Waiting => {
                if within(modified, now, self.recency_window) {
                    return SessionStatus::Running;
                }
                match subagent_activity() {
                    Some(t) if within(t, now, self.subagent_window) => SessionStatus::Running,
                    _ => SessionStatus::Waiting,
                }
            }
            status => status,
        }
    }
}

/// Whether `t` lies within `window` before `now`.
///
/// Timestamps slightly in the future (clock skew) count as fresh.
fn within(t: SystemTime, now: SystemTime, window: Duration) -> bool {
    match now.duration_since(t) {
        Ok(age) => age <= window,
        Err(_) => true,
    }
}
