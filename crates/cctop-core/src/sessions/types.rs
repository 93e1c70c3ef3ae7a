use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Branch label shown when no branch can be resolved
pub const NO_BRANCH: &str = "N/A";

/// Live status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// The assistant is producing output or the user just sent a turn
    Running,
    /// The assistant requested a tool and is waiting on it (usually on approval)
    Waiting,
    /// The assistant finished its turn and awaits user input
    Idle,
    /// No live process backs the session
    Inactive,
}

impl SessionStatus {
    /// Sort priority: lower sorts first
    pub fn priority(&self) -> u8 {
        match self {
            SessionStatus::Running => 0,
            SessionStatus::Waiting => 1,
            SessionStatus::Idle => 2,
            SessionStatus::Inactive => 3,
        }
    }

    /// Whether a live process backs the session
    pub fn is_live(&self) -> bool {
        !matches!(self, SessionStatus::Inactive)
    }

    /// Get indicator character for this status
    pub fn indicator(&self) -> &'static str {
        match self {
            SessionStatus::Running => "●",
            SessionStatus::Waiting => "◐",
            SessionStatus::Idle => "○",
            SessionStatus::Inactive => "·",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Waiting => "waiting",
            SessionStatus::Idle => "idle",
            SessionStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One displayed session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRow {
    /// Session identifier (log file stem)
    pub session_id: String,
    /// Absolute project path
    pub project_path: PathBuf,
    /// Manifest-derived name, or the last path segment
    pub project_name: String,
    /// Git branch, or [`NO_BRANCH`]
    pub branch: String,
    pub status: SessionStatus,
    /// Log modification time
    pub last_active: DateTime<Utc>,
    /// Number of user/assistant turns
    pub message_count: usize,
}

/// Display ordering: status priority, then most recent activity first
pub fn compare_rows(a: &SessionRow, b: &SessionRow) -> Ordering {
    a.status
        .priority()
        .cmp(&b.status.priority())
        .then_with(|| b.last_active.cmp(&a.last_active))
}

/// Sort rows into display order (stable)
pub fn sort_rows(rows: &mut [SessionRow]) {
    rows.sort_by(compare_rows);
}
