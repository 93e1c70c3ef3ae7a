//! Reading Claude Code JSONL session logs.
//!
//! Status inference only needs the last few records, so [`read_tail`] seeks
//! to the end of the file and parses a bounded window. Turn counting covers
//! the whole file, so [`update_metadata`] resumes from the byte offset the
//! previous pass reached and only parses what was appended since.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{MonitorError, Result};

/// Record `type` discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    User,
    Assistant,
    Progress,
    QueueOperation,
    System,
    /// `file-history-snapshot` marker
    Snapshot,
    Other,
}

impl RecordKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "user" => RecordKind::User,
            "assistant" => RecordKind::Assistant,
            "progress" => RecordKind::Progress,
            "queue-operation" => RecordKind::QueueOperation,
            "system" => RecordKind::System,
            "file-history-snapshot" => RecordKind::Snapshot,
            _ => RecordKind::Other,
        }
    }

    /// Pure bookkeeping records that say nothing about turn state
    pub fn is_metadata(&self) -> bool {
        matches!(self, RecordKind::System | RecordKind::Snapshot)
    }

    /// Records counted as conversation turns
    pub fn is_turn(&self) -> bool {
        matches!(self, RecordKind::User | RecordKind::Assistant)
    }
}

/// What an assistant record's content list carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistantContent {
    /// At least one `tool_use` item
    ToolUse,
    /// Text only
    Text,
    /// Empty or unrecognized content
    Empty,
}

/// One parsed log line (only the fields the engine reads)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(rename = "type", default)]
    pub record_type: String,
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
}

impl LogRecord {
    pub fn kind(&self) -> RecordKind {
        RecordKind::parse(&self.record_type)
    }

    /// Classify the `message.content` of an assistant record
    pub fn assistant_content(&self) -> AssistantContent {
        let content = match self.message.as_ref().and_then(|m| m.get("content")) {
            Some(c) => c,
            None => return AssistantContent::Empty,
        };

        match content {
            Value::Array(items) => {
                let item_type = |item: &Value| {
                    item.get("type")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                if items.iter().any(|i| item_type(i) == "tool_use") {
                    AssistantContent::ToolUse
                } else if items.iter().any(|i| item_type(i) == "text") {
                    AssistantContent::Text
                } else {
                    AssistantContent::Empty
                }
            }
            Value::String(s) if !s.trim().is_empty() => AssistantContent::Text,
            _ => AssistantContent::Empty,
        }
    }
}

/// Read and parse the records contained in the last `max_bytes` of a log.
///
/// When the window starts mid-file the first (partial) line is discarded.
/// Unparseable lines, including a half-written final line, are skipped.
pub fn read_tail(path: &Path, max_bytes: u64) -> Result<Vec<LogRecord>> {
    let mut file = File::open(path).map_err(|e| MonitorError::io(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| MonitorError::io(path, e))?
        .len();
    let start = len.saturating_sub(max_bytes);
    file.seek(SeekFrom::Start(start))
        .map_err(|e| MonitorError::io(path, e))?;

    let mut buf = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut buf)
        .map_err(|e| MonitorError::io(path, e))?;

    let text = String::from_utf8_lossy(&buf);
    let body = if start > 0 {
        match text.find('\n') {
            Some(idx) => &text[idx + 1..],
            None => "",
        }
    } else {
        &text[..]
    };

    Ok(parse_records(body, path))
}

/// Parse newline-delimited records, skipping blank and malformed lines
pub fn parse_records(body: &str, path: &Path) -> Vec<LogRecord> {
    body.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| match serde_json::from_str::<LogRecord>(line) {
            Ok(r) => Some(r),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping malformed log line");
                None
            }
        })
        .collect()
}

/// Most recent non-empty `cwd` in the records
pub fn last_cwd(records: &[LogRecord]) -> Option<&str> {
    records
        .iter()
        .rev()
        .filter_map(|r| r.cwd.as_deref())
        .find(|c| !c.is_empty())
}

/// Most recent non-empty `gitBranch` in the records
pub fn last_branch(records: &[LogRecord]) -> Option<&str> {
    records
        .iter()
        .rev()
        .filter_map(|r| r.git_branch.as_deref())
        .find(|b| !b.is_empty())
}

/// Whole-file facts about a log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogMetadata {
    /// Number of user/assistant records
    pub message_count: usize,
    /// Last working directory recorded
    pub cwd: Option<String>,
    /// Last branch recorded
    pub git_branch: Option<String>,
    /// Bytes consumed so far; the next pass starts here
    pub offset: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataLine {
    #[serde(rename = "type", default)]
    record_type: String,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    git_branch: Option<String>,
}

impl LogMetadata {
    /// Fold one line in. Returns false for a line that does not parse.
    fn absorb(&mut self, line: &[u8]) -> bool {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            return true;
        }
        let parsed: MetadataLine = match serde_json::from_slice(trimmed) {
            Ok(p) => p,
            Err(_) => return false,
        };

        if RecordKind::parse(&parsed.record_type).is_turn() {
            self.message_count += 1;
        }
        if let Some(cwd) = parsed.cwd.filter(|c| !c.is_empty()) {
            self.cwd = Some(cwd);
        }
        if let Some(branch) = parsed.git_branch.filter(|b| !b.is_empty()) {
            self.git_branch = Some(branch);
        }
        true
    }
}

/// Read a log from the start
pub fn read_metadata(path: &Path) -> Result<LogMetadata> {
    update_metadata(path, None)
}

/// Bring `previous` up to date with records appended since it was taken.
///
/// Logs are append-only; a file shorter than `previous.offset` was replaced
/// and is read again from the start. A trailing line without a newline is
/// consumed only if it already parses, otherwise it is left for the next pass.
pub fn update_metadata(path: &Path, previous: Option<LogMetadata>) -> Result<LogMetadata> {
    let mut file = File::open(path).map_err(|e| MonitorError::io(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| MonitorError::io(path, e))?
        .len();

    let mut meta = match previous {
        Some(prev) if prev.offset <= len => prev,
        _ => LogMetadata::default(),
    };
    file.seek(SeekFrom::Start(meta.offset))
        .map_err(|e| MonitorError::io(path, e))?;

    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| MonitorError::io(path, e))?;
        if n == 0 {
            break;
        }
        let complete = line.last() == Some(&b'\n');
        if !meta.absorb(&line) && !complete {
            break;
        }
        meta.offset += n as u64;
    }

    Ok(meta)
}
