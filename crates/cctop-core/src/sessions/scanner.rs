//! Scanner for `~/.claude/projects/<encoded-path>/<session-id>.jsonl` logs.
//!
//! A scan never fails: unreadable directories, malformed indexes and broken
//! logs are logged at debug level and skipped, so the result only shrinks.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::classifier::{latest_subagent_activity, subagents_dir, StatusClassifier};
use super::index::{decode_project_dir, ProjectIndex, SessionIndexEntry};
use super::tail::{last_branch, last_cwd, read_tail, update_metadata, LogMetadata};
use super::types::{compare_rows, SessionRow, SessionStatus, NO_BRANCH};
use crate::cache::{StampedCache, StatProvider};
use crate::config::MonitorSettings;
use crate::git::{is_concrete_branch, BranchCache, BranchLookup};
use crate::manifest::ManifestResolver;
use crate::monitor::CachedSessionEntry;
use crate::process::ActiveProcessSet;

/// A session produced by a scan, with the file facts needed to re-check it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedSession {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub row: SessionRow,
}

/// Walks the projects root and assembles [`SessionRow`]s
pub struct SessionScanner {
    root: PathBuf,
    stale_after: Duration,
    tail_bytes: u64,
    classifier: StatusClassifier,
    stat: Arc<dyn StatProvider>,
    manifests: ManifestResolver,
    branches: BranchCache,
    /// Whole-file log facts keyed by path, stamped with mtime
    metadata: StampedCache<PathBuf, SystemTime, LogMetadata>,
}

impl SessionScanner {
    pub fn new(
        settings: &MonitorSettings,
        stat: Arc<dyn StatProvider>,
        branch_lookup: Box<dyn BranchLookup>,
    ) -> Self {
        Self {
            root: settings.projects_root(),
            stale_after: settings.stale_after(),
            tail_bytes: settings.tail_bytes,
            classifier: StatusClassifier::from_settings(settings),
            stat,
            manifests: ManifestResolver::new(),
            branches: BranchCache::new(branch_lookup),
            metadata: StampedCache::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Forget memoized branches (external checkouts may have changed them)
    pub fn clear_branches(&mut self) {
        self.branches.clear();
    }

    /// Project subdirectories of the root; empty if the root is unreadable
    pub fn project_dirs(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %self.root.display(), error = %e, "projects root unreadable");
                return Vec::new();
            }
        };

        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        dirs
    }

    /// Full scan: every eligible session, in display order
    pub fn scan(&mut self, active: &ActiveProcessSet, now: SystemTime) -> Vec<ScannedSession> {
        let mut sessions = Vec::new();
        let mut seen_logs = Vec::new();

        for dir in self.project_dirs() {
            self.scan_project(&dir, active, now, &mut sessions, &mut seen_logs);
        }

        // Drop metadata for logs that disappeared
        self.metadata.retain_keys(|k| seen_logs.contains(k));

        sort_sessions(&mut sessions);
        info!(
            sessions = sessions.len(),
            active = active.len(),
            "full scan complete"
        );
        sessions
    }

    fn scan_project(
        &mut self,
        dir: &Path,
        active: &ActiveProcessSet,
        now: SystemTime,
        out: &mut Vec<ScannedSession>,
        seen_logs: &mut Vec<PathBuf>,
    ) {
        let index = match ProjectIndex::load(dir) {
            Ok(index) => Some(index),
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "no usable session index");
                None
            }
        };
        let entries = index
            .as_ref()
            .map(|i| i.by_session())
            .unwrap_or_default();

        let logs = match std::fs::read_dir(dir) {
            Ok(read) => read
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
                .collect::<Vec<_>>(),
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "project directory unreadable");
                return;
            }
        };

        for log in logs {
            let session_id = match log.file_stem().and_then(|s| s.to_str()) {
                Some(id) => id.to_string(),
                None => continue,
            };
            seen_logs.push(log.clone());

            let entry = entries.get(session_id.as_str()).copied();
            if entry.is_some_and(|e| e.is_sidechain) {
                continue;
            }

            let context = ProjectContext {
                dir,
                index: index.as_ref(),
                entry,
            };
            if let Some(session) = self.build_session(&log, session_id, &context, active, now) {
                out.push(session);
            }
        }
    }

    fn build_session(
        &mut self,
        log: &Path,
        session_id: String,
        context: &ProjectContext<'_>,
        active: &ActiveProcessSet,
        now: SystemTime,
    ) -> Option<ScannedSession> {
        let modified = self.stat.modified(log)?;
        let is_active = active.contains(&session_id);

        if !is_active && is_stale(modified, now, self.stale_after) {
            return None;
        }

        let records = match read_tail(log, self.tail_bytes) {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "skipping unreadable log");
                return None;
            }
        };
        let metadata = self
            .metadata
            .get_or_update_with(log.to_path_buf(), modified, |previous| {
                update_metadata(log, previous).unwrap_or_default()
            })
            .clone();

        let entry = context.entry;
        let project_path = resolve_project_path(
            entry,
            last_cwd(&records).or(metadata.cwd.as_deref()),
            context.index,
            context.dir,
        );
        let project_name = self.manifests.display_name(&project_path);

        let recorded_branch = entry
            .and_then(|e| e.git_branch.as_deref())
            .filter(|b| !b.is_empty())
            .or_else(|| last_branch(&records))
            .or(metadata.git_branch.as_deref())
            .map(str::to_string);
        let branch = self.resolve_branch(recorded_branch, &project_path);

        let message_count = entry
            .and_then(|e| e.message_count)
            .unwrap_or(metadata.message_count);

        let status = self
            .classifier
            .classify(is_active, &records, modified, now, || {
                latest_subagent_activity(&subagents_dir(log))
            });

        Some(ScannedSession {
            path: log.to_path_buf(),
            modified,
            row: SessionRow {
                session_id,
                project_path,
                project_name,
                branch,
                status,
                last_active: DateTime::<Utc>::from(modified),
                message_count,
            },
        })
    }

    /// Recorded branch if concrete, else the live branch, else `N/A`
    fn resolve_branch(&mut self, recorded: Option<String>, project_path: &Path) -> String {
        match recorded {
            Some(b) if is_concrete_branch(&b) => b.trim().to_string(),
            _ => self
                .branches
                .get(project_path)
                .unwrap_or_else(|| NO_BRANCH.to_string()),
        }
    }

    /// Re-classify one known log (quick-scan path)
    pub fn classify_log(
        &self,
        entry: &CachedSessionEntry,
        active: &ActiveProcessSet,
        modified: SystemTime,
        now: SystemTime,
    ) -> SessionStatus {
        let is_active = active.contains(&entry.session_id);
        let records = if is_active {
            read_tail(&entry.path, self.tail_bytes).unwrap_or_else(|e| {
                debug!(error = %e, "tail unreadable during quick scan");
                Vec::new()
            })
        } else {
            Vec::new()
        };
        self.classifier
            .classify(is_active, &records, modified, now, || {
                latest_subagent_activity(&entry.subagents_dir)
            })
    }
}

struct ProjectContext<'a> {
    dir: &'a Path,
    index: Option<&'a ProjectIndex>,
    entry: Option<&'a SessionIndexEntry>,
}

fn is_stale(modified: SystemTime, now: SystemTime, stale_after: Duration) -> bool {
    now.duration_since(modified)
        .map(|age| age > stale_after)
        .unwrap_or(false)
}

/// Index entry, then log cwd, then index-level path, then the decoded dir name
fn resolve_project_path(
    entry: Option<&SessionIndexEntry>,
    log_cwd: Option<&str>,
    index: Option<&ProjectIndex>,
    dir: &Path,
) -> PathBuf {
    let non_empty = |s: &&str| !s.is_empty();

    entry
        .and_then(|e| e.project_path.as_deref())
        .filter(non_empty)
        .or(log_cwd.filter(non_empty))
        .or(index.and_then(|i| i.original_path.as_deref()).filter(non_empty))
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            decode_project_dir(&name)
        })
}

/// Sort scanned sessions into display order
pub fn sort_sessions(sessions: &mut [ScannedSession]) {
    sessions.sort_by(|a, b| compare_rows(&a.row, &b.row));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FsStat;
    use crate::sessions::index::INDEX_FILE;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    struct FixedBranch(Option<&'static str>);

    impl BranchLookup for FixedBranch {
        fn current_branch(&self, _dir: &Path) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    const TOOL_USE: &str = r#"{"type":"assistant","message":{"content":[{"type":"tool_use"}]}}"#;
    const TEXT: &str = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"done"}]}}"#;

    fn scanner(root: &Path, live_branch: Option<&'static str>) -> SessionScanner {
        let settings = MonitorSettings {
            root: Some(root.to_path_buf()),
            ..Default::default()
        };
        SessionScanner::new(&settings, Arc::new(FsStat), Box::new(FixedBranch(live_branch)))
    }

    fn write_log(root: &Path, project: &str, id: &str, lines: &[&str], age: Duration) -> PathBuf {
        let dir = root.join(project);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("{}.jsonl", id));
        fs::write(&path, lines.join("\n") + "\n").unwrap();
        set_age(&path, age);
        path
    }

    fn set_age(path: &Path, age: Duration) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - age)
            .unwrap();
    }

    fn active(ids: &[&str]) -> ActiveProcessSet {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_missing_root_yields_empty() {
        let mut s = scanner(Path::new("/nonexistent/projects/root"), None);
        assert!(s.scan(&active(&[]), SystemTime::now()).is_empty());
    }

    #[test]
    fn test_waiting_scenario() {
        let root = TempDir::new().unwrap();
        write_log(root.path(), "-home-alice-app", "abc123", &[TOOL_USE], Duration::from_secs(10));

        let mut s = scanner(root.path(), None);
        let sessions = s.scan(&active(&["abc123"]), SystemTime::now());

        assert_eq!(sessions.len(), 1);
        let row = &sessions[0].row;
        assert_eq!(row.session_id, "abc123");
        assert_eq!(row.status, SessionStatus::Waiting);
        assert_eq!(row.project_path, PathBuf::from("/home/alice/app"));
        assert_eq!(row.project_name, "app");
        assert_eq!(row.branch, NO_BRANCH);
        assert_eq!(row.message_count, 1);
    }

    #[test]
    fn test_recent_tool_use_is_running_and_absent_is_inactive() {
        let root = TempDir::new().unwrap();
        write_log(root.path(), "-home-alice-app", "abc123", &[TOOL_USE], Duration::from_secs(1));

        let mut s = scanner(root.path(), None);
        let sessions = s.scan(&active(&["abc123"]), SystemTime::now());
        assert_eq!(sessions[0].row.status, SessionStatus::Running);

        let sessions = s.scan(&active(&[]), SystemTime::now());
        assert_eq!(sessions[0].row.status, SessionStatus::Inactive);
    }

    #[test]
    fn test_stale_inactive_sessions_are_dropped() {
        let root = TempDir::new().unwrap();
        let day = Duration::from_secs(24 * 3600);
        write_log(root.path(), "-p", "old", &[TEXT], day + Duration::from_secs(60));
        write_log(root.path(), "-p", "old-but-live", &[TEXT], day * 3);
        write_log(root.path(), "-p", "recent", &[TEXT], Duration::from_secs(3600));

        let mut s = scanner(root.path(), None);
        let sessions = s.scan(&active(&["old-but-live"]), SystemTime::now());
        let mut ids: Vec<&str> = sessions.iter().map(|s| s.row.session_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["old-but-live", "recent"]);
    }

    #[test]
    fn test_index_is_authoritative() {
        let root = TempDir::new().unwrap();
        write_log(
            root.path(),
            "-home-bob-svc",
            "s1",
            &[
                r#"{"type":"user","cwd":"/from/log","gitBranch":"log-branch"}"#,
                TEXT,
            ],
            Duration::from_secs(30),
        );
        let index = serde_json::json!({
            "version": 1,
            "originalPath": "/home/bob/svc",
            "entries": [{
                "sessionId": "s1",
                "projectPath": "/from/index",
                "gitBranch": "index-branch",
                "messageCount": 42,
                "isSidechain": false
            }]
        });
        fs::write(root.path().join("-home-bob-svc").join(INDEX_FILE), index.to_string()).unwrap();

        let mut s = scanner(root.path(), Some("live-branch"));
        let row = s.scan(&active(&["s1"]), SystemTime::now()).remove(0).row;
        assert_eq!(row.project_path, PathBuf::from("/from/index"));
        assert_eq!(row.branch, "index-branch");
        assert_eq!(row.message_count, 42);
        assert_eq!(row.status, SessionStatus::Idle);
    }

    #[test]
    fn test_head_branch_triggers_live_lookup() {
        let root = TempDir::new().unwrap();
        write_log(
            root.path(),
            "-p",
            "s1",
            &[r#"{"type":"user","cwd":"/work/p","gitBranch":"HEAD"}"#],
            Duration::from_secs(30),
        );

        let mut s = scanner(root.path(), Some("live-branch"));
        let row = s.scan(&active(&[]), SystemTime::now()).remove(0).row;
        assert_eq!(row.branch, "live-branch");
        assert_eq!(row.project_path, PathBuf::from("/work/p"));
    }

    #[test]
    fn test_log_branch_used_without_index() {
        let root = TempDir::new().unwrap();
        write_log(
            root.path(),
            "-p",
            "s1",
            &[r#"{"type":"user","cwd":"/work/p","gitBranch":"feat"}"#],
            Duration::from_secs(30),
        );

        let mut s = scanner(root.path(), Some("live-branch"));
        let row = s.scan(&active(&[]), SystemTime::now()).remove(0).row;
        assert_eq!(row.branch, "feat");
    }

    #[test]
    fn test_recorded_branch_is_trimmed() {
        let root = TempDir::new().unwrap();
        write_log(
            root.path(),
            "-p",
            "s1",
            &[r#"{"type":"user","cwd":"/work/p","gitBranch":" feat \n"}"#],
            Duration::from_secs(30),
        );

        let mut s = scanner(root.path(), Some("live-branch"));
        let row = s.scan(&active(&[]), SystemTime::now()).remove(0).row;
        assert_eq!(row.branch, "feat");
    }

    #[test]
    fn test_index_original_path_beats_decoded_dir_name() {
        let root = TempDir::new().unwrap();
        write_log(root.path(), "-home-x-my-app", "s1", &[TEXT], Duration::from_secs(30));
        let index = serde_json::json!({ "originalPath": "/home/x/my-app", "entries": [] });
        fs::write(root.path().join("-home-x-my-app").join(INDEX_FILE), index.to_string()).unwrap();

        let mut s = scanner(root.path(), None);
        let row = s.scan(&active(&[]), SystemTime::now()).remove(0).row;
        assert_eq!(row.project_path, PathBuf::from("/home/x/my-app"));
        assert_eq!(row.project_name, "my-app");

        // Without the index only the lossy decoding is left
        fs::remove_file(root.path().join("-home-x-my-app").join(INDEX_FILE)).unwrap();
        let row = s.scan(&active(&[]), SystemTime::now()).remove(0).row;
        assert_eq!(row.project_path, PathBuf::from("/home/x/my/app"));
    }

    #[test]
    fn test_message_count_follows_appended_records() {
        let root = TempDir::new().unwrap();
        let path = write_log(root.path(), "-p", "s1", &[TEXT], Duration::from_secs(30));

        let mut s = scanner(root.path(), None);
        assert_eq!(s.scan(&active(&[]), SystemTime::now())[0].row.message_count, 1);

        let mut body = fs::read_to_string(&path).unwrap();
        body.push_str(r#"{"type":"user"}"#);
        body.push('\n');
        body.push_str(TEXT);
        body.push('\n');
        fs::write(&path, body).unwrap();
        set_age(&path, Duration::from_secs(10));

        assert_eq!(s.scan(&active(&[]), SystemTime::now())[0].row.message_count, 3);
    }

    #[test]
    fn test_malformed_index_and_sidechain_entries() {
        let root = TempDir::new().unwrap();
        write_log(root.path(), "-a", "ok", &[TEXT], Duration::from_secs(30));
        fs::write(root.path().join("-a").join(INDEX_FILE), "{broken").unwrap();

        write_log(root.path(), "-b", "side", &[TEXT], Duration::from_secs(30));
        let index = serde_json::json!({
            "version": 1,
            "entries": [{ "sessionId": "side", "isSidechain": true }]
        });
        fs::write(root.path().join("-b").join(INDEX_FILE), index.to_string()).unwrap();

        let mut s = scanner(root.path(), None);
        let sessions = s.scan(&active(&[]), SystemTime::now());
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].row.session_id, "ok");
    }

    #[test]
    fn test_manifest_name_used_for_display() {
        let root = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        fs::write(project.path().join("package.json"), r#"{"name":"shiny"}"#).unwrap();
        let cwd_line = format!(
            r#"{{"type":"user","cwd":"{}"}}"#,
            project.path().display()
        );
        write_log(root.path(), "-x", "s1", &[&cwd_line], Duration::from_secs(30));

        let mut s = scanner(root.path(), None);
        let row = s.scan(&active(&[]), SystemTime::now()).remove(0).row;
        assert_eq!(row.project_name, "shiny");
    }

    #[test]
    fn test_results_are_sorted() {
        let root = TempDir::new().unwrap();
        write_log(root.path(), "-p", "inactive", &[TEXT], Duration::from_secs(5));
        write_log(root.path(), "-p", "idle-old", &[TEXT], Duration::from_secs(100));
        write_log(root.path(), "-p", "idle-new", &[TEXT], Duration::from_secs(50));
        write_log(root.path(), "-q", "waiting", &[TOOL_USE], Duration::from_secs(60));
        write_log(root.path(), "-q", "running", &[r#"{"type":"user"}"#], Duration::from_secs(500));

        let mut s = scanner(root.path(), None);
        let sessions = s.scan(
            &active(&["idle-old", "idle-new", "waiting", "running"]),
            SystemTime::now(),
        );
        let ids: Vec<&str> = sessions.iter().map(|s| s.row.session_id.as_str()).collect();
        assert_eq!(ids, vec!["running", "waiting", "idle-new", "idle-old", "inactive"]);
    }

    #[test]
    fn test_classify_log_for_quick_scan() {
        let root = TempDir::new().unwrap();
        write_log(root.path(), "-p", "s1", &[TOOL_USE], Duration::from_secs(10));
        let mut s = scanner(root.path(), None);
        let scanned = s.scan(&active(&["s1"]), SystemTime::now()).remove(0);
        let modified = scanned.modified;
        let entry = CachedSessionEntry::from(scanned);

        assert_eq!(
            s.classify_log(&entry, &active(&["s1"]), modified, SystemTime::now()),
            SessionStatus::Waiting
        );
        assert_eq!(
            s.classify_log(&entry, &active(&[]), modified, SystemTime::now()),
            SessionStatus::Inactive
        );

        // A busy subagent keeps the parent running
        std::fs::create_dir_all(&entry.subagents_dir).unwrap();
        std::fs::write(entry.subagents_dir.join("agent-a1.jsonl"), "{}\n").unwrap();
        assert_eq!(
            s.classify_log(&entry, &active(&["s1"]), modified, SystemTime::now()),
            SessionStatus::Running
        );
    }
}
