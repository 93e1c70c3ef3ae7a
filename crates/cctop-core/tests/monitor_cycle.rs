//! End-to-end refresh cycle over a fake `~/.claude/projects` tree.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use cctop_core::cache::{Clock, FsStat};
use cctop_core::git::BranchLookup;
use cctop_core::monitor::ScanKind;
use cctop_core::process::{ProcessEntry, ProcessTable};
use cctop_core::sessions::NO_BRANCH;
use cctop_core::{MonitorError, MonitorSettings, Result, SessionMonitor, SessionStatus};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct TestClock(Mutex<SystemTime>);

impl Clock for TestClock {
    fn now(&self) -> SystemTime {
        *self.0.lock().unwrap()
    }
}

/// One heuristic `claude` process started in `/home/alice/app`
struct HeuristicTable {
    started: SystemTime,
}

impl ProcessTable for HeuristicTable {
    fn list(&self) -> Result<Vec<ProcessEntry>> {
        Ok(vec![
            ProcessEntry {
                pid: 4242,
                args: vec!["node".into(), "/usr/lib/claude".into()],
            },
            ProcessEntry {
                pid: 1,
                args: vec!["/sbin/init".into()],
            },
        ])
    }

    fn cwd(&self, pid: u32) -> Result<PathBuf> {
        match pid {
            4242 => Ok(PathBuf::from("/home/alice/app")),
            _ => Err(MonitorError::ProcessUnavailable {
                pid,
                reason: "permission denied".into(),
            }),
        }
    }

    fn start_time(&self, _pid: u32) -> Result<SystemTime> {
        Ok(self.started)
    }
}

struct Branch;

impl BranchLookup for Branch {
    fn current_branch(&self, dir: &Path) -> Option<String> {
        (dir == Path::new("/home/alice/app")).then(|| "main".to_string())
    }
}

fn write_line(path: &Path, lines: &[&str]) {
    std::fs::write(path, lines.join("\n") + "\n").unwrap();
}

#[test]
fn test_heuristic_match_and_quick_refresh() {
    let root = TempDir::new().unwrap();
    let project = root.path().join("-home-alice-app");
    std::fs::create_dir_all(&project).unwrap();

    // An older log in the same project, written first so it never wins the match
    write_line(
        &project.join("old999.jsonl"),
        &[r#"{"type":"assistant","message":{"content":[{"type":"text","text":"bye"}]}}"#],
    );
    std::fs::File::options()
        .write(true)
        .open(project.join("old999.jsonl"))
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(3600))
        .unwrap();
    std::thread::sleep(Duration::from_millis(20));

    let created = chrono::Utc::now();
    let log = project.join("abc123.jsonl");
    write_line(
        &log,
        &[
            &format!(r#"{{"type":"user","timestamp":"{}"}}"#, created.to_rfc3339()),
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Bash"}]}}"#,
        ],
    );

    // Log birth time where available, else the first record's timestamp
    let log_created = std::fs::metadata(&log)
        .and_then(|m| m.created())
        .unwrap_or_else(|_| SystemTime::from(created));

    let settings = MonitorSettings {
        root: Some(root.path().to_path_buf()),
        ..Default::default()
    };
    let clock = Arc::new(TestClock(Mutex::new(
        SystemTime::now() + Duration::from_secs(10),
    )));
    let mut monitor = SessionMonitor::with_parts(
        &settings,
        Box::new(HeuristicTable {
            started: log_created + Duration::from_secs(2),
        }),
        Box::new(Branch),
        clock.clone(),
        Arc::new(FsStat),
    );

    let rows = monitor.tick().expect("initial tick scans");
    assert_eq!(monitor.last_scan(), Some(ScanKind::Full));
    assert_eq!(rows.len(), 2);

    let first = &rows[0];
    assert_eq!(first.session_id, "abc123");
    assert_eq!(first.status, SessionStatus::Waiting);
    assert_eq!(first.project_path, PathBuf::from("/home/alice/app"));
    assert_eq!(first.project_name, "app");
    assert_eq!(first.branch, "main");
    assert_eq!(first.message_count, 2);

    assert_eq!(rows[1].session_id, "old999");
    assert_eq!(rows[1].status, SessionStatus::Inactive);

    // Nothing changed: quiet tick
    *clock.0.lock().unwrap() += Duration::from_millis(200);
    assert!(monitor.tick().is_none());

    // The user approves the tool; the log grows
    write_line(
        &log,
        &[
            &format!(r#"{{"type":"user","timestamp":"{}"}}"#, created.to_rfc3339()),
            r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Bash"}]}}"#,
            r#"{"type":"user","message":{"content":[{"type":"tool_result"}]}}"#,
        ],
    );
    std::fs::File::options()
        .write(true)
        .open(&log)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(1))
        .unwrap();
    monitor.mark_dirty();

    let rows = monitor.tick().expect("dirty tick refreshes");
    assert_eq!(monitor.last_scan(), Some(ScanKind::Quick));
    assert_eq!(rows[0].status, SessionStatus::Running);
    assert_eq!(rows[0].message_count, 2, "counts refresh on full scans only");
    assert_eq!(rows[1].branch, "main");

    monitor.shutdown();
}

#[test]
fn test_missing_root_is_empty_not_error() {
    let settings = MonitorSettings {
        root: Some(PathBuf::from("/definitely/not/here/projects")),
        ..Default::default()
    };
    let mut monitor = SessionMonitor::with_parts(
        &settings,
        Box::new(HeuristicTable {
            started: SystemTime::now(),
        }),
        Box::new(Branch),
        Arc::new(TestClock(Mutex::new(SystemTime::now()))),
        Arc::new(FsStat),
    );
    assert!(monitor.refresh().is_empty());
    assert_eq!(NO_BRANCH, "N/A");
}
