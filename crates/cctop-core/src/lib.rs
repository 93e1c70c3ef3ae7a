//! cctop-core: session discovery and status inference for Claude Code.
//!
//! The engine walks `~/.claude/projects`, correlates session logs with live
//! `claude` processes, classifies every session from the tail of its log and
//! keeps the result fresh through a cheap quick scan / expensive full scan
//! cycle. Renderers only ever see the sorted [`SessionRow`] list.

pub mod cache;
pub mod config;
pub mod error;
pub mod git;
pub mod manifest;
pub mod monitor;
pub mod process;
pub mod sessions;

pub use config::MonitorSettings;
pub use error::{MonitorError, Result};
pub use monitor::SessionMonitor;
pub use sessions::{SessionRow, SessionStatus};
