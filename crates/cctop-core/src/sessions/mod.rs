//! Session discovery: log tails, indexes, classification and scanning.

pub mod classifier;
pub mod index;
pub mod scanner;
pub mod tail;
mod types;

pub use scanner::{ScannedSession, SessionScanner};
pub use types::{compare_rows, sort_rows, SessionRow, SessionStatus, NO_BRANCH};
