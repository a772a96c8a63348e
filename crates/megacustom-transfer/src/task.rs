//! Transfer task records
//!
//! ## State machine
//!
//! ```text
//! Pending ──► Active ──► { Completed | Failed | Cancelled }
//!               ▲ │
//!               │ ▼
//!             Paused
//! ```
//!
//! Retry reopens a terminal `Failed` back to `Pending` with incremented
//! `retries` and cleared `bytes`. Resume re-enqueues a `Paused` task with
//! `bytes = 0` (restart semantics).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use megacustom_core::ports::cloud_client::TransferKind;

/// State of a transfer task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Active,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    /// Terminal states can only be left via `retry` (Failed only)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            TaskState::Pending => "Pending",
            TaskState::Active => "Active",
            TaskState::Paused => "Paused",
            TaskState::Completed => "Completed",
            TaskState::Failed => "Failed",
            TaskState::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One queued upload or download
///
/// Invariants: `bytes <= size`, and a terminal state implies `ended` is set.
#[derive(Debug, Clone)]
pub struct TransferTask {
    pub id: u64,
    pub kind: TransferKind,
    /// File name shown in progress reports
    pub name: String,
    /// Local file path (source for uploads, destination for downloads)
    pub local_path: PathBuf,
    /// Remote path (destination folder for uploads, node path for downloads)
    pub remote_path: String,
    pub size: u64,
    pub bytes: u64,
    pub speed_bps: u64,
    pub state: TaskState,
    pub error: Option<String>,
    pub priority: i32,
    pub retries: u32,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
}

impl TransferTask {
    pub fn new(
        id: u64,
        kind: TransferKind,
        name: String,
        local_path: PathBuf,
        remote_path: String,
        size: u64,
    ) -> Self {
        Self {
            id,
            kind,
            name,
            local_path,
            remote_path,
            size,
            bytes: 0,
            speed_bps: 0,
            state: TaskState::Pending,
            error: None,
            priority: 0,
            retries: 0,
            started: None,
            ended: None,
        }
    }

    pub fn mark_active(&mut self) {
        self.state = TaskState::Active;
        self.started = Some(Utc::now());
    }

    pub fn mark_paused(&mut self) {
        self.state = TaskState::Paused;
        self.speed_bps = 0;
    }

    /// Back onto the pending queue after pause (restart semantics)
    pub fn reopen_from_pause(&mut self) {
        self.state = TaskState::Pending;
        self.bytes = 0;
        self.speed_bps = 0;
    }

    /// Back onto the pending queue after failure
    pub fn reopen_from_failure(&mut self) {
        self.state = TaskState::Pending;
        self.bytes = 0;
        self.speed_bps = 0;
        self.retries += 1;
        self.error = None;
        self.ended = None;
    }

    pub fn complete(&mut self) {
        self.state = TaskState::Completed;
        self.bytes = self.size;
        self.speed_bps = 0;
        self.ended = Some(Utc::now());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = TaskState::Failed;
        self.error = Some(message.into());
        self.speed_bps = 0;
        self.ended = Some(Utc::now());
    }

    pub fn cancel(&mut self) {
        self.state = TaskState::Cancelled;
        self.speed_bps = 0;
        self.ended = Some(Utc::now());
    }

    pub fn record_progress(&mut self, bytes: u64, size: u64, speed_bps: u64) {
        // The observer contract guarantees non-decreasing bytes, but guard
        // anyway so a misbehaving adapter cannot violate the invariant
        self.bytes = self.bytes.max(bytes);
        if size > 0 {
            self.size = size;
        }
        if self.size > 0 {
            self.bytes = self.bytes.min(self.size);
        }
        self.speed_bps = speed_bps;
    }

    pub fn progress_percent(&self) -> u8 {
        if self.size == 0 {
            return if self.state == TaskState::Completed { 100 } else { 0 };
        }
        ((self.bytes * 100) / self.size).min(100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> TransferTask {
        TransferTask::new(
            1,
            TransferKind::Upload,
            "a.txt".to_string(),
            PathBuf::from("/tmp/a.txt"),
            "/docs".to_string(),
            100,
        )
    }

    #[test]
    fn test_terminal_states_set_ended() {
        let mut t = task();
        t.mark_active();
        assert!(t.started.is_some());
        assert!(t.ended.is_none());

        t.complete();
        assert!(t.state.is_terminal());
        assert!(t.ended.is_some());
        assert_eq!(t.bytes, t.size);

        let mut t = task();
        t.mark_active();
        t.fail("boom");
        assert!(t.ended.is_some());
        assert_eq!(t.error.as_deref(), Some("boom"));

        let mut t = task();
        t.cancel();
        assert!(t.ended.is_some());
    }

    #[test]
    fn test_retry_clears_progress() {
        let mut t = task();
        t.mark_active();
        t.record_progress(40, 100, 5);
        t.fail("network");

        t.reopen_from_failure();
        assert_eq!(t.state, TaskState::Pending);
        assert_eq!(t.bytes, 0);
        assert_eq!(t.retries, 1);
        assert!(t.error.is_none());
        assert!(t.ended.is_none());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut t = task();
        t.mark_active();
        t.record_progress(50, 100, 10);
        t.record_progress(30, 100, 10);
        assert_eq!(t.bytes, 50);
    }

    #[test]
    fn test_zero_byte_file_percent() {
        let mut t = task();
        t.size = 0;
        assert_eq!(t.progress_percent(), 0);
        t.mark_active();
        t.complete();
        assert_eq!(t.progress_percent(), 100);
    }
}
