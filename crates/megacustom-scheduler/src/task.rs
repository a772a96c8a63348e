//! Scheduled task records
//!
//! Persisted in `scheduler.json` as `{nextTaskId, checkInterval, tasks}`.
//! Ids are monotonic integers preserved across restarts.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Which engine a task dispatches to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    FolderMapping,
    SmartSync,
    MultiUpload,
}

/// Repeat cadence
///
/// The interval counts from the *end* of a run, not from the scheduled
/// time: `Hourly(2)` reschedules two hours after the run finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "every", rename_all = "snake_case")]
pub enum Repeat {
    Once,
    Hourly(u32),
    Daily(u32),
    Weekly(u32),
}

impl Repeat {
    /// Next run time counted from `now`, `None` for one-shot tasks
    pub fn next_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Repeat::Once => None,
            Repeat::Hourly(n) => Some(now + Duration::hours(*n as i64)),
            Repeat::Daily(n) => Some(now + Duration::days(*n as i64)),
            Repeat::Weekly(n) => Some(now + Duration::weeks(*n as i64)),
        }
    }
}

/// One schedulable unit of work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduledTask {
    pub id: u64,
    pub name: String,
    pub kind: TaskKind,
    pub repeat: Repeat,
    pub next_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
    pub enabled: bool,
    /// Mapping name, sync profile name, or ruleset name, per `kind`
    pub target_name: String,
    pub last_status: String,
    pub consecutive_failures: u32,
    #[serde(skip)]
    pub is_running: bool,
}

impl Default for ScheduledTask {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            kind: TaskKind::SmartSync,
            repeat: Repeat::Once,
            next_run: None,
            last_run: None,
            enabled: true,
            target_name: String::new(),
            last_status: String::new(),
            consecutive_failures: 0,
            is_running: false,
        }
    }
}

impl ScheduledTask {
    pub fn new(name: impl Into<String>, kind: TaskKind, repeat: Repeat, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            repeat,
            target_name: target.into(),
            ..Default::default()
        }
    }

    /// Whether the task should run at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && !self.is_running
            && self.next_run.map(|t| t <= now).unwrap_or(false)
    }

    /// Record a finished run and reschedule
    ///
    /// `Once` tasks disable themselves; success resets the failure counter.
    pub fn record_run(&mut self, ok: bool, status: impl Into<String>, now: DateTime<Utc>) {
        self.is_running = false;
        self.last_run = Some(now);
        self.last_status = status.into();
        if ok {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
        }
        self.next_run = self.repeat.next_from(now);
        if self.next_run.is_none() {
            self.enabled = false;
        }
    }
}
