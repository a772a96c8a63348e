//! MegaCustom Scheduler - Timer-driven task runner
//!
//! A durable list of scheduled tasks (folder-mapping uploads, smart syncs,
//! multi-uploads) executed on cron-like cadences. The check loop wakes every
//! `check_interval` seconds, dispatches due tasks to registered
//! [`TaskRunner`]s, and persists every mutation.

pub mod scheduler;
pub mod task;

pub use scheduler::{TaskRunner, TaskScheduler};
pub use task::{Repeat, ScheduledTask, TaskKind};
