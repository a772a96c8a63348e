//! MegaCustom Transfer - Queue and upload routing
//!
//! Provides:
//! - Admission-controlled transfer queue with bounded concurrency
//! - Progress fan-out and queue summaries on the event bus
//! - Pause/resume, cancel, retry, and priority reordering
//! - Rule-based multi-destination upload batches

pub mod scheduler;
pub mod task;
pub mod uploader;

pub use scheduler::TransferScheduler;
pub use task::{TaskState, TransferTask};
pub use uploader::{MultiUploader, RuleKind, UploadRule};
