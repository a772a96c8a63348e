//! MegaCustom Sync - Bidirectional synchronization
//!
//! Provides:
//! - Persistent sync profiles with include/exclude filtering
//! - Non-mutating tree analysis producing a staged action plan
//! - Conflict detection with configurable resolution policies
//! - One-at-a-time sync execution with pause/cancel and history
//! - Named folder mappings with incremental upload

pub mod analyzer;
pub mod engine;
pub mod mapper;
pub mod profile;

pub use analyzer::{ActionKind, AnalysisReport, SyncAction, SyncAnalyzer, SyncConflict};
pub use engine::{SyncEngine, SyncHistoryEntry, SyncOutcome};
pub use mapper::{FolderMapper, FolderMapping, UploadOptions, UploadPreviewEntry};
pub use profile::{ConflictPolicy, ProfileStore, SyncDirection, SyncProfile};
