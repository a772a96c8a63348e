//! MegaCustom Rename - Bulk rename planner
//!
//! Provides:
//! - Regex-driven rename patterns with case conversion, numbering,
//!   date insertion, and filesystem sanitization
//! - Non-mutating previews with conflict detection
//! - Apply with pluggable conflict resolution
//! - Bounded undo/redo history
//! - Named rules and built-in templates with JSON import/export

pub mod pattern;
pub mod renamer;

pub use pattern::{CaseConversion, RenamePattern};
pub use renamer::{RenamePreview, RenameResult, Renamer};
