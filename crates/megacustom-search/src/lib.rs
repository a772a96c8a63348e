//! MegaCustom Search - In-memory cloud search
//!
//! Provides:
//! - Append-only node store with tombstoned removals
//! - Word, extension, and handle lookup maps
//! - Query language with filters, wildcards, regex, NOT and OR
//! - Relevance scoring and multi-key sorting
//!
//! Queries return owned result snapshots; callers never hold references into
//! the index after a call returns.

pub mod index;
pub mod query;

pub use index::{MatchSpan, SearchHit, SearchIndex, SortField, SortOrder};
pub use query::{ParsedQuery, QueryParser, TypeFilter};
