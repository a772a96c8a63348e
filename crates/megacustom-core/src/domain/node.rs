//! Remote-node snapshots
//!
//! A [`RemoteNode`] is an owned, value-typed copy of a node in the remote
//! tree, taken at the `CloudClient` boundary. Snapshots are immutable after
//! creation and carry no vendor state, so they can cross subsystem boundaries
//! and outlive the lock or request that produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::NodeHandle;

/// Whether a remote node is a file or a folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Folder,
}

impl NodeKind {
    pub fn is_folder(&self) -> bool {
        matches!(self, NodeKind::Folder)
    }
}

/// Snapshot of a remote node
///
/// Two nodes are equal iff their `handle` matches; all other fields are
/// point-in-time data that re-indexing or notifications may refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteNode {
    /// Stable identifier assigned by the cloud service
    pub handle: NodeHandle,
    /// Node name (final path component)
    pub name: String,
    /// Absolute path within the remote namespace
    pub path: String,
    /// Handle of the containing folder (self for the root)
    pub parent: NodeHandle,
    /// Size in bytes (0 for folders)
    pub size: u64,
    /// Creation time
    pub ctime: DateTime<Utc>,
    /// Last modification time
    pub mtime: DateTime<Utc>,
    /// File or folder
    pub kind: NodeKind,
}

impl RemoteNode {
    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    pub fn is_file(&self) -> bool {
        !self.kind.is_folder()
    }

    /// Lowercase extension without the dot, `None` for folders and
    /// extension-less names
    pub fn extension(&self) -> Option<String> {
        if self.is_folder() {
            return None;
        }
        let dot = self.name.rfind('.')?;
        if dot == 0 || dot == self.name.len() - 1 {
            return None;
        }
        Some(self.name[dot + 1..].to_lowercase())
    }

    /// Number of folder components above this node (root children have
    /// depth 0)
    pub fn depth(&self) -> u32 {
        self.path.matches('/').count().saturating_sub(1) as u32
    }
}

impl PartialEq for RemoteNode {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for RemoteNode {}

/// Storage quota reported by the cloud service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaInfo {
    pub used: u64,
    pub total: u64,
}
