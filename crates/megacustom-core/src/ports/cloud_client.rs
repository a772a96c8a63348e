//! Cloud client port
//!
//! Capability trait over an opaque per-account session with the cloud
//! service. All methods are non-blocking or short; long work (uploads,
//! downloads) is started with `start_*` and reported through a
//! [`TransferObserver`].
//!
//! ## Design notes
//!
//! - Observer callbacks may arrive on any thread. Callers are responsible
//!   for re-marshalling them, typically by translating each callback into an
//!   event on the core's event bus.
//! - Node lookups return owned [`RemoteNode`] snapshots, never references
//!   into adapter state.
//! - Vendor error codes are mapped into the workspace [`Error`] taxonomy by
//!   the adapter; `Error::vendor_code` preserves the raw value.

use std::path::Path;
use std::sync::Arc;

use crate::domain::newtypes::{NodeHandle, SessionToken};
use crate::domain::node::{QuotaInfo, RemoteNode};
use crate::error::{Error, Result};

/// Identifier of an in-flight transfer within the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferHandle(pub u64);

/// Transfer direction, used for bulk cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Upload,
    Download,
}

/// Sink for transfer lifecycle callbacks
///
/// Each transfer owns exactly one observer. `on_progress` is delivered with
/// monotonically non-decreasing `bytes`; `on_temporary_error` reports
/// recoverable conditions (the transfer continues); `on_finish` is delivered
/// exactly once.
pub trait TransferObserver: Send + Sync {
    fn on_start(&self, handle: TransferHandle);
    fn on_progress(&self, handle: TransferHandle, bytes: u64, size: u64, speed_bps: u64);
    fn on_temporary_error(&self, handle: TransferHandle, message: &str);
    fn on_finish(&self, handle: TransferHandle, result: std::result::Result<(), Error>);
}

/// Capability trait over the vendor cloud SDK
#[async_trait::async_trait]
pub trait CloudClient: Send + Sync {
    /// Authenticate with credentials, returning a resumable session token
    async fn login(&self, email: &str, password: &str) -> Result<SessionToken>;

    /// Restore a previous session from its token
    async fn login_with_session(&self, token: &SessionToken) -> Result<()>;

    /// Whether a session is currently established
    fn is_logged_in(&self) -> bool;

    /// Snapshot of the root node
    async fn root_node(&self) -> Result<RemoteNode>;

    /// Snapshot of the node at `path`, `None` if nothing exists there
    async fn node_by_path(&self, path: &str) -> Result<Option<RemoteNode>>;

    /// Snapshots of a folder's direct children
    async fn children(&self, parent: NodeHandle) -> Result<Vec<RemoteNode>>;

    /// Name-substring search, used only to bootstrap the local index
    async fn search(&self, name_substring: &str) -> Result<Vec<RemoteNode>>;

    /// Start uploading `local` into the folder `parent` under `name`
    ///
    /// Returns immediately; progress and completion arrive on `observer`.
    fn start_upload(
        &self,
        local: &Path,
        parent: NodeHandle,
        name: &str,
        observer: Arc<dyn TransferObserver>,
    ) -> TransferHandle;

    /// Start downloading `node` to the local path `local`
    fn start_download(
        &self,
        node: NodeHandle,
        local: &Path,
        observer: Arc<dyn TransferObserver>,
    ) -> TransferHandle;

    /// Create a folder at `path`, creating missing ancestors
    async fn create_folder(&self, path: &str) -> Result<RemoteNode>;

    /// Remove a node (recursively for folders)
    async fn remove(&self, node: NodeHandle) -> Result<()>;

    /// Rename a node in place
    async fn rename(&self, node: NodeHandle, new_name: &str) -> Result<()>;

    /// Cancel one in-flight transfer; the observer still receives
    /// `on_finish(Err(cancelled))`
    fn cancel_transfer(&self, handle: TransferHandle);

    /// Cancel every in-flight transfer of the given kind
    fn cancel_transfers(&self, kind: TransferKind);

    /// Storage quota as reported by the service
    async fn quota(&self) -> Result<QuotaInfo>;
}
