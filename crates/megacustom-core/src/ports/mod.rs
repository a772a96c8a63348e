//! Port definitions
//!
//! The [`CloudClient`] trait is the boundary to the vendor SDK. Only the
//! adapter behind it holds live vendor handles; everything above works on
//! [`RemoteNode`](crate::domain::node::RemoteNode) snapshots.
//!
//! [`memory::MemoryCloudClient`] is a deterministic in-memory adapter used by
//! unit tests throughout the workspace and by the CLI's offline mode.

pub mod cloud_client;
pub mod memory;

pub use cloud_client::{CloudClient, TransferHandle, TransferKind, TransferObserver};
pub use memory::MemoryCloudClient;
