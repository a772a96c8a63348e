//! Domain entities
//!
//! Core domain types shared by every subsystem:
//! - Newtypes for type-safe identifiers
//! - Account entity
//! - Remote-node snapshots

pub mod account;
pub mod newtypes;
pub mod node;

pub use account::Account;
pub use newtypes::{AccountId, NodeHandle, RemotePath, SessionToken};
pub use node::{NodeKind, QuotaInfo, RemoteNode};
