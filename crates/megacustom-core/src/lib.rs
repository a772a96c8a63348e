//! MegaCustom Core - Domain logic and shared services
//!
//! This crate contains the shared foundation the subsystem crates build on:
//! - **Domain entities** - `Account`, `RemoteNode`, validated newtypes
//! - **Error taxonomy** - `Error` with `(category, code, message, details)`
//! - **Ports** - the `CloudClient` trait over the vendor SDK, plus the
//!   in-memory adapter used by tests
//! - **Event bus** - typed events published by every subsystem
//! - **Account registry** - multi-account routing with a single active account
//!
//! # Architecture
//!
//! Subsystems never hold live vendor handles; remote nodes cross boundaries
//! as owned snapshots (`RemoteNode`). The `CloudClient` port is the only
//! place where vendor state lives, and it is shared via `Arc`.

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod ports;
pub mod registry;
pub mod wildcard;

pub use error::{Error, ErrorCategory, Result};
