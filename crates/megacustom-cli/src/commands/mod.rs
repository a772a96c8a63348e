pub mod auth;
pub mod map;
pub mod rename;
pub mod schedule;
pub mod search;
pub mod sync;
pub mod transfers;
pub mod upload;
