//! Type-safe identifiers and validated value types
//!
//! Newtypes prevent accidental mixing of account ids, node handles, and raw
//! strings across subsystem boundaries.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Unique identifier for an account, stable for the account's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(Uuid);

impl AccountId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from the canonical hyphenated form
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::validation(format!("Invalid account id: {e}")))
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable numeric identifier of a remote node, assigned by the cloud service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(pub u64);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Absolute path within the remote namespace
///
/// Always starts with `/`; `/` alone is the cloud root. Components are
/// separated by single slashes and the path never ends with a trailing slash
/// (except for the root itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(Error::validation(format!(
                "Remote path must be absolute: {path}"
            )));
        }
        if path.contains("//") {
            return Err(Error::validation(format!(
                "Remote path contains empty component: {path}"
            )));
        }
        let normalized = if path.len() > 1 && path.ends_with('/') {
            path.trim_end_matches('/').to_string()
        } else {
            path
        };
        Ok(Self(normalized))
    }

    /// The cloud root, `/`
    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the containing folder, `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.0 == "/" {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Final component of the path, `None` for the root
    pub fn file_name(&self) -> Option<&str> {
        if self.0 == "/" {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// Append a child component
    pub fn join(&self, name: &str) -> Self {
        if self.0 == "/" {
            Self(format!("/{name}"))
        } else {
            Self(format!("{}/{name}", self.0))
        }
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque session token bytes
///
/// Never printed; the `Debug` impl redacts the content. Tokens move from the
/// credential vault straight into `CloudClient::login_with_session`.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(Vec<u8>);

impl SessionToken {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_roundtrip() {
        let id = AccountId::new();
        let parsed = AccountId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_account_id_rejects_garbage() {
        assert!(AccountId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_remote_path_validation() {
        assert!(RemotePath::new("relative/path").is_err());
        assert!(RemotePath::new("/a//b").is_err());
        assert_eq!(RemotePath::new("/a/b/").unwrap().as_str(), "/a/b");
        assert_eq!(RemotePath::root().as_str(), "/");
    }

    #[test]
    fn test_remote_path_parent_and_name() {
        let path = RemotePath::new("/docs/reports/q1.pdf").unwrap();
        assert_eq!(path.file_name(), Some("q1.pdf"));
        assert_eq!(path.parent().unwrap().as_str(), "/docs/reports");

        let top = RemotePath::new("/docs").unwrap();
        assert_eq!(top.parent().unwrap().as_str(), "/");
        assert!(RemotePath::root().parent().is_none());
        assert!(RemotePath::root().file_name().is_none());
    }

    #[test]
    fn test_remote_path_join() {
        assert_eq!(RemotePath::root().join("a").as_str(), "/a");
        assert_eq!(
            RemotePath::new("/a").unwrap().join("b.txt").as_str(),
            "/a/b.txt"
        );
    }

    #[test]
    fn test_session_token_debug_redacts() {
        let token = SessionToken::new(b"super-secret".to_vec());
        assert_eq!(format!("{:?}", token), "SessionToken(12 bytes)");
    }
}
