//! In-memory cloud client
//!
//! A deterministic [`CloudClient`] adapter backed by an in-memory node tree.
//! Unit tests across the workspace run against it, and the CLI uses it as an
//! offline backend. Transfers either complete immediately or, in *held*
//! mode, stay in flight until the test releases them - which is how the
//! admission-control tests observe intermediate queue states.
//!
//! Observer callbacks are delivered on the calling thread; real adapters
//! deliver them from SDK worker threads, which callers must already tolerate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::domain::newtypes::{NodeHandle, SessionToken};
use crate::domain::node::{NodeKind, QuotaInfo, RemoteNode};
use crate::error::{Error, Result};

use super::cloud_client::{CloudClient, TransferHandle, TransferKind, TransferObserver};

/// Root node handle; the tree always contains it
const ROOT_HANDLE: NodeHandle = NodeHandle(1);

struct HeldTransfer {
    kind: TransferKind,
    observer: std::sync::Arc<dyn TransferObserver>,
    local: PathBuf,
    parent: NodeHandle,
    name: String,
    size: u64,
    mtime: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    nodes: HashMap<NodeHandle, RemoteNode>,
    accounts: HashMap<String, String>,
    issued_tokens: Vec<SessionToken>,
    logged_in: bool,
    next_handle: u64,
    next_transfer: u64,
    hold_transfers: bool,
    held: HashMap<TransferHandle, HeldTransfer>,
    fail_next: Option<String>,
}

/// Deterministic in-memory cloud backend
pub struct MemoryCloudClient {
    state: Mutex<State>,
}

impl MemoryCloudClient {
    /// Create a client with an empty tree and no registered accounts
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_HANDLE,
            RemoteNode {
                handle: ROOT_HANDLE,
                name: String::new(),
                path: "/".to_string(),
                parent: ROOT_HANDLE,
                size: 0,
                ctime: Utc::now(),
                mtime: Utc::now(),
                kind: NodeKind::Folder,
            },
        );
        Self {
            state: Mutex::new(State {
                nodes,
                next_handle: 2,
                next_transfer: 1,
                logged_in: true,
                ..Default::default()
            }),
        }
    }

    /// Register a login credential pair
    pub fn register_account(&self, email: &str, password: &str) {
        let mut state = self.state.lock().unwrap();
        state.accounts.insert(email.to_string(), password.to_string());
        state.logged_in = false;
    }

    /// Hold started transfers in flight until explicitly completed
    pub fn hold_transfers(&self, hold: bool) {
        self.state.lock().unwrap().hold_transfers = hold;
    }

    /// Fail the next started transfer with the given message
    pub fn fail_next_transfer(&self, message: &str) {
        self.state.lock().unwrap().fail_next = Some(message.to_string());
    }

    /// Number of transfers currently held in flight
    pub fn in_flight(&self) -> usize {
        self.state.lock().unwrap().held.len()
    }

    /// Complete one held transfer successfully
    pub fn complete_transfer(&self, handle: TransferHandle) {
        let held = self.state.lock().unwrap().held.remove(&handle);
        if let Some(held) = held {
            self.finish_held(handle, held, None);
        }
    }

    /// Complete every held transfer successfully, in start order
    pub fn complete_all_transfers(&self) {
        loop {
            let next = {
                let state = self.state.lock().unwrap();
                state.held.keys().min_by_key(|h| h.0).copied()
            };
            match next {
                Some(handle) => self.complete_transfer(handle),
                None => break,
            }
        }
    }

    /// Fail one held transfer
    pub fn fail_transfer(&self, handle: TransferHandle, message: &str) {
        let held = self.state.lock().unwrap().held.remove(&handle);
        if let Some(held) = held {
            self.finish_held(handle, held, Some(message.to_string()));
        }
    }

    /// Insert a folder (and missing ancestors) directly into the tree
    pub fn seed_folder(&self, path: &str) -> NodeHandle {
        let mut state = self.state.lock().unwrap();
        Self::ensure_folder(&mut state, path)
    }

    /// Insert a file directly into the tree, creating parent folders
    pub fn seed_file(&self, path: &str, size: u64, mtime: DateTime<Utc>) -> NodeHandle {
        let mut state = self.state.lock().unwrap();
        let (dir, name) = split_path(path);
        let parent = Self::ensure_folder(&mut state, &dir);
        Self::insert_child(&mut state, parent, name, NodeKind::File, size, mtime)
    }

    /// Total number of nodes, root included
    pub fn node_count(&self) -> usize {
        self.state.lock().unwrap().nodes.len()
    }

    fn ensure_folder(state: &mut State, path: &str) -> NodeHandle {
        let mut current = ROOT_HANDLE;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let existing = state.nodes.values().find(|n| {
                n.parent == current && n.name == component && n.handle != ROOT_HANDLE
            });
            current = match existing {
                Some(node) => node.handle,
                None => Self::insert_child(
                    state,
                    current,
                    component,
                    NodeKind::Folder,
                    0,
                    Utc::now(),
                ),
            };
        }
        current
    }

    fn insert_child(
        state: &mut State,
        parent: NodeHandle,
        name: &str,
        kind: NodeKind,
        size: u64,
        mtime: DateTime<Utc>,
    ) -> NodeHandle {
        // Overwrite an existing child of the same name, like the real service
        if let Some(existing) = state
            .nodes
            .values()
            .find(|n| n.parent == parent && n.name == name && n.handle != ROOT_HANDLE)
            .map(|n| n.handle)
        {
            let node = state.nodes.get_mut(&existing).unwrap();
            node.size = size;
            node.mtime = mtime;
            return existing;
        }

        let handle = NodeHandle(state.next_handle);
        state.next_handle += 1;
        let parent_path = state.nodes[&parent].path.clone();
        let path = if parent_path == "/" {
            format!("/{name}")
        } else {
            format!("{parent_path}/{name}")
        };
        state.nodes.insert(
            handle,
            RemoteNode {
                handle,
                name: name.to_string(),
                path,
                parent,
                size,
                ctime: mtime,
                mtime,
                kind,
            },
        );
        handle
    }

    fn finish_held(&self, handle: TransferHandle, held: HeldTransfer, error: Option<String>) {
        match error {
            Some(message) => {
                held.observer
                    .on_finish(handle, Err(Error::transfer_failed(message)));
            }
            None => {
                match held.kind {
                    TransferKind::Upload => {
                        let mut state = self.state.lock().unwrap();
                        Self::insert_child(
                            &mut state,
                            held.parent,
                            &held.name,
                            NodeKind::File,
                            held.size,
                            held.mtime,
                        );
                    }
                    TransferKind::Download => {
                        let size = held.size as usize;
                        let _ = std::fs::write(&held.local, vec![0u8; size]);
                    }
                }
                held.observer
                    .on_progress(handle, held.size, held.size, held.size.max(1));
                held.observer.on_finish(handle, Ok(()));
            }
        }
    }

    fn begin_transfer(
        &self,
        kind: TransferKind,
        local: &Path,
        parent: NodeHandle,
        name: &str,
        node: Option<NodeHandle>,
        observer: std::sync::Arc<dyn TransferObserver>,
    ) -> TransferHandle {
        let (handle, size, released, fail) = {
            let mut state = self.state.lock().unwrap();
            let handle = TransferHandle(state.next_transfer);
            state.next_transfer += 1;
            let fail = state.fail_next.take();

            let (size, mtime) = match kind {
                TransferKind::Upload => match std::fs::metadata(local) {
                    Ok(meta) => {
                        let mtime = meta
                            .modified()
                            .map(DateTime::<Utc>::from)
                            .unwrap_or_else(|_| Utc::now());
                        (meta.len(), mtime)
                    }
                    Err(_) => (0, Utc::now()),
                },
                TransferKind::Download => {
                    let size = node
                        .and_then(|h| state.nodes.get(&h))
                        .map(|n| n.size)
                        .unwrap_or(0);
                    (size, Utc::now())
                }
            };

            let record = HeldTransfer {
                kind,
                observer: std::sync::Arc::clone(&observer),
                local: local.to_path_buf(),
                parent,
                name: name.to_string(),
                size,
                mtime,
            };

            let released = if state.hold_transfers && fail.is_none() {
                state.held.insert(handle, record);
                None
            } else {
                Some(record)
            };
            (handle, size, released, fail)
        };

        observer.on_start(handle);
        observer.on_progress(handle, 0, size, 0);

        if let Some(record) = released {
            self.finish_held(handle, record, fail);
        }
        handle
    }
}

impl Default for MemoryCloudClient {
    fn default() -> Self {
        Self::new()
    }
}

fn split_path(path: &str) -> (String, &str) {
    match path.rfind('/') {
        Some(0) => ("/".to_string(), &path[1..]),
        Some(idx) => (path[..idx].to_string(), &path[idx + 1..]),
        None => ("/".to_string(), path),
    }
}

#[async_trait::async_trait]
impl CloudClient for MemoryCloudClient {
    async fn login(&self, email: &str, password: &str) -> Result<SessionToken> {
        let mut state = self.state.lock().unwrap();
        match state.accounts.get(email) {
            Some(stored) if stored == password => {
                let token = SessionToken::new(format!("session:{email}").into_bytes());
                state.issued_tokens.push(token.clone());
                state.logged_in = true;
                Ok(token)
            }
            _ => Err(Error::new(
                crate::error::codes::AUTH_INVALID_CREDENTIALS,
                "Invalid credentials",
            )),
        }
    }

    async fn login_with_session(&self, token: &SessionToken) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.accounts.is_empty() || state.issued_tokens.iter().any(|t| t == token) {
            state.logged_in = true;
            Ok(())
        } else {
            Err(Error::session_expired())
        }
    }

    fn is_logged_in(&self) -> bool {
        self.state.lock().unwrap().logged_in
    }

    async fn root_node(&self) -> Result<RemoteNode> {
        Ok(self.state.lock().unwrap().nodes[&ROOT_HANDLE].clone())
    }

    async fn node_by_path(&self, path: &str) -> Result<Option<RemoteNode>> {
        let normalized = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };
        let state = self.state.lock().unwrap();
        Ok(state.nodes.values().find(|n| n.path == normalized).cloned())
    }

    async fn children(&self, parent: NodeHandle) -> Result<Vec<RemoteNode>> {
        let state = self.state.lock().unwrap();
        if !state.nodes.contains_key(&parent) {
            return Err(Error::node_not_found(format!("handle {parent}")));
        }
        let mut children: Vec<RemoteNode> = state
            .nodes
            .values()
            .filter(|n| n.parent == parent && n.handle != ROOT_HANDLE)
            .cloned()
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(children)
    }

    async fn search(&self, name_substring: &str) -> Result<Vec<RemoteNode>> {
        let needle = name_substring.to_lowercase();
        let state = self.state.lock().unwrap();
        Ok(state
            .nodes
            .values()
            .filter(|n| n.handle != ROOT_HANDLE && n.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    fn start_upload(
        &self,
        local: &Path,
        parent: NodeHandle,
        name: &str,
        observer: std::sync::Arc<dyn TransferObserver>,
    ) -> TransferHandle {
        self.begin_transfer(TransferKind::Upload, local, parent, name, None, observer)
    }

    fn start_download(
        &self,
        node: NodeHandle,
        local: &Path,
        observer: std::sync::Arc<dyn TransferObserver>,
    ) -> TransferHandle {
        self.begin_transfer(
            TransferKind::Download,
            local,
            ROOT_HANDLE,
            "",
            Some(node),
            observer,
        )
    }

    async fn create_folder(&self, path: &str) -> Result<RemoteNode> {
        let mut state = self.state.lock().unwrap();
        let handle = Self::ensure_folder(&mut state, path);
        Ok(state.nodes[&handle].clone())
    }

    async fn remove(&self, node: NodeHandle) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if node == ROOT_HANDLE {
            return Err(Error::validation("Cannot remove the root node"));
        }
        if !state.nodes.contains_key(&node) {
            return Err(Error::node_not_found(format!("handle {node}")));
        }
        // Collect the subtree, then drop it
        let mut doomed = vec![node];
        let mut frontier = vec![node];
        while let Some(current) = frontier.pop() {
            let children: Vec<NodeHandle> = state
                .nodes
                .values()
                .filter(|n| n.parent == current && n.handle != ROOT_HANDLE)
                .map(|n| n.handle)
                .collect();
            doomed.extend(&children);
            frontier.extend(children);
        }
        for handle in doomed {
            state.nodes.remove(&handle);
        }
        Ok(())
    }

    async fn rename(&self, node: NodeHandle, new_name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let (old_path, parent) = match state.nodes.get(&node) {
            Some(n) if n.handle != ROOT_HANDLE => (n.path.clone(), n.parent),
            _ => return Err(Error::node_not_found(format!("handle {node}"))),
        };
        let parent_path = state.nodes[&parent].path.clone();
        let new_path = if parent_path == "/" {
            format!("/{new_name}")
        } else {
            format!("{parent_path}/{new_name}")
        };

        let entry = state.nodes.get_mut(&node).unwrap();
        entry.name = new_name.to_string();
        entry.path = new_path.clone();

        // Fix descendant paths
        let prefix = format!("{old_path}/");
        for n in state.nodes.values_mut() {
            if let Some(rest) = n.path.strip_prefix(&prefix) {
                n.path = format!("{new_path}/{rest}");
            }
        }
        Ok(())
    }

    fn cancel_transfer(&self, handle: TransferHandle) {
        let held = self.state.lock().unwrap().held.remove(&handle);
        if let Some(held) = held {
            held.observer.on_finish(handle, Err(Error::cancelled()));
        }
    }

    fn cancel_transfers(&self, kind: TransferKind) {
        let cancelled: Vec<(TransferHandle, HeldTransfer)> = {
            let mut state = self.state.lock().unwrap();
            let handles: Vec<TransferHandle> = state
                .held
                .iter()
                .filter(|(_, t)| t.kind == kind)
                .map(|(h, _)| *h)
                .collect();
            handles
                .into_iter()
                .filter_map(|h| state.held.remove(&h).map(|t| (h, t)))
                .collect()
        };
        for (handle, held) in cancelled {
            held.observer.on_finish(handle, Err(Error::cancelled()));
        }
    }

    async fn quota(&self) -> Result<QuotaInfo> {
        let state = self.state.lock().unwrap();
        let used = state.nodes.values().map(|n| n.size).sum();
        Ok(QuotaInfo {
            used,
            total: 20 * 1024 * 1024 * 1024,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
            })
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl TransferObserver for RecordingObserver {
        fn on_start(&self, _: TransferHandle) {
            self.events.lock().unwrap().push("start".into());
        }
        fn on_progress(&self, _: TransferHandle, bytes: u64, size: u64, _: u64) {
            self.events
                .lock()
                .unwrap()
                .push(format!("progress {bytes}/{size}"));
        }
        fn on_temporary_error(&self, _: TransferHandle, message: &str) {
            self.events.lock().unwrap().push(format!("temp {message}"));
        }
        fn on_finish(&self, _: TransferHandle, result: std::result::Result<(), Error>) {
            self.events.lock().unwrap().push(match result {
                Ok(()) => "finish ok".into(),
                Err(e) => format!("finish err {}", e.message()),
            });
        }
    }

    #[tokio::test]
    async fn test_tree_seeding_and_lookup() {
        let client = MemoryCloudClient::new();
        client.seed_file("/docs/report.pdf", 100, Utc::now());

        let node = client.node_by_path("/docs/report.pdf").await.unwrap().unwrap();
        assert_eq!(node.name, "report.pdf");
        assert_eq!(node.size, 100);

        let docs = client.node_by_path("/docs").await.unwrap().unwrap();
        assert!(docs.is_folder());
        let children = client.children(docs.handle).await.unwrap();
        assert_eq!(children.len(), 1);
    }

    #[tokio::test]
    async fn test_upload_registers_node() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("a.txt");
        std::fs::write(&local, b"hello").unwrap();

        let client = MemoryCloudClient::new();
        let root = client.root_node().await.unwrap();
        let observer = RecordingObserver::new();

        client.start_upload(&local, root.handle, "a.txt", observer.clone());

        let node = client.node_by_path("/a.txt").await.unwrap().unwrap();
        assert_eq!(node.size, 5);
        assert_eq!(observer.events().last().unwrap(), "finish ok");
    }

    #[tokio::test]
    async fn test_held_transfer_completes_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("a.txt");
        std::fs::write(&local, b"hello").unwrap();

        let client = MemoryCloudClient::new();
        client.hold_transfers(true);
        let root = client.root_node().await.unwrap();
        let observer = RecordingObserver::new();

        let handle = client.start_upload(&local, root.handle, "a.txt", observer.clone());
        assert_eq!(client.in_flight(), 1);
        assert!(client.node_by_path("/a.txt").await.unwrap().is_none());

        client.complete_transfer(handle);
        assert_eq!(client.in_flight(), 0);
        assert!(client.node_by_path("/a.txt").await.unwrap().is_some());
        assert_eq!(observer.events().last().unwrap(), "finish ok");
    }

    #[tokio::test]
    async fn test_cancel_held_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("a.txt");
        std::fs::write(&local, b"data").unwrap();

        let client = MemoryCloudClient::new();
        client.hold_transfers(true);
        let root = client.root_node().await.unwrap();
        let observer = RecordingObserver::new();

        let handle = client.start_upload(&local, root.handle, "a.txt", observer.clone());
        client.cancel_transfer(handle);

        assert_eq!(
            observer.events().last().unwrap(),
            "finish err Operation cancelled"
        );
        assert!(client.node_by_path("/a.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rename_updates_descendant_paths() {
        let client = MemoryCloudClient::new();
        client.seed_file("/docs/sub/a.txt", 1, Utc::now());
        let docs = client.node_by_path("/docs").await.unwrap().unwrap();

        client.rename(docs.handle, "papers").await.unwrap();

        assert!(client.node_by_path("/docs").await.unwrap().is_none());
        assert!(client
            .node_by_path("/papers/sub/a.txt")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_remove_subtree() {
        let client = MemoryCloudClient::new();
        client.seed_file("/docs/a.txt", 1, Utc::now());
        client.seed_file("/docs/sub/b.txt", 1, Utc::now());
        let docs = client.node_by_path("/docs").await.unwrap().unwrap();

        client.remove(docs.handle).await.unwrap();

        assert!(client.node_by_path("/docs").await.unwrap().is_none());
        assert!(client.node_by_path("/docs/sub/b.txt").await.unwrap().is_none());
        assert_eq!(client.node_count(), 1); // root only
    }

    #[tokio::test]
    async fn test_login_flow() {
        let client = MemoryCloudClient::new();
        client.register_account("user@example.com", "hunter2");
        assert!(!client.is_logged_in());

        assert!(client.login("user@example.com", "wrong").await.is_err());

        let token = client.login("user@example.com", "hunter2").await.unwrap();
        assert!(client.is_logged_in());

        client.login_with_session(&token).await.unwrap();

        let bogus = SessionToken::new(b"forged".to_vec());
        assert!(client.login_with_session(&bogus).await.is_err());
    }
}
