//! Sync analysis
//!
//! The non-mutating half of the sync engine: walk both trees, line up files
//! by relative path, and emit one [`SyncAction`] per path. Analysis is
//! deterministic for a given local/remote state - paths are visited in
//! sorted order, so two consecutive analyses produce the same plan.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

use megacustom_core::error::{Error, Result};
use megacustom_core::ports::cloud_client::CloudClient;

use crate::profile::{ConflictPolicy, SyncProfile};

/// What the executor should do for one relative path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Upload,
    Download,
    DeleteLocal,
    DeleteRemote,
    /// Unresolved two-sided difference awaiting an explicit policy
    Conflict,
    Skip,
}

/// One planned operation
#[derive(Debug, Clone)]
pub struct SyncAction {
    pub id: u64,
    pub rel_path: String,
    pub local_path: PathBuf,
    pub remote_path: String,
    pub kind: ActionKind,
    pub local_size: Option<u64>,
    pub remote_size: Option<u64>,
    pub local_mtime: Option<DateTime<Utc>>,
    pub remote_mtime: Option<DateTime<Utc>>,
}

/// A detected conflict awaiting resolution
#[derive(Debug, Clone)]
pub struct SyncConflict {
    pub id: u64,
    pub rel_path: String,
    pub local_size: u64,
    pub remote_size: u64,
    pub local_mtime: DateTime<Utc>,
    pub remote_mtime: DateTime<Utc>,
    pub reason: String,
    pub resolved: bool,
    pub resolution: Option<ConflictPolicy>,
}

/// Result of one analysis pass
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub profile_id: Uuid,
    pub actions: Vec<SyncAction>,
    pub conflicts: Vec<SyncConflict>,
}

impl AnalysisReport {
    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind == kind).count()
    }

    pub fn unresolved_conflicts(&self) -> usize {
        self.conflicts.iter().filter(|c| !c.resolved).count()
    }

    /// Resolve one conflict, rewriting its pending action
    pub fn resolve_conflict(&mut self, conflict_id: u64, policy: ConflictPolicy) -> Result<()> {
        let conflict = self
            .conflicts
            .iter_mut()
            .find(|c| c.id == conflict_id)
            .ok_or_else(|| Error::not_found(format!("conflict {conflict_id}")))?;
        conflict.resolved = true;
        conflict.resolution = Some(policy);

        let (local_size, remote_size) = (conflict.local_size, conflict.remote_size);
        let (local_mtime, remote_mtime) = (conflict.local_mtime, conflict.remote_mtime);
        let rel_path = conflict.rel_path.clone();

        match policy {
            ConflictPolicy::KeepBoth => {
                // Upload under a fresh name; the remote file stays and gets
                // an explicit Skip entry
                let taken: Vec<String> =
                    self.actions.iter().map(|a| a.rel_path.clone()).collect();
                let renamed = unique_rel_path(&rel_path, |candidate| {
                    taken.iter().any(|t| t == candidate)
                });
                let skip_id = self.actions.iter().map(|a| a.id).max().unwrap_or(0) + 1;
                if let Some(idx) = self.actions.iter().position(|a| a.id == conflict_id) {
                    let skipped = SyncAction {
                        id: skip_id,
                        kind: ActionKind::Skip,
                        local_size: None,
                        local_mtime: None,
                        ..self.actions[idx].clone()
                    };
                    let action = &mut self.actions[idx];
                    action.kind = ActionKind::Upload;
                    action.remote_path = rewrite_leaf(&action.remote_path, &renamed);
                    action.rel_path = renamed;
                    self.actions.push(skipped);
                }
            }
            _ => {
                let kind = decide_two_sided(
                    policy,
                    local_size,
                    remote_size,
                    local_mtime,
                    remote_mtime,
                );
                if let Some(action) = self.actions.iter_mut().find(|a| a.id == conflict_id) {
                    action.kind = kind;
                }
            }
        }
        Ok(())
    }

    /// Resolve every outstanding conflict with one policy
    pub fn resolve_all_conflicts(&mut self, policy: ConflictPolicy) {
        let ids: Vec<u64> = self
            .conflicts
            .iter()
            .filter(|c| !c.resolved)
            .map(|c| c.id)
            .collect();
        for id in ids {
            let _ = self.resolve_conflict(id, policy);
        }
    }
}

/// Which side wins a two-sided difference under a concrete policy
fn decide_two_sided(
    policy: ConflictPolicy,
    local_size: u64,
    remote_size: u64,
    local_mtime: DateTime<Utc>,
    remote_mtime: DateTime<Utc>,
) -> ActionKind {
    match policy {
        ConflictPolicy::Newer => {
            if local_mtime > remote_mtime {
                ActionKind::Upload
            } else {
                ActionKind::Download
            }
        }
        ConflictPolicy::Larger => {
            if local_size > remote_size {
                ActionKind::Upload
            } else {
                ActionKind::Download
            }
        }
        ConflictPolicy::Local => ActionKind::Upload,
        ConflictPolicy::Remote => ActionKind::Download,
        // Ask stays a conflict; KeepBoth is handled by the caller
        _ => ActionKind::Conflict,
    }
}

/// Insert a `_N` suffix before the extension, picking the first free N
fn unique_rel_path(rel_path: &str, exists: impl Fn(&str) -> bool) -> String {
    let (stem, ext) = match rel_path.rfind('.') {
        Some(idx) if idx > rel_path.rfind('/').map(|s| s + 1).unwrap_or(0) => {
            (&rel_path[..idx], &rel_path[idx..])
        }
        _ => (rel_path, ""),
    };
    for n in 1..1000 {
        let candidate = format!("{stem}_{n}{ext}");
        if !exists(&candidate) {
            return candidate;
        }
    }
    format!("{stem}_{}{ext}", Utc::now().timestamp_millis())
}

/// Replace the final component of a remote path with the leaf of `rel_path`
fn rewrite_leaf(remote_path: &str, rel_path: &str) -> String {
    let leaf = rel_path.rsplit('/').next().unwrap_or(rel_path);
    match remote_path.rfind('/') {
        Some(idx) => format!("{}/{leaf}", &remote_path[..idx]),
        None => leaf.to_string(),
    }
}

/// Include/exclude filtering for local and remote walks
struct FileFilter {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
    sync_hidden: bool,
    sync_temp: bool,
}

impl FileFilter {
    fn for_profile(profile: &SyncProfile) -> Self {
        let compile = |patterns: &[String]| {
            patterns
                .iter()
                .filter_map(|p| glob::Pattern::new(p).ok())
                .collect()
        };
        Self {
            include: compile(&profile.include_globs),
            exclude: compile(&profile.exclude_globs),
            sync_hidden: profile.sync_hidden,
            sync_temp: profile.sync_temp,
        }
    }

    fn allows(&self, rel_path: &str) -> bool {
        let name = rel_path.rsplit('/').next().unwrap_or(rel_path);

        if !self.sync_hidden && rel_path.split('/').any(|c| c.starts_with('.')) {
            return false;
        }
        if !self.sync_temp && is_temp_name(name) {
            return false;
        }
        if self.exclude.iter().any(|p| p.matches(rel_path) || p.matches(name)) {
            return false;
        }
        if !self.include.is_empty()
            && !self.include.iter().any(|p| p.matches(rel_path) || p.matches(name))
        {
            return false;
        }
        true
    }
}

fn is_temp_name(name: &str) -> bool {
    name.ends_with('~')
        || name.ends_with(".tmp")
        || name.ends_with(".swp")
        || name.starts_with("~$")
}

#[derive(Debug, Clone, Copy)]
struct RemoteEntry {
    size: u64,
    mtime: DateTime<Utc>,
}

/// Non-mutating tree differ
pub struct SyncAnalyzer {
    client: Arc<dyn CloudClient>,
    mtime_tolerance: Duration,
}

impl SyncAnalyzer {
    pub fn new(client: Arc<dyn CloudClient>, mtime_tolerance_secs: i64) -> Self {
        Self {
            client,
            mtime_tolerance: Duration::seconds(mtime_tolerance_secs),
        }
    }

    /// Diff the profile's local and remote trees into an action plan
    pub async fn analyze(&self, profile: &SyncProfile) -> Result<AnalysisReport> {
        let filter = FileFilter::for_profile(profile);

        let local = scan_local(&profile.local_path, &filter)?;
        let remote = self.scan_remote(&profile.remote_path, &filter).await?;

        debug!(
            profile = %profile.name,
            local = local.len(),
            remote = remote.len(),
            "Analyzing sync pair"
        );

        let mut report = AnalysisReport {
            profile_id: profile.id,
            ..Default::default()
        };
        let mut next_id: u64 = 1;

        // Union of both sides, sorted for determinism
        let mut all_paths: Vec<&String> = local.keys().chain(remote.keys()).collect();
        all_paths.sort();
        all_paths.dedup();

        for rel_path in all_paths {
            let id = next_id;
            next_id += 1;

            let local_entry = local.get(rel_path);
            let remote_entry = remote.get(rel_path);

            let mut action = SyncAction {
                id,
                rel_path: rel_path.clone(),
                local_path: profile.local_path.join(rel_path),
                remote_path: join_remote(&profile.remote_path, rel_path),
                kind: ActionKind::Skip,
                local_size: local_entry.map(|(size, _)| *size),
                remote_size: remote_entry.map(|e| e.size),
                local_mtime: local_entry.map(|(_, mtime)| *mtime),
                remote_mtime: remote_entry.map(|e| e.mtime),
            };

            match (local_entry, remote_entry) {
                (Some(_), None) => {
                    action.kind = if profile.direction.allows_push() {
                        ActionKind::Upload
                    } else if profile.delete_orphans {
                        ActionKind::DeleteLocal
                    } else {
                        ActionKind::Skip
                    };
                }
                (None, Some(_)) => {
                    action.kind = if profile.direction.allows_pull() {
                        ActionKind::Download
                    } else if profile.delete_orphans {
                        ActionKind::DeleteRemote
                    } else {
                        ActionKind::Skip
                    };
                }
                (Some((local_size, local_mtime)), Some(remote_entry)) => {
                    let same_size = *local_size == remote_entry.size;
                    let mtime_delta = (*local_mtime - remote_entry.mtime).abs();
                    if same_size && mtime_delta <= self.mtime_tolerance {
                        action.kind = ActionKind::Skip;
                    } else {
                        action.kind = ActionKind::Conflict;
                        report.conflicts.push(SyncConflict {
                            id,
                            rel_path: rel_path.clone(),
                            local_size: *local_size,
                            remote_size: remote_entry.size,
                            local_mtime: *local_mtime,
                            remote_mtime: remote_entry.mtime,
                            reason: if same_size {
                                "modification times differ".to_string()
                            } else {
                                "sizes differ".to_string()
                            },
                            resolved: false,
                            resolution: None,
                        });
                    }
                }
                (None, None) => unreachable!("path came from one of the maps"),
            }

            report.actions.push(action);
        }

        // A concrete profile policy settles conflicts immediately; only Ask
        // leaves them for the user
        if profile.conflict_policy != ConflictPolicy::Ask {
            report.resolve_all_conflicts(profile.conflict_policy);
        }

        Ok(report)
    }

    async fn scan_remote(
        &self,
        remote_root: &str,
        filter: &FileFilter,
    ) -> Result<BTreeMap<String, RemoteEntry>> {
        let mut entries = BTreeMap::new();
        let Some(root) = self.client.node_by_path(remote_root).await? else {
            // Missing remote subtree: everything local is new
            return Ok(entries);
        };

        let mut frontier = vec![(root.handle, String::new())];
        while let Some((folder, prefix)) = frontier.pop() {
            for child in self.client.children(folder).await? {
                let rel_path = if prefix.is_empty() {
                    child.name.clone()
                } else {
                    format!("{prefix}/{}", child.name)
                };
                if child.is_folder() {
                    frontier.push((child.handle, rel_path));
                } else if filter.allows(&rel_path) {
                    entries.insert(
                        rel_path,
                        RemoteEntry {
                            size: child.size,
                            mtime: child.mtime,
                        },
                    );
                }
            }
        }
        Ok(entries)
    }
}

fn scan_local(
    root: &Path,
    filter: &FileFilter,
) -> Result<BTreeMap<String, (u64, DateTime<Utc>)>> {
    let mut entries = BTreeMap::new();
    if !root.is_dir() {
        return Err(Error::new(
            megacustom_core::error::codes::FS_DIRECTORY_NOT_FOUND,
            "Local sync directory does not exist",
        )
        .with_details(root.display().to_string()));
    }

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if !filter.allows(&rel_path) {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let mtime = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        entries.insert(rel_path, (meta.len(), mtime));
    }
    Ok(entries)
}

fn join_remote(root: &str, rel_path: &str) -> String {
    if root == "/" {
        format!("/{rel_path}")
    } else {
        format!("{}/{rel_path}", root.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SyncDirection;
    use megacustom_core::ports::memory::MemoryCloudClient;

    fn write_file(root: &Path, rel: &str, len: usize) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![b'x'; len]).unwrap();
    }

    fn analyzer(client: &Arc<MemoryCloudClient>) -> SyncAnalyzer {
        SyncAnalyzer::new(Arc::clone(client) as _, 2)
    }

    fn profile(dir: &tempfile::TempDir) -> SyncProfile {
        SyncProfile::new("test", dir.path(), "/sync")
    }

    #[tokio::test]
    async fn test_only_local_becomes_upload() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.txt", 10);
        let client = Arc::new(MemoryCloudClient::new());
        client.seed_folder("/sync");

        let report = analyzer(&client).analyze(&profile(&dir)).await.unwrap();
        assert_eq!(report.count(ActionKind::Upload), 1);
        assert_eq!(report.actions[0].remote_path, "/sync/a.txt");
    }

    #[tokio::test]
    async fn test_only_remote_becomes_download() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        client.seed_file("/sync/b.txt", 20, Utc::now());

        let report = analyzer(&client).analyze(&profile(&dir)).await.unwrap();
        assert_eq!(report.count(ActionKind::Download), 1);
        assert_eq!(report.actions[0].local_path, dir.path().join("b.txt"));
    }

    #[tokio::test]
    async fn test_direction_blocks_copy_and_orphans_delete() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "local_only.txt", 5);
        let client = Arc::new(MemoryCloudClient::new());
        client.seed_file("/sync/remote_only.txt", 5, Utc::now());

        // Pull-only without orphan deletion: local file is skipped
        let mut p = profile(&dir);
        p.direction = SyncDirection::Pull;
        let report = analyzer(&client).analyze(&p).await.unwrap();
        assert_eq!(report.count(ActionKind::Download), 1);
        assert_eq!(report.count(ActionKind::Skip), 1);

        // Pull-only mirror: the local orphan is deleted
        p.delete_orphans = true;
        let report = analyzer(&client).analyze(&p).await.unwrap();
        assert_eq!(report.count(ActionKind::DeleteLocal), 1);

        // Push-only mirror: the remote orphan is deleted
        p.direction = SyncDirection::Push;
        let report = analyzer(&client).analyze(&p).await.unwrap();
        assert_eq!(report.count(ActionKind::Upload), 1);
        assert_eq!(report.count(ActionKind::DeleteRemote), 1);
    }

    #[tokio::test]
    async fn test_equal_files_skip() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "same.txt", 100);
        let mtime = std::fs::metadata(dir.path().join("same.txt"))
            .unwrap()
            .modified()
            .unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        client.seed_file("/sync/same.txt", 100, DateTime::<Utc>::from(mtime));

        let report = analyzer(&client).analyze(&profile(&dir)).await.unwrap();
        assert_eq!(report.count(ActionKind::Skip), 1);
        assert!(report.conflicts.is_empty());
    }

    #[tokio::test]
    async fn test_conflict_policies() {
        let dir = tempfile::tempdir().unwrap();
        // Local: newer but smaller (100 bytes, mtime now)
        write_file(dir.path(), "a.txt", 100);
        let client = Arc::new(MemoryCloudClient::new());
        // Remote: older but larger (200 bytes, one hour ago)
        client.seed_file("/sync/a.txt", 200, Utc::now() - Duration::hours(1));

        let mut p = profile(&dir);

        p.conflict_policy = ConflictPolicy::Newer;
        let report = analyzer(&client).analyze(&p).await.unwrap();
        assert_eq!(report.count(ActionKind::Upload), 1);

        p.conflict_policy = ConflictPolicy::Larger;
        let report = analyzer(&client).analyze(&p).await.unwrap();
        assert_eq!(report.count(ActionKind::Download), 1);

        p.conflict_policy = ConflictPolicy::Local;
        let report = analyzer(&client).analyze(&p).await.unwrap();
        assert_eq!(report.count(ActionKind::Upload), 1);

        p.conflict_policy = ConflictPolicy::Remote;
        let report = analyzer(&client).analyze(&p).await.unwrap();
        assert_eq!(report.count(ActionKind::Download), 1);
    }

    #[tokio::test]
    async fn test_keep_both_uploads_under_new_name() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.txt", 100);
        let client = Arc::new(MemoryCloudClient::new());
        client.seed_file("/sync/a.txt", 200, Utc::now() - Duration::hours(1));

        let mut p = profile(&dir);
        p.conflict_policy = ConflictPolicy::KeepBoth;
        let report = analyzer(&client).analyze(&p).await.unwrap();

        let uploads: Vec<&SyncAction> = report
            .actions
            .iter()
            .filter(|a| a.kind == ActionKind::Upload)
            .collect();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].rel_path, "a_1.txt");
        assert_eq!(uploads[0].remote_path, "/sync/a_1.txt");

        // The existing remote file stays, recorded as an explicit Skip
        let skips: Vec<&SyncAction> = report
            .actions
            .iter()
            .filter(|a| a.kind == ActionKind::Skip)
            .collect();
        assert_eq!(skips.len(), 1);
        assert_eq!(skips[0].rel_path, "a.txt");
    }

    #[tokio::test]
    async fn test_ask_leaves_conflict_pending() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.txt", 100);
        let client = Arc::new(MemoryCloudClient::new());
        client.seed_file("/sync/a.txt", 200, Utc::now() - Duration::hours(1));

        let mut report = analyzer(&client).analyze(&profile(&dir)).await.unwrap();
        assert_eq!(report.count(ActionKind::Conflict), 1);
        assert_eq!(report.unresolved_conflicts(), 1);

        let id = report.conflicts[0].id;
        report.resolve_conflict(id, ConflictPolicy::Local).unwrap();
        assert_eq!(report.unresolved_conflicts(), 0);
        assert_eq!(report.count(ActionKind::Upload), 1);
    }

    #[tokio::test]
    async fn test_hidden_and_temp_filtering() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "keep.txt", 1);
        write_file(dir.path(), ".hidden/secret.txt", 1);
        write_file(dir.path(), "draft.tmp", 1);
        let client = Arc::new(MemoryCloudClient::new());
        client.seed_folder("/sync");

        let report = analyzer(&client).analyze(&profile(&dir)).await.unwrap();
        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.actions[0].rel_path, "keep.txt");

        let mut p = profile(&dir);
        p.sync_hidden = true;
        p.sync_temp = true;
        let report = analyzer(&client).analyze(&p).await.unwrap();
        assert_eq!(report.actions.len(), 3);
    }

    #[tokio::test]
    async fn test_include_exclude_globs() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.rs", 1);
        write_file(dir.path(), "b.txt", 1);
        write_file(dir.path(), "c.log", 1);
        let client = Arc::new(MemoryCloudClient::new());
        client.seed_folder("/sync");

        let mut p = profile(&dir);
        p.include_globs = vec!["*.rs".to_string(), "*.txt".to_string()];
        p.exclude_globs = vec!["b.*".to_string()];
        let report = analyzer(&client).analyze(&p).await.unwrap();

        assert_eq!(report.actions.len(), 1);
        assert_eq!(report.actions[0].rel_path, "a.rs");
    }

    #[tokio::test]
    async fn test_analysis_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["z.txt", "a.txt", "m/n.txt"] {
            write_file(dir.path(), name, 3);
        }
        let client = Arc::new(MemoryCloudClient::new());
        client.seed_file("/sync/other.bin", 9, Utc::now());

        let p = profile(&dir);
        let a = analyzer(&client).analyze(&p).await.unwrap();
        let b = analyzer(&client).analyze(&p).await.unwrap();

        let shape = |r: &AnalysisReport| {
            r.actions
                .iter()
                .map(|a| (a.rel_path.clone(), a.kind))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&a), shape(&b));
    }

    #[tokio::test]
    async fn test_missing_local_directory_errors() {
        let client = Arc::new(MemoryCloudClient::new());
        let p = SyncProfile::new("bad", "/nonexistent/path/here", "/sync");
        assert!(analyzer(&client).analyze(&p).await.is_err());
    }

    #[test]
    fn test_unique_rel_path_suffixes() {
        assert_eq!(unique_rel_path("a.txt", |_| false), "a_1.txt");
        assert_eq!(
            unique_rel_path("a.txt", |c| c == "a_1.txt"),
            "a_2.txt"
        );
        assert_eq!(unique_rel_path("dir/file", |_| false), "dir/file_1");
        assert_eq!(unique_rel_path("dir.v2/file", |_| false), "dir.v2/file_1");
    }
}
