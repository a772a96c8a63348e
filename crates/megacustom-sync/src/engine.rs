//! Smart sync engine
//!
//! Owns the profile list, runs analysis, and executes action plans. One
//! engine instance manages all profiles but executes at most one sync at a
//! time. Execution is cooperative: pause and cancel latches are polled
//! between files (~100 ms granularity while paused), and per-file transfers
//! are started on the cloud client without awaiting their completion.
//!
//! Deletions run after copies so data is never dropped before its
//! counterpart exists on the other side.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use megacustom_core::domain::newtypes::RemotePath;
use megacustom_core::error::{Error, Result};
use megacustom_core::events::{Event, EventBus};
use megacustom_core::ports::cloud_client::{
    CloudClient, TransferHandle, TransferObserver,
};

use crate::analyzer::{ActionKind, AnalysisReport, SyncAnalyzer};
use crate::profile::{ConflictPolicy, ProfileStore, SyncProfile};

/// Pause-latch polling granularity
const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Maximum history entries kept per profile
const MAX_HISTORY_PER_PROFILE: usize = 100;

/// Outcome of one sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Success,
    CompletedWithErrors,
    Failed,
    Cancelled,
}

impl SyncOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Success => "Success",
            SyncOutcome::CompletedWithErrors => "Completed with errors",
            SyncOutcome::Failed => "Failed",
            SyncOutcome::Cancelled => "Cancelled",
        }
    }
}

/// One line of per-profile sync history
#[derive(Debug, Clone)]
pub struct SyncHistoryEntry {
    pub ts: DateTime<Utc>,
    pub profile_name: String,
    pub uploaded: usize,
    pub downloaded: usize,
    pub errors: usize,
    pub status: String,
}

/// Summary returned by [`SyncEngine::start_sync`]
#[derive(Debug, Clone)]
pub struct SyncRunSummary {
    pub outcome: SyncOutcome,
    pub uploaded: usize,
    pub downloaded: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub errors: usize,
}

struct EngineState {
    profiles: Vec<SyncProfile>,
    reports: HashMap<Uuid, AnalysisReport>,
    history: HashMap<Uuid, Vec<SyncHistoryEntry>>,
    syncing: Option<Uuid>,
}

/// Counts transfer failures reported by the cloud client after the engine
/// has already moved on to the next file
struct ErrorCountingObserver {
    errors: Arc<AtomicUsize>,
}

impl TransferObserver for ErrorCountingObserver {
    fn on_start(&self, _: TransferHandle) {}
    fn on_progress(&self, _: TransferHandle, _: u64, _: u64, _: u64) {}
    fn on_temporary_error(&self, _: TransferHandle, _: &str) {}
    fn on_finish(&self, _: TransferHandle, result: std::result::Result<(), Error>) {
        if result.is_err() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Profile management plus one-at-a-time sync execution
pub struct SyncEngine {
    client: Arc<dyn CloudClient>,
    events: EventBus,
    analyzer: SyncAnalyzer,
    store: ProfileStore,
    state: Mutex<EngineState>,
    paused: AtomicBool,
    cancelled: AtomicBool,
}

impl SyncEngine {
    pub fn new(
        client: Arc<dyn CloudClient>,
        events: EventBus,
        store: ProfileStore,
        mtime_tolerance_secs: i64,
    ) -> Self {
        let profiles = store.load().unwrap_or_default();
        Self {
            analyzer: SyncAnalyzer::new(Arc::clone(&client), mtime_tolerance_secs),
            client,
            events,
            store,
            state: Mutex::new(EngineState {
                profiles,
                reports: HashMap::new(),
                history: HashMap::new(),
                syncing: None,
            }),
            paused: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    // --- Profile management ---

    pub fn create_profile(
        &self,
        name: &str,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<Uuid> {
        let profile = SyncProfile::new(name, local_path, remote_path);
        let id = profile.id;
        let mut state = self.state.lock().unwrap();
        state.profiles.push(profile);
        self.store.save(&state.profiles)?;
        info!(profile = name, "Created sync profile");
        Ok(id)
    }

    pub fn update_profile(&self, profile: SyncProfile) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let slot = state
            .profiles
            .iter_mut()
            .find(|p| p.id == profile.id)
            .ok_or_else(|| Error::not_found(format!("profile {}", profile.id)))?;
        *slot = profile;
        self.store.save(&state.profiles)
    }

    pub fn delete_profile(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.profiles.len();
        state.profiles.retain(|p| p.id != id);
        if state.profiles.len() == before {
            return Err(Error::not_found(format!("profile {id}")));
        }
        state.reports.remove(&id);
        self.store.save(&state.profiles)
    }

    pub fn profile(&self, id: Uuid) -> Option<SyncProfile> {
        self.state
            .lock()
            .unwrap()
            .profiles
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// Look up a profile by its display name
    pub fn profile_by_name(&self, name: &str) -> Option<SyncProfile> {
        self.state
            .lock()
            .unwrap()
            .profiles
            .iter()
            .find(|p| p.name == name)
            .cloned()
    }

    pub fn profiles(&self) -> Vec<SyncProfile> {
        self.state.lock().unwrap().profiles.clone()
    }

    /// Export one profile as a standalone JSON file
    pub fn export_profile(&self, id: Uuid, path: &Path) -> Result<()> {
        let profile = self
            .profile(id)
            .ok_or_else(|| Error::not_found(format!("profile {id}")))?;
        let json = serde_json::to_string_pretty(&profile)
            .map_err(|e| Error::internal(format!("serializing profile: {e}")))?;
        std::fs::write(path, json).map_err(|e| Error::io("writing profile export", &e))
    }

    /// Import a profile from a standalone JSON file
    ///
    /// The imported profile gets a fresh id and an " (imported)" name suffix
    /// so it never collides with an existing one.
    pub fn import_profile(&self, path: &Path) -> Result<Uuid> {
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::io("reading profile import", &e))?;
        let mut profile: SyncProfile = serde_json::from_str(&content)
            .map_err(|e| Error::validation(format!("Invalid profile file: {e}")))?;
        profile.id = Uuid::new_v4();
        profile.name = format!("{} (imported)", profile.name);
        profile.last_sync = None;
        let id = profile.id;

        let mut state = self.state.lock().unwrap();
        state.profiles.push(profile);
        self.store.save(&state.profiles)?;
        Ok(id)
    }

    // --- Analysis & conflicts ---

    /// Run the non-mutating analysis phase and stage its plan
    pub async fn analyze(&self, profile_id: Uuid) -> Result<AnalysisReport> {
        let profile = self
            .profile(profile_id)
            .ok_or_else(|| Error::not_found(format!("profile {profile_id}")))?;
        let report = self.analyzer.analyze(&profile).await?;

        let mut state = self.state.lock().unwrap();
        state.reports.insert(profile_id, report.clone());
        drop(state);

        for conflict in &report.conflicts {
            if !conflict.resolved {
                self.events.publish(Event::ConflictDetected {
                    profile_id,
                    conflict_id: conflict.id,
                    rel_path: conflict.rel_path.clone(),
                });
            }
        }
        Ok(report)
    }

    /// Resolve one staged conflict by id
    pub fn resolve_conflict(
        &self,
        profile_id: Uuid,
        conflict_id: u64,
        policy: ConflictPolicy,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let report = state
            .reports
            .get_mut(&profile_id)
            .ok_or_else(|| Error::validation("No staged analysis for profile"))?;
        report.resolve_conflict(conflict_id, policy)?;
        drop(state);

        self.events.publish(Event::ConflictResolved {
            profile_id,
            conflict_id,
            resolution: format!("{policy:?}"),
        });
        Ok(())
    }

    /// Resolve every staged conflict with one policy
    pub fn resolve_all_conflicts(&self, profile_id: Uuid, policy: ConflictPolicy) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let report = state
            .reports
            .get_mut(&profile_id)
            .ok_or_else(|| Error::validation("No staged analysis for profile"))?;
        report.resolve_all_conflicts(policy);
        Ok(())
    }

    // --- Execution ---

    /// Execute the staged plan for a profile
    ///
    /// Analyzes first when no plan is staged. Files with unresolved `Ask`
    /// conflicts are skipped; everything else proceeds.
    pub async fn start_sync(&self, profile_id: Uuid) -> Result<SyncRunSummary> {
        let profile = self
            .profile(profile_id)
            .ok_or_else(|| Error::not_found(format!("profile {profile_id}")))?;

        // Acquire the single-sync latch
        {
            let mut state = self.state.lock().unwrap();
            if let Some(running) = state.syncing {
                return Err(Error::validation(format!(
                    "Another sync is already in progress (profile {running})"
                )));
            }
            state.syncing = Some(profile_id);
        }
        self.paused.store(false, Ordering::Release);
        self.cancelled.store(false, Ordering::Release);
        self.events.publish(Event::SyncStarted { profile_id });

        let result = self.run_sync(&profile).await;

        // Release the latch whatever happened
        self.state.lock().unwrap().syncing = None;

        match result {
            Ok(summary) => {
                self.record_run(&profile, &summary)?;
                self.events.publish(Event::SyncCompleted {
                    profile_id,
                    ok: summary.outcome == SyncOutcome::Success,
                    uploaded: summary.uploaded,
                    downloaded: summary.downloaded,
                    errors: summary.errors,
                });
                Ok(summary)
            }
            Err(e) => {
                let summary = SyncRunSummary {
                    outcome: SyncOutcome::Failed,
                    uploaded: 0,
                    downloaded: 0,
                    deleted: 0,
                    skipped: 0,
                    errors: 1,
                };
                self.record_run(&profile, &summary)?;
                self.events.publish(Event::SyncCompleted {
                    profile_id,
                    ok: false,
                    uploaded: 0,
                    downloaded: 0,
                    errors: 1,
                });
                Err(e)
            }
        }
    }

    async fn run_sync(&self, profile: &SyncProfile) -> Result<SyncRunSummary> {
        if !self.client.is_logged_in() {
            return Err(Error::not_logged_in());
        }

        let report = {
            let state = self.state.lock().unwrap();
            state.reports.get(&profile.id).cloned()
        };
        let report = match report {
            Some(report) => report,
            None => self.analyzer.analyze(profile).await?,
        };

        // Copies first, deletions second
        let (copies, rest): (Vec<_>, Vec<_>) = report
            .actions
            .iter()
            .cloned()
            .partition(|a| matches!(a.kind, ActionKind::Upload | ActionKind::Download));
        let ordered = copies.into_iter().chain(rest);

        let transfer_errors = Arc::new(AtomicUsize::new(0));
        let mut summary = SyncRunSummary {
            outcome: SyncOutcome::Success,
            uploaded: 0,
            downloaded: 0,
            deleted: 0,
            skipped: 0,
            errors: 0,
        };
        let total = report.actions.len();
        let bytes_total: u64 = report
            .actions
            .iter()
            .map(|a| match a.kind {
                ActionKind::Upload => a.local_size.unwrap_or(0),
                ActionKind::Download => a.remote_size.unwrap_or(0),
                _ => 0,
            })
            .sum();
        let mut bytes_done: u64 = 0;

        for (index, action) in ordered.enumerate() {
            if self.cancelled.load(Ordering::Acquire) {
                summary.outcome = SyncOutcome::Cancelled;
                break;
            }
            while self.paused.load(Ordering::Acquire) {
                if self.cancelled.load(Ordering::Acquire) {
                    break;
                }
                tokio::time::sleep(PAUSE_POLL).await;
            }
            if self.cancelled.load(Ordering::Acquire) {
                summary.outcome = SyncOutcome::Cancelled;
                break;
            }

            self.events.publish(Event::SyncProgress {
                profile_id: profile.id,
                current_file: action.rel_path.clone(),
                completed: index,
                total,
                bytes_done,
                bytes_total,
            });

            match action.kind {
                ActionKind::Upload => {
                    match self.start_one_upload(&action, &transfer_errors).await {
                        Ok(()) => {
                            summary.uploaded += 1;
                            bytes_done += action.local_size.unwrap_or(0);
                        }
                        Err(e) => {
                            warn!(path = %action.rel_path, error = %e, "Upload failed");
                            summary.errors += 1;
                        }
                    }
                }
                ActionKind::Download => {
                    match self.start_one_download(&action, &transfer_errors).await {
                        Ok(()) => {
                            summary.downloaded += 1;
                            bytes_done += action.remote_size.unwrap_or(0);
                        }
                        Err(e) => {
                            warn!(path = %action.rel_path, error = %e, "Download failed");
                            summary.errors += 1;
                        }
                    }
                }
                ActionKind::DeleteLocal => {
                    match tokio::fs::remove_file(&action.local_path).await {
                        Ok(()) => summary.deleted += 1,
                        Err(e) => {
                            warn!(path = %action.rel_path, error = %e, "Local delete failed");
                            summary.errors += 1;
                        }
                    }
                }
                ActionKind::DeleteRemote => {
                    match self.client.node_by_path(&action.remote_path).await? {
                        Some(node) => match self.client.remove(node.handle).await {
                            Ok(()) => summary.deleted += 1,
                            Err(e) => {
                                warn!(path = %action.rel_path, error = %e, "Remote delete failed");
                                summary.errors += 1;
                            }
                        },
                        None => summary.errors += 1,
                    }
                }
                ActionKind::Conflict => summary.skipped += 1,
                ActionKind::Skip => summary.skipped += 1,
            }
        }

        summary.errors += transfer_errors.load(Ordering::Relaxed);
        if summary.outcome == SyncOutcome::Success && summary.errors > 0 {
            summary.outcome = SyncOutcome::CompletedWithErrors;
        }

        // The staged plan is consumed by execution
        self.state.lock().unwrap().reports.remove(&profile.id);
        Ok(summary)
    }

    async fn start_one_upload(
        &self,
        action: &crate::analyzer::SyncAction,
        errors: &Arc<AtomicUsize>,
    ) -> Result<()> {
        let remote = RemotePath::new(action.remote_path.clone())?;
        let remote_dir = remote.parent().unwrap_or_else(RemotePath::root);
        let parent = match self.client.node_by_path(remote_dir.as_str()).await? {
            Some(node) => node,
            None => self.client.create_folder(remote_dir.as_str()).await?,
        };
        let name = remote.file_name().unwrap_or(&action.rel_path);
        let observer = Arc::new(ErrorCountingObserver {
            errors: Arc::clone(errors),
        });
        self.client
            .start_upload(&action.local_path, parent.handle, name, observer);
        Ok(())
    }

    async fn start_one_download(
        &self,
        action: &crate::analyzer::SyncAction,
        errors: &Arc<AtomicUsize>,
    ) -> Result<()> {
        let node = self
            .client
            .node_by_path(&action.remote_path)
            .await?
            .ok_or_else(|| Error::node_not_found(action.remote_path.clone()))?;
        if let Some(parent) = action.local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io("creating local directory", &e))?;
        }
        let observer = Arc::new(ErrorCountingObserver {
            errors: Arc::clone(errors),
        });
        self.client
            .start_download(node.handle, &action.local_path, observer);
        Ok(())
    }

    fn record_run(&self, profile: &SyncProfile, summary: &SyncRunSummary) -> Result<()> {
        let entry = SyncHistoryEntry {
            ts: Utc::now(),
            profile_name: profile.name.clone(),
            uploaded: summary.uploaded,
            downloaded: summary.downloaded,
            errors: summary.errors,
            status: summary.outcome.label().to_string(),
        };

        let mut state = self.state.lock().unwrap();
        let history = state.history.entry(profile.id).or_default();
        history.push(entry);
        if history.len() > MAX_HISTORY_PER_PROFILE {
            let excess = history.len() - MAX_HISTORY_PER_PROFILE;
            history.drain(..excess);
        }

        if let Some(slot) = state.profiles.iter_mut().find(|p| p.id == profile.id) {
            slot.last_sync = Some(Utc::now());
        }
        self.store.save(&state.profiles)
    }

    // --- Control ---

    pub fn pause_sync(&self, profile_id: Uuid) {
        if self.state.lock().unwrap().syncing == Some(profile_id) {
            self.paused.store(true, Ordering::Release);
            self.events.publish(Event::SyncPaused { profile_id });
        }
    }

    pub fn resume_sync(&self, profile_id: Uuid) {
        if self.state.lock().unwrap().syncing == Some(profile_id) {
            self.paused.store(false, Ordering::Release);
            self.events.publish(Event::SyncResumed { profile_id });
        }
    }

    pub fn cancel_sync(&self, profile_id: Uuid) {
        if self.state.lock().unwrap().syncing == Some(profile_id) {
            self.cancelled.store(true, Ordering::Release);
            self.paused.store(false, Ordering::Release);
            self.events.publish(Event::SyncCancelled { profile_id });
        }
    }

    pub fn is_syncing(&self) -> bool {
        self.state.lock().unwrap().syncing.is_some()
    }

    // --- History ---

    pub fn history(&self, profile_id: Uuid, max_entries: usize) -> Vec<SyncHistoryEntry> {
        let state = self.state.lock().unwrap();
        let Some(history) = state.history.get(&profile_id) else {
            return Vec::new();
        };
        let start = history.len().saturating_sub(max_entries);
        history[start..].to_vec()
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

    fn engine(
        dir: &tempfile::TempDir,
        client: &Arc<MemoryCloudClient>,
    ) -> SyncEngine {
        let store = ProfileStore::new(dir.path().join("config/sync_profiles.json"));
        SyncEngine::new(Arc::clone(client) as _, EventBus::new(), store, 2)
    }

    #[tokio::test]
    async fn test_push_sync_uploads_everything() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("data");
        std::fs::create_dir_all(&local).unwrap();
        write_file(&local, "a.txt", 5);
        write_file(&local, "sub/b.txt", 7);

        let client = Arc::new(MemoryCloudClient::new());
        client.seed_folder("/sync");
        let engine = engine(&dir, &client);
        let id = engine.create_profile("push", &local, "/sync").unwrap();

        let summary = engine.start_sync(id).await.unwrap();
        assert_eq!(summary.outcome, SyncOutcome::Success);
        assert_eq!(summary.uploaded, 2);
        assert!(client.node_by_path("/sync/a.txt").await.unwrap().is_some());
        assert!(client
            .node_by_path("/sync/sub/b.txt")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_sync_then_analyze_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("data");
        std::fs::create_dir_all(&local).unwrap();
        write_file(&local, "a.txt", 5);
        write_file(&local, "b.txt", 9);

        let client = Arc::new(MemoryCloudClient::new());
        client.seed_folder("/sync");
        let engine = engine(&dir, &client);
        let id = engine.create_profile("bidir", &local, "/sync").unwrap();

        engine.start_sync(id).await.unwrap();

        // Re-analysis on the synced pair yields only Skip actions
        let report = engine.analyze(id).await.unwrap();
        assert!(!report.actions.is_empty());
        assert!(report
            .actions
            .iter()
            .all(|a| a.kind == ActionKind::Skip));
    }

    #[tokio::test]
    async fn test_pull_sync_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("data");
        std::fs::create_dir_all(&local).unwrap();

        let client = Arc::new(MemoryCloudClient::new());
        client.seed_file("/sync/remote.bin", 16, Utc::now());
        let engine = engine(&dir, &client);
        let id = engine.create_profile("pull", &local, "/sync").unwrap();
        let mut profile = engine.profile(id).unwrap();
        profile.direction = SyncDirection::Pull;
        engine.update_profile(profile).unwrap();

        let summary = engine.start_sync(id).await.unwrap();
        assert_eq!(summary.downloaded, 1);
        assert!(local.join("remote.bin").exists());
    }

    #[tokio::test]
    async fn test_delete_orphans_runs_after_copies() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("data");
        std::fs::create_dir_all(&local).unwrap();
        write_file(&local, "keep.txt", 3);

        let client = Arc::new(MemoryCloudClient::new());
        client.seed_file("/sync/stale.txt", 3, Utc::now());
        let engine = engine(&dir, &client);
        let id = engine.create_profile("mirror", &local, "/sync").unwrap();
        let mut profile = engine.profile(id).unwrap();
        profile.direction = SyncDirection::Push;
        profile.delete_orphans = true;
        engine.update_profile(profile).unwrap();

        let summary = engine.start_sync(id).await.unwrap();
        assert_eq!(summary.uploaded, 1);
        assert_eq!(summary.deleted, 1);
        assert!(client.node_by_path("/sync/stale.txt").await.unwrap().is_none());
        assert!(client.node_by_path("/sync/keep.txt").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unresolved_ask_conflict_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("data");
        std::fs::create_dir_all(&local).unwrap();
        write_file(&local, "a.txt", 100);

        let client = Arc::new(MemoryCloudClient::new());
        client.seed_file("/sync/a.txt", 200, Utc::now() - chrono::Duration::hours(2));
        let engine = engine(&dir, &client);
        let id = engine.create_profile("ask", &local, "/sync").unwrap();

        let report = engine.analyze(id).await.unwrap();
        assert_eq!(report.unresolved_conflicts(), 1);

        let summary = engine.start_sync(id).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.uploaded, 0);

        // Resolving then syncing applies the choice
        let report = engine.analyze(id).await.unwrap();
        engine
            .resolve_conflict(id, report.conflicts[0].id, ConflictPolicy::Local)
            .unwrap();
        let summary = engine.start_sync(id).await.unwrap();
        assert_eq!(summary.uploaded, 1);
    }

    #[tokio::test]
    async fn test_single_sync_latch() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("data");
        std::fs::create_dir_all(&local).unwrap();

        let client = Arc::new(MemoryCloudClient::new());
        client.seed_folder("/sync");
        let engine = Arc::new(engine(&dir, &client));
        let id = engine.create_profile("latch", &local, "/sync").unwrap();

        // Fake an in-progress sync, then try to start another
        engine.state.lock().unwrap().syncing = Some(Uuid::new_v4());
        assert!(engine.start_sync(id).await.is_err());
        engine.state.lock().unwrap().syncing = None;
    }

    #[tokio::test]
    async fn test_history_recorded_and_capped_reads() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("data");
        std::fs::create_dir_all(&local).unwrap();
        write_file(&local, "a.txt", 1);

        let client = Arc::new(MemoryCloudClient::new());
        client.seed_folder("/sync");
        let engine = engine(&dir, &client);
        let id = engine.create_profile("hist", &local, "/sync").unwrap();

        engine.start_sync(id).await.unwrap();
        engine.start_sync(id).await.unwrap();

        let history = engine.history(id, 10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].profile_name, "hist");

        let only_last = engine.history(id, 1);
        assert_eq!(only_last.len(), 1);
    }

    #[tokio::test]
    async fn test_export_import_profile() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("data");
        std::fs::create_dir_all(&local).unwrap();

        let client = Arc::new(MemoryCloudClient::new());
        let engine = engine(&dir, &client);
        let id = engine.create_profile("original", &local, "/sync").unwrap();

        let export = dir.path().join("profile.json");
        engine.export_profile(id, &export).unwrap();

        let imported = engine.import_profile(&export).unwrap();
        let profile = engine.profile(imported).unwrap();
        assert_ne!(imported, id);
        assert_eq!(profile.name, "original (imported)");
        assert_eq!(engine.profiles().len(), 2);
    }

    #[tokio::test]
    async fn test_profiles_persist_across_engines() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("data");
        std::fs::create_dir_all(&local).unwrap();

        let client = Arc::new(MemoryCloudClient::new());
        let id = {
            let engine = engine(&dir, &client);
            engine.create_profile("persisted", &local, "/sync").unwrap()
        };
        let engine = engine(&dir, &client);
        assert_eq!(engine.profile(id).unwrap().name, "persisted");
    }
}
