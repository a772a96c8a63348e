//! Transfer scheduler
//!
//! Central concurrent queue of uploads and downloads. A background admission
//! loop promotes pending tasks to active until the configured concurrency
//! bound is reached, starts them on the cloud client, and translates observer
//! callbacks into events.
//!
//! ## Lock discipline
//!
//! All task-map mutation happens under one mutex. The scheduler never holds
//! that mutex while calling into the cloud client or while publishing an
//! event; observer callbacks (which may arrive on any thread) take the mutex
//! briefly, then publish after releasing it.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use megacustom_core::config::TransferConfig;
use megacustom_core::domain::node::RemoteNode;
use megacustom_core::events::{Event, EventBus, QueueSummary};
use megacustom_core::ports::cloud_client::{
    CloudClient, TransferHandle, TransferKind, TransferObserver,
};
use megacustom_core::Error;

use crate::task::{TaskState, TransferTask};

/// Concurrency bounds for the active set
const MIN_CONCURRENT: usize = 1;
const MAX_CONCURRENT: usize = 10;

/// Publish a queue summary every N progress events
const SUMMARY_EVERY_N_PROGRESS: u64 = 10;

/// How often the stall watchdog inspects active transfers
const STALL_CHECK_INTERVAL: Duration = Duration::from_secs(30);

struct TaskEntry {
    task: TransferTask,
    /// Enqueue sequence; pending order is (priority desc, seq asc)
    seq: u64,
    handle: Option<TransferHandle>,
    last_progress: Option<Instant>,
    stall_reported: bool,
}

struct QueueState {
    tasks: HashMap<u64, TaskEntry>,
    pending: Vec<u64>,
    active: HashSet<u64>,
    paused: HashSet<u64>,
    max_concurrent: usize,
    next_id: u64,
    next_seq: u64,
    progress_events: u64,
    shutdown: bool,
}

impl QueueState {
    fn sort_pending(&mut self) {
        let tasks = &self.tasks;
        self.pending.sort_by_key(|id| {
            let entry = &tasks[id];
            (std::cmp::Reverse(entry.task.priority), entry.seq)
        });
    }

    fn summary(&self) -> QueueSummary {
        let mut summary = QueueSummary {
            active: self.active.len(),
            pending: self.pending.len(),
            ..Default::default()
        };
        for entry in self.tasks.values() {
            match entry.task.state {
                TaskState::Completed => summary.completed += 1,
                TaskState::Failed => summary.failed += 1,
                TaskState::Active => match entry.task.kind {
                    TransferKind::Upload => summary.upload_bps += entry.task.speed_bps,
                    TransferKind::Download => summary.download_bps += entry.task.speed_bps,
                },
                _ => {}
            }
        }
        summary
    }
}

struct Inner {
    client: Arc<dyn CloudClient>,
    events: EventBus,
    state: Mutex<QueueState>,
    wake: Notify,
    stall_timeout: Duration,
}

/// Admission-controlled transfer queue
pub struct TransferScheduler {
    inner: Arc<Inner>,
}

impl TransferScheduler {
    pub fn new(client: Arc<dyn CloudClient>, events: EventBus, config: &TransferConfig) -> Self {
        let max_concurrent = config.max_concurrent.clamp(MIN_CONCURRENT, MAX_CONCURRENT);
        Self {
            inner: Arc::new(Inner {
                client,
                events,
                state: Mutex::new(QueueState {
                    tasks: HashMap::new(),
                    pending: Vec::new(),
                    active: HashSet::new(),
                    paused: HashSet::new(),
                    max_concurrent,
                    next_id: 1,
                    next_seq: 1,
                    progress_events: 0,
                    shutdown: false,
                }),
                wake: Notify::new(),
                stall_timeout: Duration::from_secs(config.stall_timeout_secs),
            }),
        }
    }

    /// Spawn the admission loop on the current runtime
    pub fn spawn(&self) -> tokio::task::JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { Self::run(inner).await })
    }

    /// Stop the admission loop; queued work stays in place
    pub fn shutdown(&self) {
        self.inner.state.lock().unwrap().shutdown = true;
        self.inner.wake.notify_one();
    }

    async fn run(inner: Arc<Inner>) {
        info!("Transfer scheduler starting");
        let mut stall_timer = tokio::time::interval(STALL_CHECK_INTERVAL);
        stall_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            if inner.state.lock().unwrap().shutdown {
                break;
            }
            tokio::select! {
                _ = inner.wake.notified() => {
                    Self::drain(&inner).await;
                }
                _ = stall_timer.tick() => {
                    Self::check_stalled(&inner);
                }
            }
        }
        info!("Transfer scheduler stopped");
    }

    /// Promote pending tasks until the active set is full, starting each one
    ///
    /// Public so tests (and synchronous callers) can drive admission without
    /// the background loop.
    pub async fn pump(&self) {
        Self::drain(&self.inner).await
    }

    async fn drain(inner: &Arc<Inner>) {
        loop {
            let next = {
                let mut state = inner.state.lock().unwrap();
                if state.shutdown || state.active.len() >= state.max_concurrent {
                    None
                } else if state.pending.is_empty() {
                    None
                } else {
                    let id = state.pending.remove(0);
                    state.active.insert(id);
                    let entry = state.tasks.get_mut(&id).unwrap();
                    entry.task.mark_active();
                    entry.last_progress = Some(Instant::now());
                    entry.stall_reported = false;
                    Some(entry.task.clone())
                }
            };

            match next {
                Some(task) => Self::start_task(inner, task).await,
                None => break,
            }
        }
    }

    async fn start_task(inner: &Arc<Inner>, task: TransferTask) {
        debug!(id = task.id, name = %task.name, kind = ?task.kind, "Starting transfer");
        let observer: Arc<dyn TransferObserver> = Arc::new(TaskObserver {
            inner: Arc::downgrade(inner),
            task_id: task.id,
        });

        match task.kind {
            TransferKind::Upload => {
                let parent = inner.client.node_by_path(&task.remote_path).await;
                match parent {
                    Ok(Some(parent)) => {
                        let handle = inner.client.start_upload(
                            &task.local_path,
                            parent.handle,
                            &task.name,
                            observer,
                        );
                        Self::attach_handle(inner, task.id, handle);
                    }
                    Ok(None) => {
                        Self::finalize(inner, task.id, Err("destination not found".to_string()));
                    }
                    Err(e) => {
                        Self::finalize(inner, task.id, Err(e.to_string()));
                    }
                }
            }
            TransferKind::Download => {
                let node = inner.client.node_by_path(&task.remote_path).await;
                match node {
                    Ok(Some(node)) => {
                        let handle = inner.client.start_download(
                            node.handle,
                            &task.local_path,
                            observer,
                        );
                        Self::attach_handle(inner, task.id, handle);
                    }
                    Ok(None) => {
                        Self::finalize(inner, task.id, Err("source not found".to_string()));
                    }
                    Err(e) => {
                        Self::finalize(inner, task.id, Err(e.to_string()));
                    }
                }
            }
        }
    }

    fn attach_handle(inner: &Arc<Inner>, id: u64, handle: TransferHandle) {
        let mut state = inner.state.lock().unwrap();
        if let Some(entry) = state.tasks.get_mut(&id) {
            // The transfer may already have finished (fast adapters deliver
            // on_finish synchronously); only record the handle while active
            if entry.task.state == TaskState::Active {
                entry.handle = Some(handle);
            }
        }
    }

    /// Apply a terminal transition and publish the matching events
    fn finalize(inner: &Arc<Inner>, id: u64, result: Result<(), String>) {
        let (event, summary) = {
            let mut state = inner.state.lock().unwrap();
            let Some(entry) = state.tasks.get_mut(&id) else {
                return;
            };
            // A pause intentionally cancels the underlying handle; the task
            // stays Paused. Cancelled tasks were finalized by cancel().
            if matches!(entry.task.state, TaskState::Paused | TaskState::Cancelled) {
                entry.handle = None;
                state.active.remove(&id);
                return;
            }
            let event = match result {
                Ok(()) => {
                    entry.task.complete();
                    Event::TransferCompleted { id }
                }
                Err(message) => {
                    entry.task.fail(message.clone());
                    Event::TransferFailed { id, error: message }
                }
            };
            entry.handle = None;
            state.active.remove(&id);
            (event, state.summary())
        };
        inner.events.publish(event);
        inner.events.publish(Event::QueueStatus(summary));
        inner.wake.notify_one();
    }

    fn check_stalled(inner: &Arc<Inner>) {
        let stalled: Vec<u64> = {
            let mut state = inner.state.lock().unwrap();
            let timeout = inner.stall_timeout;
            let ids: Vec<u64> = state
                .active
                .iter()
                .copied()
                .filter(|id| {
                    let entry = &state.tasks[id];
                    !entry.stall_reported
                        && entry.task.speed_bps == 0
                        && entry
                            .last_progress
                            .map(|t| t.elapsed() >= timeout)
                            .unwrap_or(false)
                })
                .collect();
            for id in &ids {
                state.tasks.get_mut(id).unwrap().stall_reported = true;
            }
            ids
        };
        for id in stalled {
            warn!(id, "Transfer has made no progress; reporting as stalled");
            inner.events.publish(Event::TransferTemporaryError {
                id,
                message: "transfer stalled: no progress".to_string(),
            });
        }
    }

    // --- Enqueue ---

    /// Queue an upload of `local` into the remote folder `remote_dir`
    pub fn enqueue_upload(&self, local: &Path, remote_dir: &str) -> u64 {
        let size = std::fs::metadata(local).map(|m| m.len()).unwrap_or(0);
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());
        self.enqueue(TransferKind::Upload, name, local, remote_dir, size)
    }

    /// Queue a download of a remote node to `local`
    pub fn enqueue_download(&self, node: &RemoteNode, local: &Path) -> u64 {
        self.enqueue(
            TransferKind::Download,
            node.name.clone(),
            local,
            &node.path,
            node.size,
        )
    }

    fn enqueue(
        &self,
        kind: TransferKind,
        name: String,
        local: &Path,
        remote: &str,
        size: u64,
    ) -> u64 {
        let (id, event, summary) = {
            let mut state = self.inner.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;
            let seq = state.next_seq;
            state.next_seq += 1;

            let task = TransferTask::new(
                id,
                kind,
                name.clone(),
                local.to_path_buf(),
                remote.to_string(),
                size,
            );
            state.tasks.insert(
                id,
                TaskEntry {
                    task,
                    seq,
                    handle: None,
                    last_progress: None,
                    stall_reported: false,
                },
            );
            state.pending.push(id);
            state.sort_pending();
            (id, Event::TransferAdded { id, name, size }, state.summary())
        };
        self.inner.events.publish(event);
        self.inner.events.publish(Event::QueueStatus(summary));
        self.inner.wake.notify_one();
        id
    }

    // --- Inspection ---

    pub fn task(&self, id: u64) -> Option<TransferTask> {
        self.inner
            .state
            .lock()
            .unwrap()
            .tasks
            .get(&id)
            .map(|e| e.task.clone())
    }

    /// Snapshot of every known task, in id order
    pub fn tasks(&self) -> Vec<TransferTask> {
        let state = self.inner.state.lock().unwrap();
        let mut tasks: Vec<TransferTask> =
            state.tasks.values().map(|e| e.task.clone()).collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }

    pub fn summary(&self) -> QueueSummary {
        self.inner.state.lock().unwrap().summary()
    }

    /// Ids currently in the pending queue, in admission order
    pub fn pending_ids(&self) -> Vec<u64> {
        self.inner.state.lock().unwrap().pending.clone()
    }

    /// Ids currently active
    pub fn active_ids(&self) -> Vec<u64> {
        let state = self.inner.state.lock().unwrap();
        let mut ids: Vec<u64> = state.active.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    // --- Control ---

    /// Pause an active transfer (restart semantics: the cloud-side handle is
    /// cancelled and progress restarts from zero on resume)
    pub fn pause(&self, id: u64) -> bool {
        let handle = {
            let mut state = self.inner.state.lock().unwrap();
            let Some(entry) = state.tasks.get_mut(&id) else {
                return false;
            };
            if entry.task.state != TaskState::Active {
                return false;
            }
            entry.task.mark_paused();
            let handle = entry.handle.take();
            state.active.remove(&id);
            state.paused.insert(id);
            handle
        };
        if let Some(handle) = handle {
            self.inner.client.cancel_transfer(handle);
        }
        self.inner.wake.notify_one();
        true
    }

    /// Re-enqueue a paused transfer
    pub fn resume(&self, id: u64) -> bool {
        {
            let mut state = self.inner.state.lock().unwrap();
            let Some(entry) = state.tasks.get_mut(&id) else {
                return false;
            };
            if entry.task.state != TaskState::Paused {
                return false;
            }
            entry.task.reopen_from_pause();
            state.paused.remove(&id);
            state.pending.push(id);
            state.sort_pending();
        }
        self.inner.wake.notify_one();
        true
    }

    /// Cancel a non-terminal transfer
    pub fn cancel(&self, id: u64) -> bool {
        let (handle, summary) = {
            let mut state = self.inner.state.lock().unwrap();
            let Some(entry) = state.tasks.get_mut(&id) else {
                return false;
            };
            if entry.task.state.is_terminal() {
                return false;
            }
            entry.task.cancel();
            let handle = entry.handle.take();
            state.pending.retain(|p| *p != id);
            state.active.remove(&id);
            state.paused.remove(&id);
            (handle, state.summary())
        };
        if let Some(handle) = handle {
            self.inner.client.cancel_transfer(handle);
        }
        self.inner.events.publish(Event::TransferCancelled { id });
        self.inner.events.publish(Event::QueueStatus(summary));
        self.inner.wake.notify_one();
        true
    }

    /// Cancel every non-terminal transfer and clear the pending queue
    pub fn cancel_all(&self) {
        let (cancelled, handles, summary) = {
            let mut state = self.inner.state.lock().unwrap();
            let mut cancelled = Vec::new();
            let mut handles = Vec::new();
            for entry in state.tasks.values_mut() {
                if !entry.task.state.is_terminal() {
                    entry.task.cancel();
                    cancelled.push(entry.task.id);
                    if let Some(handle) = entry.handle.take() {
                        handles.push(handle);
                    }
                }
            }
            state.pending.clear();
            state.active.clear();
            state.paused.clear();
            (cancelled, handles, state.summary())
        };
        for handle in handles {
            self.inner.client.cancel_transfer(handle);
        }
        self.inner.client.cancel_transfers(TransferKind::Upload);
        self.inner.client.cancel_transfers(TransferKind::Download);
        for id in cancelled {
            self.inner.events.publish(Event::TransferCancelled { id });
        }
        self.inner.events.publish(Event::QueueStatus(summary));
    }

    /// Reopen a failed transfer; it re-enters the queue at the back of its
    /// priority band
    pub fn retry(&self, id: u64) -> bool {
        {
            let mut state = self.inner.state.lock().unwrap();
            let seq = state.next_seq;
            let Some(entry) = state.tasks.get_mut(&id) else {
                return false;
            };
            if entry.task.state != TaskState::Failed {
                return false;
            }
            entry.task.reopen_from_failure();
            entry.seq = seq;
            state.next_seq += 1;
            state.pending.push(id);
            state.sort_pending();
        }
        self.inner.wake.notify_one();
        true
    }

    /// Drop every terminal task from the map
    pub fn clear_completed(&self) {
        let summary = {
            let mut state = self.inner.state.lock().unwrap();
            state.tasks.retain(|_, e| !e.task.state.is_terminal());
            state.summary()
        };
        self.inner.events.publish(Event::QueueStatus(summary));
    }

    /// Change a pending task's priority and re-sort the queue
    pub fn set_priority(&self, id: u64, priority: i32) -> bool {
        {
            let mut state = self.inner.state.lock().unwrap();
            let Some(entry) = state.tasks.get_mut(&id) else {
                return false;
            };
            entry.task.priority = priority;
            state.sort_pending();
        }
        self.inner.wake.notify_one();
        true
    }

    /// Move a pending task one slot toward the front
    pub fn move_up(&self, id: u64) -> bool {
        self.swap_pending(id, -1)
    }

    /// Move a pending task one slot toward the back
    pub fn move_down(&self, id: u64) -> bool {
        self.swap_pending(id, 1)
    }

    fn swap_pending(&self, id: u64, direction: isize) -> bool {
        {
            let mut state = self.inner.state.lock().unwrap();
            let Some(pos) = state.pending.iter().position(|p| *p == id) else {
                return false;
            };
            let other_pos = pos as isize + direction;
            if other_pos < 0 || other_pos as usize >= state.pending.len() {
                return false;
            }
            let other = state.pending[other_pos as usize];
            // Exchange ordering keys so the swap survives later re-sorts
            let (id_prio, id_seq) = {
                let e = &state.tasks[&id];
                (e.task.priority, e.seq)
            };
            let (other_prio, other_seq) = {
                let e = &state.tasks[&other];
                (e.task.priority, e.seq)
            };
            {
                let e = state.tasks.get_mut(&id).unwrap();
                e.task.priority = other_prio;
                e.seq = other_seq;
            }
            {
                let e = state.tasks.get_mut(&other).unwrap();
                e.task.priority = id_prio;
                e.seq = id_seq;
            }
            state.sort_pending();
        }
        self.inner.wake.notify_one();
        true
    }

    /// Adjust the concurrency bound, clamped to `[1, 10]`
    pub fn set_max_concurrent(&self, max: usize) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.max_concurrent = max.clamp(MIN_CONCURRENT, MAX_CONCURRENT);
        }
        self.inner.wake.notify_one();
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.state.lock().unwrap().max_concurrent
    }
}

/// Translates cloud-client callbacks for one task into queue updates and
/// events. Holds only a weak reference so a dropped scheduler does not keep
/// the adapter's callback chain alive.
struct TaskObserver {
    inner: Weak<Inner>,
    task_id: u64,
}

impl TransferObserver for TaskObserver {
    fn on_start(&self, _handle: TransferHandle) {
        let Some(inner) = self.inner.upgrade() else { return };
        let mut state = inner.state.lock().unwrap();
        if let Some(entry) = state.tasks.get_mut(&self.task_id) {
            entry.last_progress = Some(Instant::now());
        }
    }

    fn on_progress(&self, _handle: TransferHandle, bytes: u64, size: u64, speed_bps: u64) {
        let Some(inner) = self.inner.upgrade() else { return };
        let (progress, summary) = {
            let mut state = inner.state.lock().unwrap();
            let Some(entry) = state.tasks.get_mut(&self.task_id) else {
                return;
            };
            entry.task.record_progress(bytes, size, speed_bps);
            entry.last_progress = Some(Instant::now());
            entry.stall_reported = false;
            let progress = Event::TransferProgress {
                id: self.task_id,
                bytes: entry.task.bytes,
                size: entry.task.size,
                speed_bps,
            };
            state.progress_events += 1;
            let summary = if state.progress_events % SUMMARY_EVERY_N_PROGRESS == 0 {
                Some(state.summary())
            } else {
                None
            };
            (progress, summary)
        };
        inner.events.publish(progress);
        if let Some(summary) = summary {
            inner.events.publish(Event::QueueStatus(summary));
        }
    }

    fn on_temporary_error(&self, _handle: TransferHandle, message: &str) {
        let Some(inner) = self.inner.upgrade() else { return };
        inner.events.publish(Event::TransferTemporaryError {
            id: self.task_id,
            message: message.to_string(),
        });
    }

    fn on_finish(&self, _handle: TransferHandle, result: Result<(), Error>) {
        let Some(inner) = self.inner.upgrade() else { return };
        TransferScheduler::finalize(&inner, self.task_id, result.map_err(|e| e.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use megacustom_core::ports::memory::MemoryCloudClient;

    fn write_file(dir: &tempfile::TempDir, name: &str, len: usize) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![b'x'; len]).unwrap();
        path
    }

    fn scheduler_with(
        client: Arc<MemoryCloudClient>,
        max_concurrent: usize,
    ) -> TransferScheduler {
        let config = TransferConfig {
            max_concurrent,
            stall_timeout_secs: 300,
        };
        TransferScheduler::new(client, EventBus::new(), &config)
    }

    #[tokio::test]
    async fn test_admission_respects_max_concurrent() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        client.hold_transfers(true);
        let scheduler = scheduler_with(Arc::clone(&client), 2);

        let a = scheduler.enqueue_upload(&write_file(&dir, "a.bin", 16), "/");
        let b = scheduler.enqueue_upload(&write_file(&dir, "b.bin", 16), "/");
        let c = scheduler.enqueue_upload(&write_file(&dir, "c.bin", 16), "/");
        scheduler.pump().await;

        assert_eq!(scheduler.active_ids(), vec![a, b]);
        assert_eq!(scheduler.pending_ids(), vec![c]);

        // Completing A admits C
        let handle = {
            // First started transfer belongs to A
            megacustom_core::ports::cloud_client::TransferHandle(1)
        };
        client.complete_transfer(handle);
        scheduler.pump().await;

        assert_eq!(scheduler.active_ids(), vec![b, c]);
        assert!(scheduler.pending_ids().is_empty());
        assert_eq!(scheduler.task(a).unwrap().state, TaskState::Completed);
    }

    #[tokio::test]
    async fn test_upload_completes_and_registers_node() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        let scheduler = scheduler_with(Arc::clone(&client), 3);

        let id = scheduler.enqueue_upload(&write_file(&dir, "a.txt", 5), "/");
        scheduler.pump().await;

        let task = scheduler.task(id).unwrap();
        assert_eq!(task.state, TaskState::Completed);
        assert_eq!(task.bytes, 5);
        assert!(task.ended.is_some());
        assert!(client.node_by_path("/a.txt").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_destination_fails_task() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        let scheduler = scheduler_with(Arc::clone(&client), 3);

        let id = scheduler.enqueue_upload(&write_file(&dir, "a.txt", 5), "/missing");
        scheduler.pump().await;

        let task = scheduler.task(id).unwrap();
        assert_eq!(task.state, TaskState::Failed);
        assert_eq!(task.error.as_deref(), Some("destination not found"));
    }

    #[tokio::test]
    async fn test_retry_reopens_failed_task() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        let scheduler = scheduler_with(Arc::clone(&client), 3);

        client.fail_next_transfer("flaky network");
        let id = scheduler.enqueue_upload(&write_file(&dir, "a.txt", 5), "/");
        scheduler.pump().await;
        assert_eq!(scheduler.task(id).unwrap().state, TaskState::Failed);

        assert!(scheduler.retry(id));
        let task = scheduler.task(id).unwrap();
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.retries, 1);
        assert_eq!(task.bytes, 0);

        scheduler.pump().await;
        assert_eq!(scheduler.task(id).unwrap().state, TaskState::Completed);
    }

    #[tokio::test]
    async fn test_pause_and_resume_restart_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        client.hold_transfers(true);
        let scheduler = scheduler_with(Arc::clone(&client), 1);

        let id = scheduler.enqueue_upload(&write_file(&dir, "a.txt", 5), "/");
        scheduler.pump().await;
        assert_eq!(scheduler.task(id).unwrap().state, TaskState::Active);

        assert!(scheduler.pause(id));
        assert_eq!(scheduler.task(id).unwrap().state, TaskState::Paused);
        // Cloud-side handle was cancelled
        assert_eq!(client.in_flight(), 0);

        assert!(scheduler.resume(id));
        assert_eq!(scheduler.task(id).unwrap().state, TaskState::Pending);
        assert_eq!(scheduler.task(id).unwrap().bytes, 0);

        scheduler.pump().await;
        assert_eq!(scheduler.task(id).unwrap().state, TaskState::Active);
        client.complete_all_transfers();
        assert_eq!(scheduler.task(id).unwrap().state, TaskState::Completed);
    }

    #[tokio::test]
    async fn test_cancel_active_and_pending() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        client.hold_transfers(true);
        let scheduler = scheduler_with(Arc::clone(&client), 1);

        let a = scheduler.enqueue_upload(&write_file(&dir, "a.txt", 5), "/");
        let b = scheduler.enqueue_upload(&write_file(&dir, "b.txt", 5), "/");
        scheduler.pump().await;

        assert!(scheduler.cancel(a));
        assert!(scheduler.cancel(b));
        assert_eq!(scheduler.task(a).unwrap().state, TaskState::Cancelled);
        assert_eq!(scheduler.task(b).unwrap().state, TaskState::Cancelled);
        assert!(scheduler.active_ids().is_empty());
        assert!(scheduler.pending_ids().is_empty());

        // Cancelling a terminal task is a no-op
        assert!(!scheduler.cancel(a));
    }

    #[tokio::test]
    async fn test_cancel_all_clears_queue() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        client.hold_transfers(true);
        let scheduler = scheduler_with(Arc::clone(&client), 2);

        for name in ["a", "b", "c", "d"] {
            scheduler.enqueue_upload(&write_file(&dir, name, 4), "/");
        }
        scheduler.pump().await;
        scheduler.cancel_all();

        let summary = scheduler.summary();
        assert_eq!(summary.active, 0);
        assert_eq!(summary.pending, 0);
        for task in scheduler.tasks() {
            assert_eq!(task.state, TaskState::Cancelled);
        }
    }

    #[tokio::test]
    async fn test_priority_orders_pending_queue() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        client.hold_transfers(true);
        // One slot keeps everything else pending
        let scheduler = scheduler_with(Arc::clone(&client), 1);

        let blocker = scheduler.enqueue_upload(&write_file(&dir, "blocker", 1), "/");
        let low = scheduler.enqueue_upload(&write_file(&dir, "low", 1), "/");
        let high = scheduler.enqueue_upload(&write_file(&dir, "high", 1), "/");
        scheduler.pump().await;
        assert_eq!(scheduler.active_ids(), vec![blocker]);

        scheduler.set_priority(high, 10);
        assert_eq!(scheduler.pending_ids(), vec![high, low]);

        scheduler.move_up(low);
        assert_eq!(scheduler.pending_ids(), vec![low, high]);
        scheduler.move_down(low);
        assert_eq!(scheduler.pending_ids(), vec![high, low]);
    }

    #[tokio::test]
    async fn test_clear_completed_removes_terminal_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        let scheduler = scheduler_with(Arc::clone(&client), 3);

        let done = scheduler.enqueue_upload(&write_file(&dir, "a.txt", 3), "/");
        scheduler.pump().await;
        client.hold_transfers(true);
        let live = scheduler.enqueue_upload(&write_file(&dir, "b.txt", 3), "/");
        scheduler.pump().await;

        scheduler.clear_completed();
        assert!(scheduler.task(done).is_none());
        assert!(scheduler.task(live).is_some());
    }

    #[tokio::test]
    async fn test_zero_byte_file_transfers() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        let scheduler = scheduler_with(Arc::clone(&client), 3);

        let id = scheduler.enqueue_upload(&write_file(&dir, "empty.txt", 0), "/");
        scheduler.pump().await;

        let task = scheduler.task(id).unwrap();
        assert_eq!(task.state, TaskState::Completed);
        assert_eq!(task.size, 0);
        assert_eq!(task.bytes, 0);
    }

    #[tokio::test]
    async fn test_exactly_one_queue_membership() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        client.hold_transfers(true);
        let scheduler = scheduler_with(Arc::clone(&client), 1);

        let a = scheduler.enqueue_upload(&write_file(&dir, "a.txt", 2), "/");
        let b = scheduler.enqueue_upload(&write_file(&dir, "b.txt", 2), "/");
        scheduler.pump().await;
        scheduler.pause(a);
        scheduler.pump().await;

        // a paused, b active; each id appears in exactly one place
        let pending = scheduler.pending_ids();
        let active = scheduler.active_ids();
        assert!(active.contains(&b) && !active.contains(&a));
        assert!(!pending.contains(&a) && !pending.contains(&b));
        assert_eq!(scheduler.task(a).unwrap().state, TaskState::Paused);
        assert!(scheduler.active_ids().len() <= scheduler.max_concurrent());
    }

    #[tokio::test]
    async fn test_queue_events_published() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MemoryCloudClient::new());
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let config = TransferConfig::default();
        let scheduler = TransferScheduler::new(Arc::clone(&client) as _, bus, &config);

        let id = scheduler.enqueue_upload(&write_file(&dir, "a.txt", 3), "/");
        scheduler.pump().await;

        let mut saw_added = false;
        let mut saw_completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                Event::TransferAdded { id: eid, .. } if eid == id => saw_added = true,
                Event::TransferCompleted { id: eid } if eid == id => saw_completed = true,
                _ => {}
            }
        }
        assert!(saw_added && saw_completed);
    }
}
