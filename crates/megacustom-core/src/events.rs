//! Typed event channel
//!
//! Every subsystem publishes progress and state changes as [`Event`] values
//! on a shared [`EventBus`]. Front-ends subscribe and re-marshal delivery
//! onto their own loop. Delivery is at-least-once within the process and
//! best-effort: slow subscribers may observe coalesced or dropped high-rate
//! progress events.
//!
//! Publishers must never hold a subsystem lock while calling
//! [`EventBus::publish`].

use tokio::sync::broadcast;

use crate::domain::newtypes::AccountId;

/// Default buffer size for the broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Aggregate queue counters published by the transfer scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueSummary {
    pub active: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub upload_bps: u64,
    pub download_bps: u64,
}

/// Events published by the core subsystems
#[derive(Debug, Clone)]
pub enum Event {
    // --- Accounts & sessions ---
    LoginStatusChanged { email: Option<String>, ok: bool },
    SessionRestored { email: String },
    ActiveAccountChanged { account_id: AccountId },

    // --- Transfers ---
    TransferAdded { id: u64, name: String, size: u64 },
    TransferProgress { id: u64, bytes: u64, size: u64, speed_bps: u64 },
    TransferTemporaryError { id: u64, message: String },
    TransferCompleted { id: u64 },
    TransferFailed { id: u64, error: String },
    TransferCancelled { id: u64 },
    QueueStatus(QueueSummary),

    // --- Smart sync ---
    SyncStarted { profile_id: uuid::Uuid },
    SyncProgress {
        profile_id: uuid::Uuid,
        current_file: String,
        completed: usize,
        total: usize,
        bytes_done: u64,
        bytes_total: u64,
    },
    SyncCompleted {
        profile_id: uuid::Uuid,
        ok: bool,
        uploaded: usize,
        downloaded: usize,
        errors: usize,
    },
    SyncPaused { profile_id: uuid::Uuid },
    SyncResumed { profile_id: uuid::Uuid },
    SyncCancelled { profile_id: uuid::Uuid },
    ConflictDetected { profile_id: uuid::Uuid, conflict_id: u64, rel_path: String },
    ConflictResolved { profile_id: uuid::Uuid, conflict_id: u64, resolution: String },

    // --- Folder mappings ---
    MappingAdded { name: String },
    MappingRemoved { name: String },
    MappingUpdated { name: String },
    MappingsLoaded { count: usize },
    MappingUploadProgress {
        name: String,
        current_file: String,
        uploaded_files: usize,
        total_files: usize,
        uploaded_bytes: u64,
        total_bytes: u64,
        bps: u64,
    },

    // --- Search index ---
    IndexingStarted,
    IndexingProgress { indexed: usize },
    IndexingFinished { nodes: usize, build_time_ms: u64 },
    IndexCleared,

    // --- Scheduled tasks ---
    ScheduledTaskStarted { id: u64, name: String },
    ScheduledTaskProgress { id: u64, percent: u8, status: String },
    ScheduledTaskCompleted { id: u64, name: String, ok: bool, status: String },
    ScheduledTasksChanged,
}

/// Broadcast bus for [`Event`] values
///
/// Cloning the bus is cheap; all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all current subscribers
    ///
    /// A bus with no subscribers silently drops the event; publishing is
    /// never an error for the caller.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to all events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(Event::IndexingStarted);

        match rx.recv().await.unwrap() {
            Event::IndexingStarted => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = EventBus::new();
        bus.publish(Event::IndexCleared);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_each_receive() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(Event::MappingsLoaded { count: 3 });

        assert!(matches!(
            rx1.recv().await.unwrap(),
            Event::MappingsLoaded { count: 3 }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            Event::MappingsLoaded { count: 3 }
        ));
    }
}
