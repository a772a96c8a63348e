//! Service composition
//!
//! [`App`] is the composition root: it builds every subsystem once, wires
//! them to the shared event bus, and hands commands the services they need.
//! Nothing here is process-global; a second `App` is a fully independent
//! instance.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use megacustom_core::config::Config;
use megacustom_core::events::EventBus;
use megacustom_core::ports::cloud_client::CloudClient;
use megacustom_core::ports::memory::MemoryCloudClient;
use megacustom_core::registry::AccountRegistry;
use megacustom_rename::Renamer;
use megacustom_scheduler::TaskScheduler;
use megacustom_search::SearchIndex;
use megacustom_sync::{FolderMapper, ProfileStore, SyncEngine};
use megacustom_transfer::{MultiUploader, TransferScheduler};
use megacustom_vault::CredentialStore;

/// All core services behind one handle
pub struct App {
    pub config: Config,
    pub events: EventBus,
    pub client: Arc<dyn CloudClient>,
    pub registry: Mutex<AccountRegistry>,
    pub vault: CredentialStore,
    pub transfers: Arc<TransferScheduler>,
    pub uploader: Arc<MultiUploader>,
    pub sync: Arc<SyncEngine>,
    pub mapper: Arc<FolderMapper>,
    pub index: Arc<SearchIndex>,
    pub renamer: Renamer,
    pub scheduler: Arc<TaskScheduler>,
}

impl App {
    /// Build every service against the given cloud backend
    pub fn new(client: Arc<dyn CloudClient>, config: Config) -> Result<Self> {
        let events = EventBus::new();
        let registry = Mutex::new(AccountRegistry::new(events.clone()));
        let vault = CredentialStore::open(CredentialStore::default_dir())?;

        let transfers = Arc::new(TransferScheduler::new(
            Arc::clone(&client),
            events.clone(),
            &config.transfers,
        ));
        let uploader = Arc::new(MultiUploader::new(Arc::clone(&transfers)));
        let sync = Arc::new(SyncEngine::new(
            Arc::clone(&client),
            events.clone(),
            ProfileStore::new(ProfileStore::default_path()),
            config.sync.mtime_tolerance_secs,
        ));
        let mapper = Arc::new(FolderMapper::new(
            megacustom_core::config::config_dir().join("folder_mappings.json"),
            Arc::clone(&client),
            Arc::clone(&transfers),
            events.clone(),
        ));
        let index = Arc::new(SearchIndex::new(events.clone()));
        let renamer = Renamer::new(Arc::clone(&client));
        let scheduler = Arc::new(TaskScheduler::new(
            TaskScheduler::default_path(),
            events.clone(),
        ));

        let app = Self {
            config,
            events,
            client,
            registry,
            vault,
            transfers,
            uploader,
            sync,
            mapper,
            index,
            renamer,
            scheduler,
        };
        app.register_task_runners();
        Ok(app)
    }

    /// Offline instance backed by the in-memory cloud adapter
    ///
    /// Production builds swap in the vendor SDK adapter here; everything
    /// above the `CloudClient` trait is identical in both modes.
    pub fn offline() -> Result<Self> {
        let config = Config::load_or_default(&Config::default_path());
        Self::new(Arc::new(MemoryCloudClient::new()), config)
    }

    /// Wire the task scheduler's dispatch table to the engines
    fn register_task_runners(&self) {
        use megacustom_scheduler::TaskKind;
        self.scheduler.register_runner(
            TaskKind::SmartSync,
            Arc::new(runners::SmartSyncRunner {
                sync: Arc::clone(&self.sync),
            }),
        );
        self.scheduler.register_runner(
            TaskKind::FolderMapping,
            Arc::new(runners::FolderMappingRunner {
                mapper: Arc::clone(&self.mapper),
            }),
        );
        self.scheduler.register_runner(
            TaskKind::MultiUpload,
            Arc::new(runners::MultiUploadRunner {
                uploader: Arc::clone(&self.uploader),
            }),
        );
    }

    /// Walk the remote tree into the search index
    pub async fn build_index(&self) -> Result<()> {
        self.index.clear();
        let root = self.client.root_node().await?;
        let mut frontier = vec![root.handle];
        while let Some(folder) = frontier.pop() {
            for child in self.client.children(folder).await? {
                if child.is_folder() {
                    frontier.push(child.handle);
                }
                self.index.add_node(&child);
            }
        }
        self.index.finish_building();
        Ok(())
    }
}

mod runners {
    use std::sync::Arc;

    use megacustom_core::error::{Error, Result};
    use megacustom_scheduler::TaskRunner;
    use megacustom_sync::{FolderMapper, SyncEngine, UploadOptions};
    use megacustom_transfer::MultiUploader;

    /// Runs a sync profile selected by name
    pub struct SmartSyncRunner {
        pub sync: Arc<SyncEngine>,
    }

    #[async_trait::async_trait]
    impl TaskRunner for SmartSyncRunner {
        async fn run(&self, target_name: &str) -> Result<String> {
            let profile = self
                .sync
                .profile_by_name(target_name)
                .ok_or_else(|| Error::not_found(format!("sync profile '{target_name}'")))?;
            let summary = self.sync.start_sync(profile.id).await?;
            Ok(format!(
                "{}: {} up, {} down, {} errors",
                summary.outcome.label(),
                summary.uploaded,
                summary.downloaded,
                summary.errors
            ))
        }
    }

    /// Runs an incremental folder-mapping upload selected by name
    pub struct FolderMappingRunner {
        pub mapper: Arc<FolderMapper>,
    }

    #[async_trait::async_trait]
    impl TaskRunner for FolderMappingRunner {
        async fn run(&self, target_name: &str) -> Result<String> {
            let report = self
                .mapper
                .upload(target_name, UploadOptions::default())
                .await?;
            Ok(format!(
                "Enqueued {} files, skipped {}",
                report.enqueued_files, report.skipped_files
            ))
        }
    }

    /// Starts the configured multi-destination upload batch
    pub struct MultiUploadRunner {
        pub uploader: Arc<MultiUploader>,
    }

    #[async_trait::async_trait]
    impl TaskRunner for MultiUploadRunner {
        async fn run(&self, _target_name: &str) -> Result<String> {
            let ids = self.uploader.start_upload()?;
            Ok(format!("Submitted {} uploads", ids.len()))
        }
    }
}
