//! Folder mapper
//!
//! Persistent named (local → remote) mappings with incremental upload. Each
//! account keeps its own mapping file; uploads walk the local tree, mirror
//! the folder structure remotely, and enqueue one transfer per file that
//! needs it. Incremental mode skips files whose remote counterpart carries
//! the same fingerprint (byte length plus an mtime-not-older check; stronger
//! checks are the cloud SDK's own business).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use megacustom_core::error::{Error, Result};
use megacustom_core::events::{Event, EventBus};
use megacustom_core::ports::cloud_client::CloudClient;
use megacustom_transfer::scheduler::TransferScheduler;

/// One named local → remote pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FolderMapping {
    pub name: String,
    pub local_path: PathBuf,
    pub remote_path: String,
    pub enabled: bool,
}

impl Default for FolderMapping {
    fn default() -> Self {
        Self {
            name: String::new(),
            local_path: PathBuf::new(),
            remote_path: "/".to_string(),
            enabled: true,
        }
    }
}

/// Options controlling an upload pass
#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    /// Plan only, start no transfers
    pub dry_run: bool,
    /// Skip files whose remote fingerprint matches
    pub incremental: bool,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Emit per-file progress events
    pub show_progress: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            incremental: true,
            recursive: true,
            show_progress: true,
        }
    }
}

/// One row of an upload preview
#[derive(Debug, Clone)]
pub struct UploadPreviewEntry {
    pub rel_path: String,
    pub local_size: u64,
    pub needs_upload: bool,
    pub skip_reason: Option<String>,
}

/// Result of one mapping upload pass
#[derive(Debug, Clone, Default)]
pub struct MappingUploadReport {
    pub mapping: String,
    pub total_files: usize,
    pub enqueued_files: usize,
    pub skipped_files: usize,
    pub total_bytes: u64,
    pub enqueued_bytes: u64,
    /// Scheduler task ids of the transfers started by this pass
    pub task_ids: Vec<u64>,
}

/// Named mapping store plus incremental upload driver
pub struct FolderMapper {
    path: PathBuf,
    client: Arc<dyn CloudClient>,
    scheduler: Arc<TransferScheduler>,
    events: EventBus,
    mappings: Mutex<Vec<FolderMapping>>,
}

impl FolderMapper {
    pub fn new(
        path: impl Into<PathBuf>,
        client: Arc<dyn CloudClient>,
        scheduler: Arc<TransferScheduler>,
        events: EventBus,
    ) -> Self {
        Self {
            path: path.into(),
            client,
            scheduler,
            events,
            mappings: Mutex::new(Vec::new()),
        }
    }

    /// Per-account mapping file under the application config directory
    pub fn default_path(account_id: &str) -> PathBuf {
        megacustom_core::config::config_dir()
            .join(format!("folder_mappings_{account_id}.json"))
    }

    // --- Mapping management ---

    pub fn add(&self, name: &str, local_path: &Path, remote_path: &str) -> Result<()> {
        {
            let mut mappings = self.mappings.lock().unwrap();
            if mappings.iter().any(|m| m.name == name) {
                return Err(Error::validation(format!(
                    "Mapping '{name}' already exists"
                )));
            }
            mappings.push(FolderMapping {
                name: name.to_string(),
                local_path: local_path.to_path_buf(),
                remote_path: remote_path.to_string(),
                enabled: true,
            });
        }
        self.save()?;
        self.events.publish(Event::MappingAdded {
            name: name.to_string(),
        });
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        {
            let mut mappings = self.mappings.lock().unwrap();
            let before = mappings.len();
            mappings.retain(|m| m.name != name);
            if mappings.len() == before {
                return Err(Error::not_found(format!("mapping '{name}'")));
            }
        }
        self.save()?;
        self.events.publish(Event::MappingRemoved {
            name: name.to_string(),
        });
        Ok(())
    }

    pub fn update(&self, name: &str, local_path: &Path, remote_path: &str) -> Result<()> {
        {
            let mut mappings = self.mappings.lock().unwrap();
            let mapping = mappings
                .iter_mut()
                .find(|m| m.name == name)
                .ok_or_else(|| Error::not_found(format!("mapping '{name}'")))?;
            mapping.local_path = local_path.to_path_buf();
            mapping.remote_path = remote_path.to_string();
        }
        self.save()?;
        self.events.publish(Event::MappingUpdated {
            name: name.to_string(),
        });
        Ok(())
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        {
            let mut mappings = self.mappings.lock().unwrap();
            let mapping = mappings
                .iter_mut()
                .find(|m| m.name == name)
                .ok_or_else(|| Error::not_found(format!("mapping '{name}'")))?;
            mapping.enabled = enabled;
        }
        self.save()?;
        self.events.publish(Event::MappingUpdated {
            name: name.to_string(),
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<FolderMapping> {
        self.mappings
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.name == name)
            .cloned()
    }

    pub fn all(&self) -> Vec<FolderMapping> {
        self.mappings.lock().unwrap().clone()
    }

    // --- Persistence ---

    pub fn load(&self) -> Result<usize> {
        let loaded: Vec<FolderMapping> = if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)
                .map_err(|e| Error::io("reading folder mappings", &e))?;
            match serde_json::from_str(&content) {
                Ok(mappings) => mappings,
                Err(e) => {
                    warn!(error = %e, "Folder mappings file is malformed, starting empty");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        let count = loaded.len();
        *self.mappings.lock().unwrap() = loaded;
        self.events.publish(Event::MappingsLoaded { count });
        debug!(count, "Loaded folder mappings");
        Ok(count)
    }

    pub fn save(&self) -> Result<()> {
        let mappings = self.mappings.lock().unwrap().clone();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io("creating config directory", &e))?;
        }
        let json = serde_json::to_string_pretty(&mappings)
            .map_err(|e| Error::internal(format!("serializing folder mappings: {e}")))?;
        std::fs::write(&self.path, json).map_err(|e| Error::io("writing folder mappings", &e))
    }

    // --- Upload ---

    /// Plan an upload without starting transfers
    pub async fn preview_upload(
        &self,
        name: &str,
        options: UploadOptions,
    ) -> Result<Vec<UploadPreviewEntry>> {
        let mapping = self.mapping_for_upload(name)?;
        let files = walk_mapping(&mapping.local_path, options.recursive)?;

        let mut entries = Vec::with_capacity(files.len());
        for (rel_path, size, mtime) in files {
            let skip_reason = if options.incremental {
                self.incremental_skip_reason(&mapping, &rel_path, size, mtime)
                    .await?
            } else {
                None
            };
            entries.push(UploadPreviewEntry {
                rel_path,
                local_size: size,
                needs_upload: skip_reason.is_none(),
                skip_reason,
            });
        }
        Ok(entries)
    }

    /// Walk the mapping and enqueue one transfer per file needing upload
    pub async fn upload(&self, name: &str, options: UploadOptions) -> Result<MappingUploadReport> {
        let mapping = self.mapping_for_upload(name)?;
        let files = walk_mapping(&mapping.local_path, options.recursive)?;

        let mut report = MappingUploadReport {
            mapping: name.to_string(),
            total_files: files.len(),
            total_bytes: files.iter().map(|(_, size, _)| *size).sum(),
            ..Default::default()
        };

        // Mirror the folder structure before any file moves
        if !options.dry_run {
            let mut dirs: BTreeSet<String> = BTreeSet::new();
            dirs.insert(mapping.remote_path.clone());
            for (rel_path, _, _) in &files {
                if let Some(idx) = rel_path.rfind('/') {
                    dirs.insert(join_remote(&mapping.remote_path, &rel_path[..idx]));
                }
            }
            for dir in dirs {
                self.client.create_folder(&dir).await?;
            }
        }

        for (index, (rel_path, size, mtime)) in files.iter().enumerate() {
            let skip_reason = if options.incremental {
                self.incremental_skip_reason(&mapping, rel_path, *size, *mtime)
                    .await?
            } else {
                None
            };

            if let Some(reason) = skip_reason {
                debug!(file = %rel_path, reason = %reason, "Skipping file");
                report.skipped_files += 1;
            } else if !options.dry_run {
                let remote_dir = match rel_path.rfind('/') {
                    Some(idx) => join_remote(&mapping.remote_path, &rel_path[..idx]),
                    None => mapping.remote_path.clone(),
                };
                let local = mapping.local_path.join(rel_path);
                let id = self.scheduler.enqueue_upload(&local, &remote_dir);
                report.task_ids.push(id);
                report.enqueued_files += 1;
                report.enqueued_bytes += size;
            } else {
                report.enqueued_files += 1;
                report.enqueued_bytes += size;
            }

            if options.show_progress {
                self.events.publish(Event::MappingUploadProgress {
                    name: name.to_string(),
                    current_file: rel_path.clone(),
                    uploaded_files: index + 1,
                    total_files: report.total_files,
                    uploaded_bytes: report.enqueued_bytes,
                    total_bytes: report.total_bytes,
                    bps: 0,
                });
            }
        }

        info!(
            mapping = name,
            enqueued = report.enqueued_files,
            skipped = report.skipped_files,
            "Mapping upload pass finished"
        );
        Ok(report)
    }

    /// Upload every enabled mapping
    pub async fn upload_all(&self, options: UploadOptions) -> Result<Vec<MappingUploadReport>> {
        let names: Vec<String> = self
            .all()
            .into_iter()
            .filter(|m| m.enabled)
            .map(|m| m.name)
            .collect();
        let mut reports = Vec::with_capacity(names.len());
        for name in names {
            reports.push(self.upload(&name, options).await?);
        }
        Ok(reports)
    }

    fn mapping_for_upload(&self, name: &str) -> Result<FolderMapping> {
        let mapping = self
            .get(name)
            .ok_or_else(|| Error::not_found(format!("mapping '{name}'")))?;
        if !mapping.enabled {
            return Err(Error::validation(format!("Mapping '{name}' is disabled")));
        }
        Ok(mapping)
    }

    /// Fingerprint check: same byte length and a remote mtime that is not
    /// older than the local one means the upload can be skipped
    async fn incremental_skip_reason(
        &self,
        mapping: &FolderMapping,
        rel_path: &str,
        local_size: u64,
        local_mtime: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let remote_path = join_remote(&mapping.remote_path, rel_path);
        let Some(node) = self.client.node_by_path(&remote_path).await? else {
            return Ok(None);
        };
        if node.size == local_size && node.mtime >= local_mtime {
            Ok(Some("up to date".to_string()))
        } else {
            Ok(None)
        }
    }
}

fn join_remote(root: &str, rel: &str) -> String {
    if root == "/" {
        format!("/{rel}")
    } else {
        format!("{}/{rel}", root.trim_end_matches('/'))
    }
}

fn walk_mapping(root: &Path, recursive: bool) -> Result<Vec<(String, u64, DateTime<Utc>)>> {
    if !root.is_dir() {
        return Err(Error::new(
            megacustom_core::error::codes::FS_DIRECTORY_NOT_FOUND,
            "Mapped local directory does not exist",
        )
        .with_details(root.display().to_string()));
    }
    let mut walker = WalkDir::new(root);
    if !recursive {
        walker = walker.max_depth(1);
    }
    let mut files = Vec::new();
    for entry in walker.into_iter().filter_map(|e| e.ok()) {
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
        let Ok(meta) = entry.metadata() else { continue };
        let mtime = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        files.push((rel_path, meta.len(), mtime));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use megacustom_core::config::TransferConfig;
    use megacustom_core::ports::memory::MemoryCloudClient;

    struct Fixture {
        _dir: tempfile::TempDir,
        local: PathBuf,
        client: Arc<MemoryCloudClient>,
        scheduler: Arc<TransferScheduler>,
        mapper: FolderMapper,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("photos");
        std::fs::create_dir_all(&local).unwrap();

        let client = Arc::new(MemoryCloudClient::new());
        let scheduler = Arc::new(TransferScheduler::new(
            Arc::clone(&client) as _,
            EventBus::new(),
            &TransferConfig::default(),
        ));
        let mapper = FolderMapper::new(
            dir.path().join("config/folder_mappings.json"),
            Arc::clone(&client) as _,
            Arc::clone(&scheduler),
            EventBus::new(),
        );
        Fixture {
            _dir: dir,
            local,
            client,
            scheduler,
            mapper,
        }
    }

    fn write_file(root: &Path, rel: &str, len: usize) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![b'x'; len]).unwrap();
    }

    #[test]
    fn test_mapping_crud_and_persistence() {
        let f = fixture();
        f.mapper.add("photos", &f.local, "/backup/photos").unwrap();
        assert!(f.mapper.add("photos", &f.local, "/elsewhere").is_err());

        f.mapper.set_enabled("photos", false).unwrap();
        assert!(!f.mapper.get("photos").unwrap().enabled);

        f.mapper
            .update("photos", &f.local, "/backup/photos2")
            .unwrap();
        assert_eq!(f.mapper.get("photos").unwrap().remote_path, "/backup/photos2");

        // A second mapper over the same file sees the saved state
        let mapper2 = FolderMapper::new(
            f.mapper.path.clone(),
            Arc::clone(&f.client) as _,
            Arc::clone(&f.scheduler),
            EventBus::new(),
        );
        assert_eq!(mapper2.load().unwrap(), 1);
        assert_eq!(mapper2.get("photos").unwrap().remote_path, "/backup/photos2");

        f.mapper.remove("photos").unwrap();
        assert!(f.mapper.get("photos").is_none());
        assert!(f.mapper.remove("photos").is_err());
    }

    #[tokio::test]
    async fn test_upload_mirrors_structure_and_enqueues() {
        let f = fixture();
        write_file(&f.local, "a.jpg", 10);
        write_file(&f.local, "2024/trip/b.jpg", 20);
        f.mapper.add("photos", &f.local, "/backup").unwrap();

        let report = f
            .mapper
            .upload("photos", UploadOptions::default())
            .await
            .unwrap();
        assert_eq!(report.total_files, 2);
        assert_eq!(report.enqueued_files, 2);
        assert_eq!(report.total_bytes, 30);

        f.scheduler.pump().await;
        assert!(f.client.node_by_path("/backup/a.jpg").await.unwrap().is_some());
        assert!(f
            .client
            .node_by_path("/backup/2024/trip/b.jpg")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_incremental_skips_fingerprint_matches() {
        let f = fixture();
        write_file(&f.local, "a.jpg", 10);
        write_file(&f.local, "b.jpg", 20);
        f.mapper.add("photos", &f.local, "/backup").unwrap();

        // First pass uploads both
        f.mapper
            .upload("photos", UploadOptions::default())
            .await
            .unwrap();
        f.scheduler.pump().await;

        // Second incremental pass skips both
        let report = f
            .mapper
            .upload("photos", UploadOptions::default())
            .await
            .unwrap();
        assert_eq!(report.skipped_files, 2);
        assert_eq!(report.enqueued_files, 0);

        // Touch one file: only that one re-uploads
        std::thread::sleep(std::time::Duration::from_millis(20));
        write_file(&f.local, "a.jpg", 11);
        let report = f
            .mapper
            .upload("photos", UploadOptions::default())
            .await
            .unwrap();
        assert_eq!(report.enqueued_files, 1);
        assert_eq!(report.skipped_files, 1);
    }

    #[tokio::test]
    async fn test_preview_reports_without_transferring() {
        let f = fixture();
        write_file(&f.local, "a.jpg", 10);
        f.client.seed_file("/backup/a.jpg", 10, Utc::now() + chrono::Duration::seconds(5));
        write_file(&f.local, "new.jpg", 5);
        f.mapper.add("photos", &f.local, "/backup").unwrap();

        let preview = f
            .mapper
            .preview_upload("photos", UploadOptions::default())
            .await
            .unwrap();
        assert_eq!(preview.len(), 2);

        let by_name: std::collections::HashMap<&str, &UploadPreviewEntry> = preview
            .iter()
            .map(|e| (e.rel_path.as_str(), e))
            .collect();
        assert!(!by_name["a.jpg"].needs_upload);
        assert_eq!(by_name["a.jpg"].skip_reason.as_deref(), Some("up to date"));
        assert!(by_name["new.jpg"].needs_upload);

        // Preview started nothing
        assert!(f.scheduler.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_starts_no_transfers() {
        let f = fixture();
        write_file(&f.local, "a.jpg", 10);
        f.mapper.add("photos", &f.local, "/backup").unwrap();

        let options = UploadOptions {
            dry_run: true,
            ..Default::default()
        };
        let report = f.mapper.upload("photos", options).await.unwrap();
        assert_eq!(report.enqueued_files, 1);
        assert!(report.task_ids.is_empty());
        assert!(f.scheduler.tasks().is_empty());
        // Dry run does not create remote folders either
        assert!(f.client.node_by_path("/backup").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_recursive_upload() {
        let f = fixture();
        write_file(&f.local, "top.jpg", 1);
        write_file(&f.local, "sub/nested.jpg", 1);
        f.mapper.add("photos", &f.local, "/backup").unwrap();

        let options = UploadOptions {
            recursive: false,
            ..Default::default()
        };
        let report = f.mapper.upload("photos", options).await.unwrap();
        assert_eq!(report.total_files, 1);
    }

    #[tokio::test]
    async fn test_disabled_mapping_refuses_upload() {
        let f = fixture();
        f.mapper.add("photos", &f.local, "/backup").unwrap();
        f.mapper.set_enabled("photos", false).unwrap();
        assert!(f
            .mapper
            .upload("photos", UploadOptions::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_upload_all_covers_enabled_mappings() {
        let f = fixture();
        write_file(&f.local, "a.jpg", 1);
        let other = f.local.parent().unwrap().join("docs");
        std::fs::create_dir_all(&other).unwrap();
        write_file(&other, "b.txt", 1);

        f.mapper.add("photos", &f.local, "/backup/photos").unwrap();
        f.mapper.add("docs", &other, "/backup/docs").unwrap();
        f.mapper.set_enabled("docs", false).unwrap();

        let reports = f.mapper.upload_all(UploadOptions::default()).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].mapping, "photos");
    }
}
