//! Multi-destination uploader
//!
//! Holds a set of source files, a set of candidate remote destinations, and
//! an ordered list of distribution rules. Starting an upload classifies each
//! source against the rules (first enabled match wins, insertion order) and
//! submits one transfer per source to the [`TransferScheduler`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use walkdir::WalkDir;

use megacustom_core::error::{Error, Result};
use megacustom_core::wildcard::wildcard_match;

use crate::scheduler::TransferScheduler;
use crate::task::TaskState;

/// Kind of predicate a distribution rule applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Pattern is a comma-separated extension list (leading dot optional,
    /// case-insensitive)
    ByExtension,
    /// Pattern is `"min-max"` in whole megabytes, inclusive
    BySize,
    /// Pattern is a wildcard matched against the file name, case-insensitive
    ByName,
    /// Matches unconditionally
    Default,
}

/// One routing rule; order within the rule list is significant
#[derive(Debug, Clone)]
pub struct UploadRule {
    pub id: u64,
    pub kind: RuleKind,
    pub pattern: String,
    pub destination: String,
    pub enabled: bool,
}

impl UploadRule {
    fn matches(&self, file_name: &str, size: u64) -> bool {
        match self.kind {
            RuleKind::ByExtension => {
                let extension = file_name
                    .rsplit_once('.')
                    .map(|(_, ext)| ext.to_lowercase())
                    .unwrap_or_default();
                self.pattern
                    .split(',')
                    .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                    .filter(|e| !e.is_empty())
                    .any(|e| e == extension)
            }
            RuleKind::BySize => {
                let Some((min, max)) = self.pattern.split_once('-') else {
                    return false;
                };
                let (Ok(min_mb), Ok(max_mb)) =
                    (min.trim().parse::<u64>(), max.trim().parse::<u64>())
                else {
                    return false;
                };
                let size_mb = size / (1024 * 1024);
                size_mb >= min_mb && size_mb <= max_mb
            }
            RuleKind::ByName => {
                wildcard_match(&file_name.to_lowercase(), &self.pattern.to_lowercase())
            }
            RuleKind::Default => true,
        }
    }
}

/// Aggregate progress of the most recent upload batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub bytes_done: u64,
    pub bytes_total: u64,
}

impl BatchProgress {
    pub fn is_finished(&self) -> bool {
        self.completed + self.failed == self.total
    }
}

#[derive(Default)]
struct UploaderState {
    sources: Vec<PathBuf>,
    sizes: HashMap<PathBuf, u64>,
    total_bytes: u64,
    destinations: Vec<String>,
    rules: Vec<UploadRule>,
    next_rule_id: u64,
    batch: Vec<u64>,
}

/// Rule-driven upload batcher feeding the transfer scheduler
pub struct MultiUploader {
    scheduler: Arc<TransferScheduler>,
    state: Mutex<UploaderState>,
}

impl MultiUploader {
    pub fn new(scheduler: Arc<TransferScheduler>) -> Self {
        Self {
            scheduler,
            state: Mutex::new(UploaderState {
                next_rule_id: 1,
                ..Default::default()
            }),
        }
    }

    // --- Sources ---

    /// Add files to the source set; duplicates and non-files are ignored
    pub fn add_files(&self, paths: &[PathBuf]) {
        let mut state = self.state.lock().unwrap();
        for path in paths {
            let Ok(meta) = std::fs::metadata(path) else {
                continue;
            };
            if !meta.is_file() || state.sources.contains(path) {
                continue;
            }
            state.sources.push(path.clone());
            state.sizes.insert(path.clone(), meta.len());
            state.total_bytes += meta.len();
        }
        debug!(count = state.sources.len(), "Source set updated");
    }

    /// Add every file under a folder
    pub fn add_folder(&self, folder: &Path, recursive: bool) -> Result<()> {
        if !folder.is_dir() {
            return Err(Error::file_not_found(folder.display().to_string()));
        }
        let mut walker = WalkDir::new(folder);
        if !recursive {
            walker = walker.max_depth(1);
        }
        let files: Vec<PathBuf> = walker
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        self.add_files(&files);
        Ok(())
    }

    pub fn remove_file(&self, path: &Path) {
        let mut state = self.state.lock().unwrap();
        if let Some(idx) = state.sources.iter().position(|p| p == path) {
            state.sources.remove(idx);
            if let Some(size) = state.sizes.remove(path) {
                state.total_bytes -= size;
            }
        }
    }

    pub fn clear_files(&self) {
        let mut state = self.state.lock().unwrap();
        state.sources.clear();
        state.sizes.clear();
        state.total_bytes = 0;
    }

    pub fn source_count(&self) -> usize {
        self.state.lock().unwrap().sources.len()
    }

    pub fn total_source_bytes(&self) -> u64 {
        self.state.lock().unwrap().total_bytes
    }

    // --- Destinations ---

    pub fn add_destination(&self, remote_path: &str) {
        let mut state = self.state.lock().unwrap();
        if !state.destinations.iter().any(|d| d == remote_path) {
            state.destinations.push(remote_path.to_string());
        }
    }

    /// Remove a destination and every rule pointing at it
    pub fn remove_destination(&self, remote_path: &str) {
        let mut state = self.state.lock().unwrap();
        state.destinations.retain(|d| d != remote_path);
        state.rules.retain(|r| r.destination != remote_path);
    }

    pub fn clear_destinations(&self) {
        let mut state = self.state.lock().unwrap();
        state.destinations.clear();
        state.rules.clear();
    }

    pub fn destinations(&self) -> Vec<String> {
        self.state.lock().unwrap().destinations.clone()
    }

    // --- Rules ---

    /// Append a rule; its destination must already be configured
    pub fn add_rule(&self, kind: RuleKind, pattern: &str, destination: &str) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        if !state.destinations.iter().any(|d| d == destination) {
            return Err(Error::validation(format!(
                "Destination not in list: {destination}"
            )));
        }
        let id = state.next_rule_id;
        state.next_rule_id += 1;
        state.rules.push(UploadRule {
            id,
            kind,
            pattern: pattern.to_string(),
            destination: destination.to_string(),
            enabled: true,
        });
        debug!(pattern, destination, "Added upload rule");
        Ok(id)
    }

    pub fn remove_rule(&self, rule_id: u64) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.rules.len();
        state.rules.retain(|r| r.id != rule_id);
        state.rules.len() != before
    }

    pub fn update_rule(&self, rule_id: u64, pattern: &str, destination: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        for rule in state.rules.iter_mut() {
            if rule.id == rule_id {
                rule.pattern = pattern.to_string();
                rule.destination = destination.to_string();
                return true;
            }
        }
        false
    }

    pub fn set_rule_enabled(&self, rule_id: u64, enabled: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        for rule in state.rules.iter_mut() {
            if rule.id == rule_id {
                rule.enabled = enabled;
                return true;
            }
        }
        false
    }

    pub fn clear_rules(&self) {
        self.state.lock().unwrap().rules.clear();
    }

    pub fn rules(&self) -> Vec<UploadRule> {
        self.state.lock().unwrap().rules.clone()
    }

    // --- Classification & dispatch ---

    /// Destination for a file: first enabled matching rule, else the first
    /// destination, else the cloud root
    pub fn classify(&self, path: &Path, size: u64) -> String {
        let state = self.state.lock().unwrap();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for rule in &state.rules {
            if rule.enabled && rule.matches(&file_name, size) {
                return rule.destination.clone();
            }
        }
        state
            .destinations
            .first()
            .cloned()
            .unwrap_or_else(|| "/".to_string())
    }

    /// Materialise one transfer task per source and submit them all
    ///
    /// Returns the scheduler task ids of the batch.
    pub fn start_upload(&self) -> Result<Vec<u64>> {
        let sources: Vec<(PathBuf, u64)> = {
            let state = self.state.lock().unwrap();
            if state.sources.is_empty() {
                return Err(Error::validation("No source files selected"));
            }
            if state.destinations.is_empty() {
                return Err(Error::validation("No destinations configured"));
            }
            state
                .sources
                .iter()
                .map(|p| (p.clone(), state.sizes.get(p).copied().unwrap_or(0)))
                .collect()
        };

        let mut ids = Vec::with_capacity(sources.len());
        for (path, size) in &sources {
            let destination = self.classify(path, *size);
            let id = self.scheduler.enqueue_upload(path, &destination);
            ids.push(id);
        }
        self.state.lock().unwrap().batch = ids.clone();
        info!(tasks = ids.len(), "Upload batch submitted");
        Ok(ids)
    }

    /// Scheduler task ids of the most recent batch
    pub fn batch_ids(&self) -> Vec<u64> {
        self.state.lock().unwrap().batch.clone()
    }

    /// Aggregate progress of the most recent batch, computed from scheduler
    /// snapshots
    pub fn batch_progress(&self) -> BatchProgress {
        let ids = self.batch_ids();
        let mut progress = BatchProgress {
            total: ids.len(),
            ..Default::default()
        };
        for id in ids {
            let Some(task) = self.scheduler.task(id) else {
                continue;
            };
            progress.bytes_total += task.size;
            progress.bytes_done += task.bytes;
            match task.state {
                TaskState::Completed => progress.completed += 1,
                TaskState::Failed | TaskState::Cancelled => progress.failed += 1,
                _ => {}
            }
        }
        progress
    }

    /// Re-queue every failed task of the current batch
    pub fn retry_all_failed(&self) -> usize {
        let mut retried = 0;
        for id in self.batch_ids() {
            if self.scheduler.retry(id) {
                retried += 1;
            }
        }
        retried
    }
}
