//! Bulk rename planner
//!
//! Previews apply a [`RenamePattern`] to node snapshots without mutating
//! anything; apply performs the renames through the cloud client and pushes
//! an operation onto the undo stack. Undo walks the operation in reverse,
//! locating each node by its stored parent path and current name.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use megacustom_core::domain::node::RemoteNode;
use megacustom_core::error::{Error, Result};
use megacustom_core::ports::cloud_client::CloudClient;
use megacustom_core::wildcard::wildcard_match;

use crate::pattern::{generate_unique_name, RenamePattern};

/// Maximum operations kept on the undo stack
const MAX_HISTORY: usize = 50;

/// Version tag written into exported rule files
const RULES_FORMAT_VERSION: &str = "1.0";

/// One row of a rename preview
#[derive(Debug, Clone)]
pub struct RenamePreview {
    pub handle: megacustom_core::domain::newtypes::NodeHandle,
    pub original_name: String,
    pub proposed_name: String,
    /// Path of the containing folder
    pub parent_path: String,
    /// Why this entry cannot apply cleanly, if anything
    pub conflict: Option<String>,
    pub mtime: DateTime<Utc>,
}

/// Outcome of one applied rename
#[derive(Debug, Clone)]
pub struct RenameResult {
    pub original_name: String,
    pub new_name: String,
    pub parent_path: String,
    pub success: bool,
    pub skipped: bool,
    pub error: Option<String>,
}

/// One apply, as recorded on the undo stack
#[derive(Debug, Clone)]
pub struct RenameOperation {
    pub op_id: String,
    pub ts: DateTime<Utc>,
    pub pattern: RenamePattern,
    pub results: Vec<RenameResult>,
}

/// Callback deciding the final name when a proposed name conflicts
pub type ConflictResolver = Box<dyn Fn(&str, &str) -> String + Send + Sync>;

#[derive(Default)]
struct RenamerState {
    undo_stack: Vec<RenameOperation>,
    redo_stack: Vec<RenameOperation>,
    custom_rules: BTreeMap<String, RenamePattern>,
    next_op: u64,
}

/// Bulk renamer over the remote namespace
pub struct Renamer {
    client: Arc<dyn CloudClient>,
    state: Mutex<RenamerState>,
    conflict_resolver: Mutex<Option<ConflictResolver>>,
    templates: BTreeMap<String, (RenamePattern, &'static str)>,
}

impl Renamer {
    pub fn new(client: Arc<dyn CloudClient>) -> Self {
        Self {
            client,
            state: Mutex::new(RenamerState::default()),
            conflict_resolver: Mutex::new(None),
            templates: builtin_templates(),
        }
    }

    /// Install a resolver consulted for conflicting proposed names; without
    /// one, conflicting entries are skipped
    pub fn set_conflict_resolver(&self, resolver: Option<ConflictResolver>) {
        *self.conflict_resolver.lock().unwrap() = resolver;
    }

    // --- Preview ---

    /// Apply the pattern to each file node without mutating anything
    ///
    /// Conflicts flagged: duplicate proposed name within the batch, and an
    /// existing sibling with the proposed name in the node's parent folder.
    pub async fn preview(
        &self,
        nodes: &[RemoteNode],
        pattern: &RenamePattern,
    ) -> Result<Vec<RenamePreview>> {
        let mut previews = Vec::with_capacity(nodes.len());
        let mut proposed_names: Vec<String> = Vec::with_capacity(nodes.len());
        let mut sibling_cache: HashMap<String, Vec<String>> = HashMap::new();
        let mut sequence = pattern.number_start;

        for node in nodes {
            if node.is_folder() {
                continue;
            }

            let mut proposed = pattern.apply(&node.name);
            if pattern.sequential_numbering {
                proposed = pattern.apply_numbering(&proposed, sequence);
                sequence += 1;
            }
            if pattern.insert_datetime {
                proposed = pattern.apply_datetime(&proposed, Some(node.mtime));
            }

            let parent_path = parent_of(&node.path);

            let mut conflict = None;
            if proposed_names.iter().any(|n| *n == proposed) {
                conflict = Some("Duplicate name in batch".to_string());
            } else if proposed != node.name {
                if !sibling_cache.contains_key(&parent_path) {
                    let names = self.sibling_names(node).await?;
                    sibling_cache.insert(parent_path.clone(), names);
                }
                let siblings = &sibling_cache[&parent_path];
                if siblings.iter().any(|s| *s == proposed) {
                    conflict = Some("File already exists in folder".to_string());
                }
            }

            proposed_names.push(proposed.clone());
            previews.push(RenamePreview {
                handle: node.handle,
                original_name: node.name.clone(),
                proposed_name: proposed,
                parent_path,
                conflict,
                mtime: node.mtime,
            });
        }

        Ok(previews)
    }

    /// Preview files selected by a path glob, e.g. `/photos/*.jpg`
    pub async fn preview_by_path(
        &self,
        path_pattern: &str,
        pattern: &RenamePattern,
        recursive: bool,
    ) -> Result<Vec<RenamePreview>> {
        let (dir_path, name_glob) = match path_pattern.rfind('/') {
            Some(0) => ("/".to_string(), &path_pattern[1..]),
            Some(idx) => (path_pattern[..idx].to_string(), &path_pattern[idx + 1..]),
            None => ("/".to_string(), path_pattern),
        };
        let name_glob = name_glob.to_lowercase();

        let Some(dir) = self.client.node_by_path(&dir_path).await? else {
            return Ok(Vec::new());
        };

        let mut matched = Vec::new();
        let mut frontier = vec![dir.handle];
        while let Some(folder) = frontier.pop() {
            for child in self.client.children(folder).await? {
                if child.is_folder() {
                    if recursive {
                        frontier.push(child.handle);
                    }
                } else if wildcard_match(&child.name.to_lowercase(), &name_glob) {
                    matched.push(child);
                }
            }
        }
        matched.sort_by(|a, b| a.path.cmp(&b.path));

        self.preview(&matched, pattern).await
    }

    // --- Apply ---

    /// Perform the previewed renames
    ///
    /// Conflicting entries go through the installed resolver or are skipped.
    /// A non-dry-run apply with at least one result lands on the undo stack
    /// and clears the redo stack.
    pub async fn apply(
        &self,
        previews: &[RenamePreview],
        pattern: &RenamePattern,
        dry_run: bool,
    ) -> Result<Vec<RenameResult>> {
        let mut results = Vec::with_capacity(previews.len());

        for preview in previews {
            let mut final_name = preview.proposed_name.clone();
            let mut skipped = false;
            let mut error = None;

            if let Some(reason) = &preview.conflict {
                let resolved = {
                    let resolver = self.conflict_resolver.lock().unwrap();
                    resolver
                        .as_ref()
                        .map(|r| r(&preview.original_name, &preview.proposed_name))
                };
                match resolved {
                    Some(name) => final_name = name,
                    None => {
                        skipped = true;
                        error = Some(reason.clone());
                    }
                }
            }

            let success = if skipped || dry_run {
                !skipped
            } else {
                match self.client.rename(preview.handle, &final_name).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(
                            name = %preview.original_name,
                            error = %e,
                            "Rename failed"
                        );
                        error = Some(e.to_string());
                        false
                    }
                }
            };

            results.push(RenameResult {
                original_name: preview.original_name.clone(),
                new_name: final_name,
                parent_path: preview.parent_path.clone(),
                success,
                skipped,
                error,
            });
        }

        if !dry_run && !results.is_empty() {
            let mut state = self.state.lock().unwrap();
            state.next_op += 1;
            let operation = RenameOperation {
                op_id: format!("op-{}", state.next_op),
                ts: Utc::now(),
                pattern: pattern.clone(),
                results: results.clone(),
            };
            state.undo_stack.push(operation);
            if state.undo_stack.len() > MAX_HISTORY {
                state.undo_stack.remove(0);
            }
            state.redo_stack.clear();
        }

        Ok(results)
    }

    /// Preview + apply in one step
    pub async fn bulk_rename(
        &self,
        nodes: &[RemoteNode],
        pattern: &RenamePattern,
        auto_resolve_conflicts: bool,
    ) -> Result<Vec<RenameResult>> {
        if auto_resolve_conflicts {
            self.set_conflict_resolver(Some(Box::new(|_original, proposed| {
                generate_unique_name(proposed, &[proposed.to_string()])
            })));
        }
        let previews = self.preview(nodes, pattern).await?;
        let results = self.apply(&previews, pattern, false).await;
        if auto_resolve_conflicts {
            self.set_conflict_resolver(None);
        }
        results
    }

    // --- Undo / redo ---

    /// Revert the most recent operation
    ///
    /// Each successfully renamed node is located at its stored parent path
    /// under its new name and renamed back.
    pub async fn undo(&self) -> Result<bool> {
        let Some(operation) = self.state.lock().unwrap().undo_stack.pop() else {
            return Ok(false);
        };

        let mut all_ok = true;
        for result in operation.results.iter().rev() {
            if !result.success || result.skipped {
                continue;
            }
            let path = join_path(&result.parent_path, &result.new_name);
            match self.client.node_by_path(&path).await? {
                Some(node) => {
                    if let Err(e) = self.client.rename(node.handle, &result.original_name).await {
                        warn!(path = %path, error = %e, "Undo rename failed");
                        all_ok = false;
                    }
                }
                None => {
                    warn!(path = %path, "Node vanished, cannot undo its rename");
                    all_ok = false;
                }
            }
        }

        if all_ok {
            self.state.lock().unwrap().redo_stack.push(operation);
        }
        info!(ok = all_ok, "Undid rename operation");
        Ok(all_ok)
    }

    /// Re-apply the most recently undone operation
    pub async fn redo(&self) -> Result<bool> {
        let Some(operation) = self.state.lock().unwrap().redo_stack.pop() else {
            return Ok(false);
        };

        let mut all_ok = true;
        for result in &operation.results {
            if !result.success || result.skipped {
                continue;
            }
            let path = join_path(&result.parent_path, &result.original_name);
            match self.client.node_by_path(&path).await? {
                Some(node) if node.name == result.original_name => {
                    if let Err(e) = self.client.rename(node.handle, &result.new_name).await {
                        warn!(path = %path, error = %e, "Redo rename failed");
                        all_ok = false;
                    }
                }
                _ => {
                    warn!(path = %path, "Node changed since undo, skipping redo");
                    all_ok = false;
                }
            }
        }

        if all_ok {
            self.state.lock().unwrap().undo_stack.push(operation);
        }
        Ok(all_ok)
    }

    /// Most recent operations, oldest first
    pub fn undo_history(&self, limit: usize) -> Vec<RenameOperation> {
        let state = self.state.lock().unwrap();
        let start = state.undo_stack.len().saturating_sub(limit);
        state.undo_stack[start..].to_vec()
    }

    pub fn clear_history(&self) {
        let mut state = self.state.lock().unwrap();
        state.undo_stack.clear();
        state.redo_stack.clear();
    }

    // --- Rules & templates ---

    pub fn add_custom_rule(&self, name: &str, pattern: RenamePattern) {
        self.state
            .lock()
            .unwrap()
            .custom_rules
            .insert(name.to_string(), pattern);
    }

    pub fn remove_custom_rule(&self, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .custom_rules
            .remove(name)
            .is_some()
    }

    /// Rule or template pattern by name; custom rules shadow templates
    pub fn rule(&self, name: &str) -> Option<RenamePattern> {
        if let Some(pattern) = self.state.lock().unwrap().custom_rules.get(name) {
            return Some(pattern.clone());
        }
        self.templates.get(name).map(|(p, _)| p.clone())
    }

    /// Every available rule name with a description
    pub fn available_rules(&self) -> BTreeMap<String, String> {
        let mut rules: BTreeMap<String, String> = self
            .templates
            .iter()
            .map(|(name, (_, desc))| (name.clone(), desc.to_string()))
            .collect();
        for name in self.state.lock().unwrap().custom_rules.keys() {
            rules.insert(name.clone(), "Custom rule".to_string());
        }
        rules
    }

    /// Apply a named rule or template to the given nodes
    pub async fn apply_rule(
        &self,
        rule_name: &str,
        nodes: &[RemoteNode],
    ) -> Result<Vec<RenameResult>> {
        let pattern = self
            .rule(rule_name)
            .ok_or_else(|| Error::not_found(format!("rename rule '{rule_name}'")))?;
        self.bulk_rename(nodes, &pattern, false).await
    }

    /// A copy of a built-in template, as a starting point for edits
    pub fn create_from_template(&self, template_name: &str) -> Option<RenamePattern> {
        self.templates.get(template_name).map(|(p, _)| p.clone())
    }

    // --- Rule import/export ---

    /// Write every custom rule to a JSON file
    pub fn export_rules(&self, path: &Path) -> Result<()> {
        let state = self.state.lock().unwrap();
        let file = RulesFile {
            version: RULES_FORMAT_VERSION.to_string(),
            custom_rules: state.custom_rules.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::internal(format!("serializing rename rules: {e}")))?;
        std::fs::write(path, json).map_err(|e| Error::io("writing rename rules", &e))?;
        debug!(count = file.custom_rules.len(), "Exported rename rules");
        Ok(())
    }

    /// Load custom rules from a JSON file, merging over existing names
    ///
    /// Every pattern field round-trips; an exported file imports losslessly.
    pub fn import_rules(&self, path: &Path) -> Result<usize> {
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::io("reading rename rules", &e))?;
        let file: RulesFile = serde_json::from_str(&content)
            .map_err(|e| Error::validation(format!("Invalid rules file: {e}")))?;

        let count = file.custom_rules.len();
        let mut state = self.state.lock().unwrap();
        for (name, pattern) in file.custom_rules {
            state.custom_rules.insert(name, pattern);
        }
        debug!(count, "Imported rename rules");
        Ok(count)
    }

    async fn sibling_names(&self, node: &RemoteNode) -> Result<Vec<String>> {
        Ok(self
            .client
            .children(node.parent)
            .await?
            .into_iter()
            .filter(|sibling| sibling.handle != node.handle)
            .map(|sibling| sibling.name)
            .collect())
    }
}

/// On-disk shape of exported rules
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RulesFile {
    version: String,
    custom_rules: BTreeMap<String, RenamePattern>,
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn builtin_templates() -> BTreeMap<String, (RenamePattern, &'static str)> {
    let mut templates = BTreeMap::new();

    templates.insert(
        "photo_organize".to_string(),
        (
            RenamePattern::substitution(
                r"IMG_(\d{4})(\d{2})(\d{2})_(.+)",
                "${1}-${2}-${3}_Photo_${4}",
            ),
            "Organize photos by date (IMG_YYYYMMDD format)",
        ),
    );

    let mut doc_version = RenamePattern::substitution(r"(.+?)(?:_v\d+)?$", "${1}_v{num:02d}");
    doc_version.sequential_numbering = true;
    doc_version.number_start = 1;
    doc_version.number_padding = 2;
    templates.insert(
        "doc_version".to_string(),
        (doc_version, "Add version numbers to documents"),
    );

    templates.insert(
        "clean_spaces".to_string(),
        (
            RenamePattern::substitution(r"\s+", "_"),
            "Replace spaces with underscores",
        ),
    );

    let mut date_prefix = RenamePattern::default();
    date_prefix.insert_datetime = true;
    date_prefix.datetime_format = "%Y%m%d_".to_string();
    templates.insert(
        "date_prefix".to_string(),
        (date_prefix, "Add date prefix to filenames"),
    );

    let mut remove_special = RenamePattern::substitution(r"[^\w\s\-_.]", "");
    remove_special.sanitize_for_filesystem = true;
    templates.insert(
        "remove_special".to_string(),
        (remove_special, "Remove special characters"),
    );

    templates
}

#[cfg(test)]
mod tests {
    use super::*;
    use megacustom_core::ports::memory::MemoryCloudClient;

    async fn fixture(files: &[&str]) -> (Arc<MemoryCloudClient>, Renamer, Vec<RemoteNode>) {
        let client = Arc::new(MemoryCloudClient::new());
        let mut nodes = Vec::new();
        for file in files {
            client.seed_file(file, 10, Utc::now());
        }
        for file in files {
            nodes.push(client.node_by_path(file).await.unwrap().unwrap());
        }
        let renamer = Renamer::new(Arc::clone(&client) as _);
        (client, renamer, nodes)
    }

    #[tokio::test]
    async fn test_preview_apply_undo_redo_roundtrip() {
        let (client, renamer, nodes) = fixture(&["/photos/img_42.jpg"]).await;
        let pattern = RenamePattern::substitution(r"(\d+)", "[$1]");

        let previews = renamer.preview(&nodes, &pattern).await.unwrap();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].proposed_name, "img_[42].jpg");
        assert!(previews[0].conflict.is_none());
        // Preview mutates nothing
        assert!(client.node_by_path("/photos/img_42.jpg").await.unwrap().is_some());

        let results = renamer.apply(&previews, &pattern, false).await.unwrap();
        assert!(results[0].success);
        assert!(client
            .node_by_path("/photos/img_[42].jpg")
            .await
            .unwrap()
            .is_some());

        assert!(renamer.undo().await.unwrap());
        assert!(client.node_by_path("/photos/img_42.jpg").await.unwrap().is_some());
        assert!(client
            .node_by_path("/photos/img_[42].jpg")
            .await
            .unwrap()
            .is_none());

        assert!(renamer.redo().await.unwrap());
        assert!(client
            .node_by_path("/photos/img_[42].jpg")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_duplicate_in_batch_flagged() {
        let (_client, renamer, nodes) = fixture(&["/a1.txt", "/a2.txt"]).await;
        // Collapse both names onto "a.txt"
        let pattern = RenamePattern::substitution(r"\d", "");

        let previews = renamer.preview(&nodes, &pattern).await.unwrap();
        assert!(previews[0].conflict.is_none());
        assert_eq!(
            previews[1].conflict.as_deref(),
            Some("Duplicate name in batch")
        );
    }

    #[tokio::test]
    async fn test_existing_sibling_flagged() {
        let (_client, renamer, nodes) =
            fixture(&["/docs/draft.txt", "/docs/final.txt"]).await;
        let pattern = RenamePattern::substitution("draft", "final");

        let previews = renamer.preview(&nodes[..1], &pattern).await.unwrap();
        assert_eq!(
            previews[0].conflict.as_deref(),
            Some("File already exists in folder")
        );
    }

    #[tokio::test]
    async fn test_conflict_skipped_without_resolver() {
        let (client, renamer, nodes) =
            fixture(&["/docs/draft.txt", "/docs/final.txt"]).await;
        let pattern = RenamePattern::substitution("draft", "final");

        let previews = renamer.preview(&nodes[..1], &pattern).await.unwrap();
        let results = renamer.apply(&previews, &pattern, false).await.unwrap();
        assert!(results[0].skipped);
        assert!(!results[0].success);
        assert!(client.node_by_path("/docs/draft.txt").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_conflict_resolver_supplies_name() {
        let (client, renamer, nodes) =
            fixture(&["/docs/draft.txt", "/docs/final.txt"]).await;
        let pattern = RenamePattern::substitution("draft", "final");

        renamer.set_conflict_resolver(Some(Box::new(|_original, proposed| {
            format!("resolved_{proposed}")
        })));
        let previews = renamer.preview(&nodes[..1], &pattern).await.unwrap();
        let results = renamer.apply(&previews, &pattern, false).await.unwrap();
        assert!(results[0].success);
        assert_eq!(results[0].new_name, "resolved_final.txt");
        assert!(client
            .node_by_path("/docs/resolved_final.txt")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_dry_run_keeps_history_empty() {
        let (client, renamer, nodes) = fixture(&["/a.txt"]).await;
        let pattern = RenamePattern::substitution("a", "b");

        let previews = renamer.preview(&nodes, &pattern).await.unwrap();
        let results = renamer.apply(&previews, &pattern, true).await.unwrap();
        assert!(results[0].success);
        assert!(client.node_by_path("/a.txt").await.unwrap().is_some());
        assert!(renamer.undo_history(10).is_empty());
        assert!(!renamer.undo().await.unwrap());
    }

    #[tokio::test]
    async fn test_new_apply_clears_redo() {
        let (_client, renamer, nodes) = fixture(&["/one.txt", "/two.txt"]).await;

        let pattern = RenamePattern::substitution("one", "uno");
        let previews = renamer.preview(&nodes[..1], &pattern).await.unwrap();
        renamer.apply(&previews, &pattern, false).await.unwrap();
        renamer.undo().await.unwrap();

        // A fresh apply clears the redo stack
        let pattern2 = RenamePattern::substitution("two", "dos");
        let previews = renamer.preview(&nodes[1..], &pattern2).await.unwrap();
        renamer.apply(&previews, &pattern2, false).await.unwrap();

        assert!(!renamer.redo().await.unwrap());
    }

    #[tokio::test]
    async fn test_sequential_numbering_across_batch() {
        let (_client, renamer, nodes) =
            fixture(&["/x/p.jpg", "/x/q.jpg", "/x/r.jpg"]).await;
        let mut pattern = RenamePattern::default();
        pattern.sequential_numbering = true;
        pattern.number_start = 5;
        pattern.number_padding = 3;

        let previews = renamer.preview(&nodes, &pattern).await.unwrap();
        let names: Vec<&str> = previews.iter().map(|p| p.proposed_name.as_str()).collect();
        assert_eq!(names, vec!["p_005.jpg", "q_006.jpg", "r_007.jpg"]);
    }

    #[tokio::test]
    async fn test_preview_by_path_glob() {
        let (_client, renamer, _nodes) = fixture(&[
            "/photos/a.jpg",
            "/photos/b.png",
            "/photos/sub/c.jpg",
        ])
        .await;
        let pattern = RenamePattern::substitution("a", "z");

        let flat = renamer
            .preview_by_path("/photos/*.jpg", &pattern, false)
            .await
            .unwrap();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].original_name, "a.jpg");

        let recursive = renamer
            .preview_by_path("/photos/*.jpg", &pattern, true)
            .await
            .unwrap();
        assert_eq!(recursive.len(), 2);
    }

    #[tokio::test]
    async fn test_rules_and_templates() {
        let (_client, renamer, nodes) = fixture(&["/IMG_20240517_trip.jpg"]).await;

        let rules = renamer.available_rules();
        assert!(rules.contains_key("photo_organize"));
        assert!(rules.contains_key("clean_spaces"));

        let results = renamer.apply_rule("photo_organize", &nodes).await.unwrap();
        assert!(results[0].success);
        assert_eq!(results[0].new_name, "2024-05-17_Photo_trip.jpg");

        assert!(renamer.apply_rule("no_such_rule", &nodes).await.is_err());
    }

    #[tokio::test]
    async fn test_rule_export_import_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let (_client, renamer, _nodes) = fixture(&[]).await;

        let mut pattern = RenamePattern::substitution(r"\s+", "-");
        pattern.case_conversion = crate::pattern::CaseConversion::Kebab;
        pattern.max_replacements = Some(4);
        pattern
            .character_replacements
            .insert("&".to_string(), "and".to_string());
        renamer.add_custom_rule("tidy", pattern.clone());

        let path = dir.path().join("rules.json");
        renamer.export_rules(&path).unwrap();

        let (_client2, other, _) = fixture(&[]).await;
        assert_eq!(other.import_rules(&path).unwrap(), 1);
        assert_eq!(other.rule("tidy").unwrap(), pattern);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        // The next apply after reaching the bound trims the oldest entry
        let client = Arc::new(MemoryCloudClient::new());
        client.seed_file("/t.txt", 1, Utc::now());
        let node = client.node_by_path("/t.txt").await.unwrap().unwrap();
        let renamer2 = Renamer::new(Arc::clone(&client) as _);
        {
            let mut state = renamer2.state.lock().unwrap();
            for i in 0..MAX_HISTORY {
                state.undo_stack.push(RenameOperation {
                    op_id: format!("op-{i}"),
                    ts: Utc::now(),
                    pattern: RenamePattern::default(),
                    results: Vec::new(),
                });
            }
        }
        let pattern = RenamePattern::substitution("t", "u");
        let previews = renamer2.preview(&[node], &pattern).await.unwrap();
        renamer2.apply(&previews, &pattern, false).await.unwrap();
        assert_eq!(renamer2.state.lock().unwrap().undo_stack.len(), MAX_HISTORY);
    }
}
