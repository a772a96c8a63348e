//! Sync profiles and their JSON persistence
//!
//! Profiles persist as an indented JSON array at
//! `${CONFIG_DIR}/MegaCustom/sync_profiles.json`. Field names and the
//! integer encodings of `direction` and `conflictResolution` are part of the
//! on-disk format; unknown fields are ignored on load and missing fields fall
//! back to defaults.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use megacustom_core::error::{Error, Result};

/// Which way files are allowed to flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
pub enum SyncDirection {
    /// Copy in both directions
    Bidirectional,
    /// Local to remote only
    Push,
    /// Remote to local only
    Pull,
}

impl SyncDirection {
    pub fn allows_push(&self) -> bool {
        matches!(self, SyncDirection::Bidirectional | SyncDirection::Push)
    }

    pub fn allows_pull(&self) -> bool {
        matches!(self, SyncDirection::Bidirectional | SyncDirection::Pull)
    }
}

impl From<SyncDirection> for u8 {
    fn from(d: SyncDirection) -> u8 {
        match d {
            SyncDirection::Bidirectional => 0,
            SyncDirection::Push => 1,
            SyncDirection::Pull => 2,
        }
    }
}

impl From<u8> for SyncDirection {
    fn from(v: u8) -> Self {
        match v {
            1 => SyncDirection::Push,
            2 => SyncDirection::Pull,
            _ => SyncDirection::Bidirectional,
        }
    }
}

/// How a two-sided difference is settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
pub enum ConflictPolicy {
    /// Surface the conflict and wait for an explicit resolution
    Ask,
    /// The side with the larger mtime wins
    Newer,
    /// The side with the larger size wins
    Larger,
    /// Local always wins
    Local,
    /// Remote always wins
    Remote,
    /// Keep both; the losing side is renamed with a numeric suffix
    KeepBoth,
}

impl From<ConflictPolicy> for u8 {
    fn from(p: ConflictPolicy) -> u8 {
        match p {
            ConflictPolicy::Ask => 0,
            ConflictPolicy::Newer => 1,
            ConflictPolicy::Larger => 2,
            ConflictPolicy::Local => 3,
            ConflictPolicy::Remote => 4,
            ConflictPolicy::KeepBoth => 5,
        }
    }
}

impl From<u8> for ConflictPolicy {
    fn from(v: u8) -> Self {
        match v {
            1 => ConflictPolicy::Newer,
            2 => ConflictPolicy::Larger,
            3 => ConflictPolicy::Local,
            4 => ConflictPolicy::Remote,
            5 => ConflictPolicy::KeepBoth,
            _ => ConflictPolicy::Ask,
        }
    }
}

/// One configured local/remote sync pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncProfile {
    pub id: Uuid,
    pub name: String,
    pub local_path: PathBuf,
    pub remote_path: String,
    pub direction: SyncDirection,
    #[serde(rename = "conflictResolution")]
    pub conflict_policy: ConflictPolicy,
    #[serde(rename = "includePatterns")]
    pub include_globs: Vec<String>,
    #[serde(rename = "excludePatterns")]
    pub exclude_globs: Vec<String>,
    #[serde(rename = "syncHidden")]
    pub sync_hidden: bool,
    #[serde(rename = "syncTemp")]
    pub sync_temp: bool,
    pub delete_orphans: bool,
    pub verify: bool,
    #[serde(rename = "autoSync")]
    pub auto_sync_enabled: bool,
    #[serde(rename = "autoSyncInterval")]
    pub auto_sync_interval_minutes: u32,
    pub last_sync: Option<DateTime<Utc>>,
}

impl Default for SyncProfile {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            local_path: PathBuf::new(),
            remote_path: "/".to_string(),
            direction: SyncDirection::Bidirectional,
            conflict_policy: ConflictPolicy::Ask,
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            sync_hidden: false,
            sync_temp: false,
            delete_orphans: false,
            verify: true,
            auto_sync_enabled: false,
            auto_sync_interval_minutes: 60,
            last_sync: None,
        }
    }
}

impl SyncProfile {
    pub fn new(
        name: impl Into<String>,
        local_path: impl Into<PathBuf>,
        remote_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            ..Default::default()
        }
    }

    /// Auto-sync cadence, `None` when disabled
    pub fn auto_sync(&self) -> Option<std::time::Duration> {
        self.auto_sync_enabled
            .then(|| std::time::Duration::from_secs(self.auto_sync_interval_minutes as u64 * 60))
    }
}

/// Disk persistence for the profile list
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under the application config directory
    pub fn default_path() -> PathBuf {
        megacustom_core::config::config_dir().join("sync_profiles.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all profiles; a missing file is an empty list
    pub fn load(&self) -> Result<Vec<SyncProfile>> {
        if !self.path.exists() {
            debug!("No sync profiles file, starting empty");
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::io("reading sync profiles", &e))?;
        match serde_json::from_str::<Vec<SyncProfile>>(&content) {
            Ok(profiles) => {
                debug!(count = profiles.len(), "Loaded sync profiles");
                Ok(profiles)
            }
            Err(e) => {
                warn!(error = %e, "Sync profiles file is malformed, starting empty");
                Ok(Vec::new())
            }
        }
    }

    /// Write all profiles as indented JSON
    pub fn save(&self, profiles: &[SyncProfile]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io("creating config directory", &e))?;
        }
        let json = serde_json::to_string_pretty(profiles)
            .map_err(|e| Error::internal(format!("serializing sync profiles: {e}")))?;
        std::fs::write(&self.path, json).map_err(|e| Error::io("writing sync profiles", &e))?;
        debug!(count = profiles.len(), "Saved sync profiles");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_permissions() {
        assert!(SyncDirection::Bidirectional.allows_push());
        assert!(SyncDirection::Bidirectional.allows_pull());
        assert!(SyncDirection::Push.allows_push());
        assert!(!SyncDirection::Push.allows_pull());
        assert!(!SyncDirection::Pull.allows_push());
        assert!(SyncDirection::Pull.allows_pull());
    }

    #[test]
    fn test_persisted_field_names_and_encodings() {
        let mut profile = SyncProfile::new("docs", "/home/user/docs", "/docs");
        profile.direction = SyncDirection::Pull;
        profile.conflict_policy = ConflictPolicy::KeepBoth;

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["localPath"], "/home/user/docs");
        assert_eq!(json["remotePath"], "/docs");
        assert_eq!(json["direction"], 2);
        assert_eq!(json["conflictResolution"], 5);
        assert!(json["syncHidden"].is_boolean());
        assert!(json["deleteOrphans"].is_boolean());
    }

    #[test]
    fn test_unknown_fields_ignored_and_defaults_applied() {
        let json = r#"[{
            "id": "7b3f6f60-9c35-4bfa-a4f3-8a1f8bb1b2c3",
            "name": "min",
            "localPath": "/tmp/x",
            "remotePath": "/x",
            "direction": 7,
            "someFutureField": {"nested": true}
        }]"#;
        let profiles: Vec<SyncProfile> = serde_json::from_str(json).unwrap();
        assert_eq!(profiles.len(), 1);
        // Out-of-range direction falls back to bidirectional
        assert_eq!(profiles[0].direction, SyncDirection::Bidirectional);
        assert_eq!(profiles[0].conflict_policy, ConflictPolicy::Ask);
        assert!(profiles[0].verify);
    }

    #[test]
    fn test_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("sync_profiles.json"));
        assert!(store.load().unwrap().is_empty());

        let mut profile = SyncProfile::new("docs", "/home/user/docs", "/docs");
        profile.last_sync = Some(Utc::now());
        store.save(std::slice::from_ref(&profile)).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, profile.id);
        assert_eq!(loaded[0].name, "docs");
        assert!(loaded[0].last_sync.is_some());
    }

    #[test]
    fn test_auto_sync_accessor() {
        let mut profile = SyncProfile::new("p", "/a", "/b");
        assert!(profile.auto_sync().is_none());
        profile.auto_sync_enabled = true;
        profile.auto_sync_interval_minutes = 30;
        assert_eq!(
            profile.auto_sync(),
            Some(std::time::Duration::from_secs(1800))
        );
    }
}
