//! Sync profile commands

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use uuid::Uuid;

use megacustom_sync::{ActionKind, ConflictPolicy, SyncDirection};

use crate::app::App;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum SyncCommand {
    /// Create a sync profile
    Create {
        name: String,
        local_path: PathBuf,
        remote_path: String,
        /// bidir | push | pull
        #[arg(long, default_value = "bidir")]
        direction: String,
        /// ask | newer | larger | local | remote | keep-both
        #[arg(long, default_value = "ask")]
        conflicts: String,
        /// Delete files that exist on only one side
        #[arg(long)]
        delete_orphans: bool,
    },
    /// List profiles
    List,
    /// Delete a profile
    Delete { profile_id: Uuid },
    /// Analyze without changing anything
    Analyze { profile_id: Uuid },
    /// Resolve one staged conflict
    Resolve {
        profile_id: Uuid,
        conflict_id: u64,
        /// newer | larger | local | remote | keep-both
        policy: String,
    },
    /// Execute the staged plan
    Run { profile_id: Uuid },
    /// Show recent runs
    History {
        profile_id: Uuid,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Export a profile to a JSON file
    Export { profile_id: Uuid, path: PathBuf },
    /// Import a profile from a JSON file
    Import { path: PathBuf },
}

fn parse_direction(s: &str) -> Result<SyncDirection> {
    Ok(match s.to_lowercase().as_str() {
        "bidir" | "bidirectional" | "both" => SyncDirection::Bidirectional,
        "push" | "up" => SyncDirection::Push,
        "pull" | "down" => SyncDirection::Pull,
        other => anyhow::bail!("Unknown direction '{other}' (bidir|push|pull)"),
    })
}

fn parse_policy(s: &str) -> Result<ConflictPolicy> {
    Ok(match s.to_lowercase().as_str() {
        "ask" => ConflictPolicy::Ask,
        "newer" => ConflictPolicy::Newer,
        "larger" => ConflictPolicy::Larger,
        "local" => ConflictPolicy::Local,
        "remote" => ConflictPolicy::Remote,
        "keep-both" | "keepboth" | "both" => ConflictPolicy::KeepBoth,
        other => anyhow::bail!("Unknown policy '{other}'"),
    })
}

impl SyncCommand {
    pub async fn execute(&self, app: &App, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        match self {
            SyncCommand::Create {
                name,
                local_path,
                remote_path,
                direction,
                conflicts,
                delete_orphans,
            } => {
                let id = app.sync.create_profile(name, local_path, remote_path)?;
                let mut profile = app.sync.profile(id).expect("profile just created");
                profile.direction = parse_direction(direction)?;
                profile.conflict_policy = parse_policy(conflicts)?;
                profile.delete_orphans = *delete_orphans;
                app.sync.update_profile(profile)?;
                formatter.success(&format!("Profile '{name}' created: {id}"));
            }
            SyncCommand::List => {
                let profiles = app.sync.profiles();
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::to_value(&profiles)?);
                } else if profiles.is_empty() {
                    formatter.info("No sync profiles");
                } else {
                    for p in profiles {
                        println!(
                            "{} {} {} <-> {} (last sync: {})",
                            p.id,
                            p.name,
                            p.local_path.display(),
                            p.remote_path,
                            p.last_sync
                                .map(|t| t.to_rfc3339())
                                .unwrap_or_else(|| "never".to_string())
                        );
                    }
                }
            }
            SyncCommand::Delete { profile_id } => {
                app.sync.delete_profile(*profile_id)?;
                formatter.success("Profile deleted");
            }
            SyncCommand::Analyze { profile_id } => {
                let report = app.sync.analyze(*profile_id).await?;
                if matches!(format, OutputFormat::Json) {
                    let actions: Vec<serde_json::Value> = report
                        .actions
                        .iter()
                        .map(|a| {
                            serde_json::json!({
                                "id": a.id,
                                "relPath": a.rel_path,
                                "kind": format!("{:?}", a.kind),
                            })
                        })
                        .collect();
                    formatter.print_json(&serde_json::json!({
                        "actions": actions,
                        "unresolvedConflicts": report.unresolved_conflicts(),
                    }));
                } else {
                    for action in &report.actions {
                        if action.kind != ActionKind::Skip {
                            println!("{:<14} {}", format!("{:?}", action.kind), action.rel_path);
                        }
                    }
                    formatter.info(&format!(
                        "{} uploads, {} downloads, {} deletions, {} conflicts, {} up to date",
                        report.count(ActionKind::Upload),
                        report.count(ActionKind::Download),
                        report.count(ActionKind::DeleteLocal)
                            + report.count(ActionKind::DeleteRemote),
                        report.count(ActionKind::Conflict),
                        report.count(ActionKind::Skip),
                    ));
                }
            }
            SyncCommand::Resolve {
                profile_id,
                conflict_id,
                policy,
            } => {
                app.sync
                    .resolve_conflict(*profile_id, *conflict_id, parse_policy(policy)?)?;
                formatter.success(&format!("Conflict {conflict_id} resolved"));
            }
            SyncCommand::Run { profile_id } => {
                let summary = app.sync.start_sync(*profile_id).await?;
                app.transfers.pump().await;
                formatter.success(&format!(
                    "{}: {} uploaded, {} downloaded, {} deleted, {} errors",
                    summary.outcome.label(),
                    summary.uploaded,
                    summary.downloaded,
                    summary.deleted,
                    summary.errors
                ));
            }
            SyncCommand::History { profile_id, limit } => {
                let entries = app.sync.history(*profile_id, *limit);
                if entries.is_empty() {
                    formatter.info("No sync history");
                } else {
                    for e in entries {
                        println!(
                            "{}  {:<22} up {} down {} errors {}",
                            e.ts.to_rfc3339(),
                            e.status,
                            e.uploaded,
                            e.downloaded,
                            e.errors
                        );
                    }
                }
            }
            SyncCommand::Export { profile_id, path } => {
                app.sync.export_profile(*profile_id, path)?;
                formatter.success(&format!("Exported to {}", path.display()));
            }
            SyncCommand::Import { path } => {
                let id = app.sync.import_profile(path)?;
                formatter.success(&format!("Imported as {id}"));
            }
        }
        Ok(())
    }
}
