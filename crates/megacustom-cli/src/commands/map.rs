//! Folder mapping commands

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use megacustom_sync::UploadOptions;

use crate::app::App;
use crate::output::{format_bytes, get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum MapCommand {
    /// Add a named local -> remote mapping
    Add {
        name: String,
        local_path: PathBuf,
        remote_path: String,
    },
    /// Remove a mapping
    Remove { name: String },
    /// List mappings
    List,
    /// Enable or disable a mapping
    Enable {
        name: String,
        #[arg(long)]
        off: bool,
    },
    /// Show what an upload would do
    Preview {
        name: String,
        /// Upload everything, even up-to-date files
        #[arg(long)]
        full: bool,
    },
    /// Incrementally upload one mapping
    Upload {
        name: String,
        #[arg(long)]
        full: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Upload every enabled mapping
    UploadAll {
        #[arg(long)]
        full: bool,
    },
}

impl MapCommand {
    pub async fn execute(&self, app: &App, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));
        app.mapper.load()?;

        match self {
            MapCommand::Add {
                name,
                local_path,
                remote_path,
            } => {
                app.mapper.add(name, local_path, remote_path)?;
                formatter.success(&format!("Mapping '{name}' added"));
            }
            MapCommand::Remove { name } => {
                app.mapper.remove(name)?;
                formatter.success(&format!("Mapping '{name}' removed"));
            }
            MapCommand::List => {
                let mappings = app.mapper.all();
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::to_value(&mappings)?);
                } else if mappings.is_empty() {
                    formatter.info("No mappings configured");
                } else {
                    for m in mappings {
                        println!(
                            "{} [{}] {} -> {}",
                            m.name,
                            if m.enabled { "on" } else { "off" },
                            m.local_path.display(),
                            m.remote_path
                        );
                    }
                }
            }
            MapCommand::Enable { name, off } => {
                app.mapper.set_enabled(name, !off)?;
                formatter.success(&format!(
                    "Mapping '{name}' {}",
                    if *off { "disabled" } else { "enabled" }
                ));
            }
            MapCommand::Preview { name, full } => {
                let options = UploadOptions {
                    incremental: !full,
                    ..Default::default()
                };
                let entries = app.mapper.preview_upload(name, options).await?;
                if matches!(format, OutputFormat::Json) {
                    let rows: Vec<serde_json::Value> = entries
                        .iter()
                        .map(|e| {
                            serde_json::json!({
                                "relPath": e.rel_path,
                                "localSize": e.local_size,
                                "needsUpload": e.needs_upload,
                                "skipReason": e.skip_reason,
                            })
                        })
                        .collect();
                    formatter.print_json(&serde_json::json!({ "entries": rows }));
                } else {
                    for e in &entries {
                        let marker = if e.needs_upload { "+" } else { "=" };
                        println!(
                            "{marker} {:<40} {:>10} {}",
                            e.rel_path,
                            format_bytes(e.local_size),
                            e.skip_reason.as_deref().unwrap_or("")
                        );
                    }
                    let pending = entries.iter().filter(|e| e.needs_upload).count();
                    formatter.info(&format!("{pending} of {} files need upload", entries.len()));
                }
            }
            MapCommand::Upload {
                name,
                full,
                dry_run,
            } => {
                let options = UploadOptions {
                    incremental: !full,
                    dry_run: *dry_run,
                    ..Default::default()
                };
                let report = app.mapper.upload(name, options).await?;
                app.transfers.pump().await;
                formatter.success(&format!(
                    "{}: {} enqueued, {} skipped, {} of {}",
                    report.mapping,
                    report.enqueued_files,
                    report.skipped_files,
                    format_bytes(report.enqueued_bytes),
                    format_bytes(report.total_bytes),
                ));
            }
            MapCommand::UploadAll { full } => {
                let options = UploadOptions {
                    incremental: !full,
                    ..Default::default()
                };
                let reports = app.mapper.upload_all(options).await?;
                app.transfers.pump().await;
                for report in reports {
                    formatter.success(&format!(
                        "{}: {} enqueued, {} skipped",
                        report.mapping, report.enqueued_files, report.skipped_files
                    ));
                }
            }
        }
        Ok(())
    }
}
