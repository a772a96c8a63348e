//! Multi-destination upload commands

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use megacustom_transfer::RuleKind;

use crate::app::App;
use crate::output::{format_bytes, get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum UploadCommand {
    /// Add source files to the batch
    AddFiles { files: Vec<PathBuf> },
    /// Add every file under a folder
    AddFolder {
        folder: PathBuf,
        #[arg(long)]
        recursive: bool,
    },
    /// Add a candidate destination folder
    AddDest { remote_path: String },
    /// Add a routing rule (first match wins, insertion order)
    AddRule {
        /// ext | size | name | default
        kind: String,
        /// Extension list, "min-max" MB range, or wildcard, per kind
        pattern: String,
        destination: String,
    },
    /// Show configured sources, destinations, and rules
    Show,
    /// Classify the batch and submit one transfer per source
    Start,
    /// Aggregate progress of the last batch
    Progress,
    /// Re-queue every failed transfer of the last batch
    RetryFailed,
    /// Clear sources, destinations, and rules
    Reset,
}

fn parse_rule_kind(kind: &str) -> Result<RuleKind> {
    Ok(match kind.to_lowercase().as_str() {
        "ext" | "extension" => RuleKind::ByExtension,
        "size" => RuleKind::BySize,
        "name" => RuleKind::ByName,
        "default" => RuleKind::Default,
        other => anyhow::bail!("Unknown rule kind '{other}' (ext|size|name|default)"),
    })
}

impl UploadCommand {
    pub async fn execute(&self, app: &App, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        match self {
            UploadCommand::AddFiles { files } => {
                app.uploader.add_files(files);
                formatter.success(&format!(
                    "{} sources, {} total",
                    app.uploader.source_count(),
                    format_bytes(app.uploader.total_source_bytes())
                ));
            }
            UploadCommand::AddFolder { folder, recursive } => {
                app.uploader.add_folder(folder, *recursive)?;
                formatter.success(&format!("{} sources", app.uploader.source_count()));
            }
            UploadCommand::AddDest { remote_path } => {
                app.uploader.add_destination(remote_path);
                formatter.success(&format!("Destination {remote_path} added"));
            }
            UploadCommand::AddRule {
                kind,
                pattern,
                destination,
            } => {
                let id = app
                    .uploader
                    .add_rule(parse_rule_kind(kind)?, pattern, destination)?;
                formatter.success(&format!("Rule {id} added: {pattern} -> {destination}"));
            }
            UploadCommand::Show => {
                if matches!(format, OutputFormat::Json) {
                    let rules: Vec<serde_json::Value> = app
                        .uploader
                        .rules()
                        .iter()
                        .map(|r| {
                            serde_json::json!({
                                "id": r.id,
                                "kind": format!("{:?}", r.kind),
                                "pattern": r.pattern,
                                "destination": r.destination,
                                "enabled": r.enabled,
                            })
                        })
                        .collect();
                    formatter.print_json(&serde_json::json!({
                        "sources": app.uploader.source_count(),
                        "totalBytes": app.uploader.total_source_bytes(),
                        "destinations": app.uploader.destinations(),
                        "rules": rules,
                    }));
                } else {
                    println!(
                        "{} sources ({})",
                        app.uploader.source_count(),
                        format_bytes(app.uploader.total_source_bytes())
                    );
                    for dest in app.uploader.destinations() {
                        println!("  dest {dest}");
                    }
                    for rule in app.uploader.rules() {
                        println!(
                            "  rule {} [{}] {:?} {} -> {}",
                            rule.id,
                            if rule.enabled { "on" } else { "off" },
                            rule.kind,
                            rule.pattern,
                            rule.destination
                        );
                    }
                }
            }
            UploadCommand::Start => {
                let ids = app.uploader.start_upload()?;
                app.transfers.pump().await;
                formatter.success(&format!("Submitted {} uploads", ids.len()));
            }
            UploadCommand::Progress => {
                let progress = app.uploader.batch_progress();
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::json!({
                        "total": progress.total,
                        "completed": progress.completed,
                        "failed": progress.failed,
                        "bytesDone": progress.bytes_done,
                        "bytesTotal": progress.bytes_total,
                        "finished": progress.is_finished(),
                    }));
                } else {
                    println!(
                        "{}/{} done, {} failed, {} of {}",
                        progress.completed,
                        progress.total,
                        progress.failed,
                        format_bytes(progress.bytes_done),
                        format_bytes(progress.bytes_total),
                    );
                }
            }
            UploadCommand::RetryFailed => {
                let retried = app.uploader.retry_all_failed();
                formatter.success(&format!("Re-queued {retried} transfers"));
            }
            UploadCommand::Reset => {
                app.uploader.clear_files();
                app.uploader.clear_destinations();
                formatter.success("Upload batch cleared");
            }
        }
        Ok(())
    }
}
