//! Transfer queue commands

use anyhow::Result;
use clap::Subcommand;

use crate::app::App;
use crate::output::{format_bytes, get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum TransfersCommand {
    /// List every known transfer
    List,
    /// Show queue summary counters
    Status,
    /// Pause an active transfer
    Pause { id: u64 },
    /// Resume a paused transfer
    Resume { id: u64 },
    /// Cancel a transfer
    Cancel { id: u64 },
    /// Cancel everything and clear the pending queue
    CancelAll,
    /// Re-queue a failed transfer
    Retry { id: u64 },
    /// Drop finished transfers from the list
    ClearCompleted,
    /// Change the concurrency bound (clamped to 1-10)
    SetConcurrency { max: usize },
    /// Raise or lower a pending transfer's priority
    SetPriority { id: u64, priority: i32 },
}

impl TransfersCommand {
    pub async fn execute(&self, app: &App, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        match self {
            TransfersCommand::List => {
                let tasks = app.transfers.tasks();
                if matches!(format, OutputFormat::Json) {
                    let rows: Vec<serde_json::Value> = tasks
                        .iter()
                        .map(|t| {
                            serde_json::json!({
                                "id": t.id,
                                "name": t.name,
                                "state": t.state.name(),
                                "bytes": t.bytes,
                                "size": t.size,
                                "priority": t.priority,
                                "retries": t.retries,
                                "error": t.error,
                            })
                        })
                        .collect();
                    formatter.print_json(&serde_json::json!({ "transfers": rows }));
                } else if tasks.is_empty() {
                    formatter.info("Transfer queue is empty");
                } else {
                    for t in tasks {
                        println!(
                            "{:>4}  {:<10} {:>3}%  {:<30} {}",
                            t.id,
                            t.state.name(),
                            t.progress_percent(),
                            t.name,
                            t.error.as_deref().unwrap_or("")
                        );
                    }
                }
            }
            TransfersCommand::Status => {
                let summary = app.transfers.summary();
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::json!({
                        "active": summary.active,
                        "pending": summary.pending,
                        "completed": summary.completed,
                        "failed": summary.failed,
                        "uploadBps": summary.upload_bps,
                        "downloadBps": summary.download_bps,
                    }));
                } else {
                    println!(
                        "active {}  pending {}  completed {}  failed {}  up {}/s  down {}/s",
                        summary.active,
                        summary.pending,
                        summary.completed,
                        summary.failed,
                        format_bytes(summary.upload_bps),
                        format_bytes(summary.download_bps),
                    );
                }
            }
            TransfersCommand::Pause { id } => {
                if app.transfers.pause(*id) {
                    formatter.success(&format!("Paused transfer {id}"));
                } else {
                    formatter.error(&format!("Transfer {id} is not active"));
                }
            }
            TransfersCommand::Resume { id } => {
                if app.transfers.resume(*id) {
                    formatter.success(&format!("Resumed transfer {id}"));
                } else {
                    formatter.error(&format!("Transfer {id} is not paused"));
                }
            }
            TransfersCommand::Cancel { id } => {
                if app.transfers.cancel(*id) {
                    formatter.success(&format!("Cancelled transfer {id}"));
                } else {
                    formatter.error(&format!("Transfer {id} is already finished"));
                }
            }
            TransfersCommand::CancelAll => {
                app.transfers.cancel_all();
                formatter.success("Cancelled all transfers");
            }
            TransfersCommand::Retry { id } => {
                if app.transfers.retry(*id) {
                    formatter.success(&format!("Re-queued transfer {id}"));
                } else {
                    formatter.error(&format!("Transfer {id} has not failed"));
                }
            }
            TransfersCommand::ClearCompleted => {
                app.transfers.clear_completed();
                formatter.success("Cleared finished transfers");
            }
            TransfersCommand::SetConcurrency { max } => {
                app.transfers.set_max_concurrent(*max);
                formatter.success(&format!(
                    "Concurrency set to {}",
                    app.transfers.max_concurrent()
                ));
            }
            TransfersCommand::SetPriority { id, priority } => {
                if app.transfers.set_priority(*id, *priority) {
                    formatter.success(&format!("Priority of {id} set to {priority}"));
                } else {
                    formatter.error(&format!("Unknown transfer {id}"));
                }
            }
        }
        Ok(())
    }
}
