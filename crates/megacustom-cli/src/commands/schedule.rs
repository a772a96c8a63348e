//! Scheduled task commands

use anyhow::Result;
use clap::Subcommand;

use megacustom_scheduler::{Repeat, ScheduledTask, TaskKind};

use crate::app::App;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    /// Add a scheduled task
    Add {
        name: String,
        /// map | sync | upload
        kind: String,
        /// Mapping name, sync profile name, or ruleset name
        target: String,
        /// once | hourly:N | daily:N | weekly:N
        #[arg(long, default_value = "daily:1")]
        repeat: String,
    },
    /// List tasks
    List,
    /// Remove a task
    Remove { id: u64 },
    /// Enable or disable a task
    Enable {
        id: u64,
        #[arg(long)]
        off: bool,
    },
    /// Run a task immediately
    RunNow { id: u64 },
    /// Change the scheduler check interval (seconds, minimum 10)
    SetInterval { seconds: u64 },
}

fn parse_kind(s: &str) -> Result<TaskKind> {
    Ok(match s.to_lowercase().as_str() {
        "map" | "mapping" | "folder-mapping" => TaskKind::FolderMapping,
        "sync" | "smart-sync" => TaskKind::SmartSync,
        "upload" | "multi-upload" => TaskKind::MultiUpload,
        other => anyhow::bail!("Unknown task kind '{other}' (map|sync|upload)"),
    })
}

fn parse_repeat(s: &str) -> Result<Repeat> {
    let lower = s.to_lowercase();
    if lower == "once" {
        return Ok(Repeat::Once);
    }
    let (mode, every) = lower
        .split_once(':')
        .map(|(m, n)| (m, n.parse::<u32>()))
        .unwrap_or((lower.as_str(), Ok(1)));
    let every = every.map_err(|_| anyhow::anyhow!("Bad repeat interval in '{s}'"))?;
    Ok(match mode {
        "hourly" => Repeat::Hourly(every),
        "daily" => Repeat::Daily(every),
        "weekly" => Repeat::Weekly(every),
        other => anyhow::bail!("Unknown repeat '{other}' (once|hourly:N|daily:N|weekly:N)"),
    })
}

impl ScheduleCommand {
    pub async fn execute(&self, app: &App, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        match self {
            ScheduleCommand::Add {
                name,
                kind,
                target,
                repeat,
            } => {
                let task =
                    ScheduledTask::new(name, parse_kind(kind)?, parse_repeat(repeat)?, target);
                let id = app.scheduler.add_task(task)?;
                formatter.success(&format!("Task '{name}' added with id {id}"));
            }
            ScheduleCommand::List => {
                let tasks = app.scheduler.tasks();
                if matches!(format, OutputFormat::Json) {
                    formatter.print_json(&serde_json::to_value(&tasks)?);
                } else if tasks.is_empty() {
                    formatter.info("No scheduled tasks");
                } else {
                    for t in tasks {
                        println!(
                            "{:>4} [{}] {:<20} {:?} -> {:<16} next: {}  failures: {}",
                            t.id,
                            if t.enabled { "on" } else { "off" },
                            t.name,
                            t.kind,
                            t.target_name,
                            t.next_run
                                .map(|n| n.to_rfc3339())
                                .unwrap_or_else(|| "-".to_string()),
                            t.consecutive_failures,
                        );
                    }
                }
            }
            ScheduleCommand::Remove { id } => {
                app.scheduler.remove_task(*id)?;
                formatter.success(&format!("Task {id} removed"));
            }
            ScheduleCommand::Enable { id, off } => {
                app.scheduler.set_task_enabled(*id, !off)?;
                formatter.success(&format!(
                    "Task {id} {}",
                    if *off { "disabled" } else { "enabled" }
                ));
            }
            ScheduleCommand::RunNow { id } => {
                app.scheduler.run_task_now(*id).await?;
                let task = app.scheduler.task(*id);
                formatter.success(&format!(
                    "Task {id} finished: {}",
                    task.map(|t| t.last_status).unwrap_or_default()
                ));
            }
            ScheduleCommand::SetInterval { seconds } => {
                app.scheduler.set_check_interval(*seconds);
                formatter.success(&format!(
                    "Check interval set to {:?}",
                    app.scheduler.check_interval()
                ));
            }
        }
        Ok(())
    }
}
