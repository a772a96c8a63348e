//! Bulk rename commands

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use megacustom_rename::RenamePattern;

use crate::app::App;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum RenameCommand {
    /// Preview a rename over files selected by a path glob
    Preview {
        /// Selection, e.g. `/photos/*.jpg`
        path_pattern: String,
        search: String,
        replace: String,
        #[arg(long)]
        recursive: bool,
    },
    /// Apply a rename over files selected by a path glob
    Apply {
        path_pattern: String,
        search: String,
        replace: String,
        #[arg(long)]
        recursive: bool,
        /// Resolve conflicts by appending a numeric suffix
        #[arg(long)]
        auto_resolve: bool,
    },
    /// Apply a named rule or template
    ApplyRule {
        rule: String,
        path_pattern: String,
        #[arg(long)]
        recursive: bool,
    },
    /// Undo the most recent rename operation
    Undo,
    /// Redo the most recently undone operation
    Redo,
    /// Show recent operations
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List available rules and templates
    Rules,
    /// Export custom rules to a JSON file
    ExportRules { path: PathBuf },
    /// Import custom rules from a JSON file
    ImportRules { path: PathBuf },
    /// Check a regex pattern
    Validate { pattern: String },
    /// Try a pattern against sample text
    Test {
        pattern: String,
        sample: String,
        replacement: String,
    },
}

impl RenameCommand {
    pub async fn execute(&self, app: &App, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        match self {
            RenameCommand::Preview {
                path_pattern,
                search,
                replace,
                recursive,
            } => {
                let pattern = RenamePattern::substitution(search, replace);
                let previews = app
                    .renamer
                    .preview_by_path(path_pattern, &pattern, *recursive)
                    .await?;
                if previews.is_empty() {
                    formatter.info("No matching files");
                }
                for p in &previews {
                    let marker = match &p.conflict {
                        Some(reason) => format!("! {reason}"),
                        None if p.original_name == p.proposed_name => "=".to_string(),
                        None => "+".to_string(),
                    };
                    println!("{:<34} -> {:<34} {marker}", p.original_name, p.proposed_name);
                }
            }
            RenameCommand::Apply {
                path_pattern,
                search,
                replace,
                recursive,
                auto_resolve,
            } => {
                let pattern = RenamePattern::substitution(search, replace);
                if *auto_resolve {
                    app.renamer.set_conflict_resolver(Some(Box::new(
                        |_original, proposed| {
                            megacustom_rename::pattern::generate_unique_name(
                                proposed,
                                &[proposed.to_string()],
                            )
                        },
                    )));
                }
                let previews = app
                    .renamer
                    .preview_by_path(path_pattern, &pattern, *recursive)
                    .await?;
                let results = app.renamer.apply(&previews, &pattern, false).await?;
                if *auto_resolve {
                    app.renamer.set_conflict_resolver(None);
                }

                let renamed = results.iter().filter(|r| r.success).count();
                let skipped = results.iter().filter(|r| r.skipped).count();
                formatter.success(&format!("Renamed {renamed}, skipped {skipped}"));
            }
            RenameCommand::ApplyRule {
                rule,
                path_pattern,
                recursive,
            } => {
                let pattern = app
                    .renamer
                    .rule(rule)
                    .ok_or_else(|| anyhow::anyhow!("Unknown rule '{rule}'"))?;
                let previews = app
                    .renamer
                    .preview_by_path(path_pattern, &pattern, *recursive)
                    .await?;
                let results = app.renamer.apply(&previews, &pattern, false).await?;
                let renamed = results.iter().filter(|r| r.success).count();
                formatter.success(&format!("Rule '{rule}' renamed {renamed} files"));
            }
            RenameCommand::Undo => {
                if app.renamer.undo().await? {
                    formatter.success("Undid last rename operation");
                } else {
                    formatter.warn("Nothing to undo");
                }
            }
            RenameCommand::Redo => {
                if app.renamer.redo().await? {
                    formatter.success("Redid rename operation");
                } else {
                    formatter.warn("Nothing to redo");
                }
            }
            RenameCommand::History { limit } => {
                let history = app.renamer.undo_history(*limit);
                if history.is_empty() {
                    formatter.info("No rename history");
                }
                for op in history {
                    println!(
                        "{}  {}  {} files",
                        op.op_id,
                        op.ts.to_rfc3339(),
                        op.results.len()
                    );
                }
            }
            RenameCommand::Rules => {
                for (name, description) in app.renamer.available_rules() {
                    println!("{name:<18} {description}");
                }
            }
            RenameCommand::ExportRules { path } => {
                app.renamer.export_rules(path)?;
                formatter.success(&format!("Rules exported to {}", path.display()));
            }
            RenameCommand::ImportRules { path } => {
                let count = app.renamer.import_rules(path)?;
                formatter.success(&format!("Imported {count} rules"));
            }
            RenameCommand::Validate { pattern } => {
                match megacustom_rename::pattern::validate_regex(pattern) {
                    Ok(()) => formatter.success("Pattern is valid"),
                    Err(e) => formatter.error(&format!("Invalid pattern: {e}")),
                }
            }
            RenameCommand::Test {
                pattern,
                sample,
                replacement,
            } => {
                println!(
                    "{}",
                    megacustom_rename::pattern::test_pattern(pattern, sample, replacement)
                );
            }
        }
        Ok(())
    }
}
