//! Search command

use anyhow::Result;
use clap::Args;

use megacustom_search::{SortField, SortOrder};

use crate::app::App;
use crate::output::{format_bytes, get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Query string, e.g. `report ext:pdf size:>10mb !draft`
    pub query: String,

    /// Sort key: relevance | name | size | modified | created | type | path
    #[arg(long, default_value = "relevance")]
    pub sort: String,

    /// Sort ascending instead of descending
    #[arg(long)]
    pub ascending: bool,

    /// Maximum results
    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// Rebuild the index before searching
    #[arg(long)]
    pub reindex: bool,
}

fn parse_sort(s: &str) -> Result<SortField> {
    Ok(match s.to_lowercase().as_str() {
        "relevance" => SortField::Relevance,
        "name" => SortField::Name,
        "size" => SortField::Size,
        "modified" | "mtime" => SortField::DateModified,
        "created" | "ctime" => SortField::DateCreated,
        "type" => SortField::Type,
        "path" => SortField::Path,
        other => anyhow::bail!("Unknown sort key '{other}'"),
    })
}

impl SearchCommand {
    pub async fn execute(&self, app: &App, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        if self.reindex || app.index.node_count() == 0 {
            app.build_index().await?;
            formatter.info(&format!(
                "Indexed {} nodes in {} ms",
                app.index.node_count(),
                app.index.last_build_time_ms()
            ));
        }

        let order = if self.ascending {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        };
        let hits = app
            .index
            .search_with_sort(&self.query, parse_sort(&self.sort)?, order, self.limit);

        if matches!(format, OutputFormat::Json) {
            let rows: Vec<serde_json::Value> = hits
                .iter()
                .map(|h| {
                    serde_json::json!({
                        "name": h.node.name,
                        "path": h.node.path,
                        "size": h.node.size,
                        "modified": h.node.mtime.to_rfc3339(),
                        "folder": h.node.is_folder(),
                        "relevance": h.relevance,
                    })
                })
                .collect();
            formatter.print_json(&serde_json::json!({
                "results": rows,
                "searchTimeMs": app.index.last_search_time_ms(),
            }));
        } else if hits.is_empty() {
            formatter.info("No results");
        } else {
            for hit in &hits {
                let kind = if hit.node.is_folder() { "d" } else { "-" };
                println!(
                    "{kind} {:>10}  {:<40} {}",
                    format_bytes(hit.node.size),
                    hit.node.name,
                    hit.node.path
                );
            }
            formatter.info(&format!(
                "{} results in {} ms",
                hits.len(),
                app.index.last_search_time_ms()
            ));
        }
        Ok(())
    }
}
