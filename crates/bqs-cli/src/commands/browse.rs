//! `bqs browse` - interactive dataset browser with a static fallback.

use crate::tui;
use anyhow::{anyhow, Result};
use bqs_core::cache::SqliteCache;
use bqs_core::config::CacheTtl;
use bqs_core::format::{format_bytes, format_time, table_type_icon};
use bqs_core::validation::validate_target;
use bqs_core::Client;
use clap::Args;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  bqs browse my-project.analytics          # Browse analytics dataset (fast)
  bqs browse -d my-project.analytics       # Browse with detailed metadata (slower)
  bqs browse my-project.analytics.table    # Deep dive into specific table")]
pub struct BrowseArgs {
    /// Target as project.dataset or project.dataset.table
    pub target: String,

    /// Fetch detailed metadata (size, rows) for each table - slower but complete
    #[arg(short = 'd', long = "detailed")]
    pub detailed: bool,
}

pub async fn run(args: BrowseArgs) -> Result<()> {
    let target =
        validate_target(&args.target).map_err(|e| anyhow!(e.user_friendly_message()))?;

    let cache = SqliteCache::open_default(CacheTtl::DEFAULT)
        .map_err(|e| anyhow!("failed to initialize cache: {e}"))?;
    let client = Client::new(Arc::new(cache));

    match tui::run(
        client.clone(),
        target.project.clone(),
        target.dataset.clone(),
        target.table.clone(),
    )
    .await
    {
        Ok(()) => Ok(()),
        Err(err) => {
            // Not every terminal can host the browser; fall back to a
            // one-shot listing.
            debug!("interactive browser unavailable: {err}");
            static_browse(
                &client,
                &target.project,
                &target.dataset,
                target.table.as_deref(),
                args.detailed,
            )
            .await
        }
    }
}

async fn static_browse(
    client: &Client,
    project: &str,
    dataset: &str,
    table: Option<&str>,
    detailed: bool,
) -> Result<()> {
    let token = CancellationToken::new();

    if let Some(table) = table {
        let metadata = client
            .get_table_metadata(&token, project, dataset, table)
            .await
            .map_err(|e| anyhow!(e.user_friendly_message()))?;

        println!(
            "📊 {project}.{dataset}.{table} ({})",
            metadata.info.table_type
        );
        println!(
            "📈 {} rows • 💾 {} • 🕒 Modified {}\n",
            metadata.info.num_rows,
            format_bytes(metadata.info.num_bytes.max(0) as u64),
            format_time(metadata.info.last_modified_time)
        );

        if let Some(schema) = &metadata.schema {
            println!("🌲 Schema:");
            for field in &schema.fields {
                let mode = match field.mode.as_str() {
                    "REQUIRED" => " (REQUIRED)",
                    "REPEATED" => " (REPEATED)",
                    _ => "",
                };
                println!("  ├─ {} {}{}", field.name, field.field_type, mode);
            }
        }

        return Ok(());
    }

    let tables = client
        .list_tables(&token, project, dataset)
        .await
        .map_err(|e| anyhow!(e.user_friendly_message()))?;

    println!("📊 {project}.{dataset}\n");

    if tables.is_empty() {
        println!("No tables found in this dataset");
        return Ok(());
    }

    if detailed {
        println!("🔄 Fetching detailed metadata for each table...");
        println!(
            "{:<3} {:<35} {:<18} {:>12} {:>10}  {}",
            "", "Table", "Type", "Rows", "Size", "Modified"
        );
        for table in &tables {
            let icon = table_type_icon(&table.table_type);
            match client
                .get_table_metadata(&token, project, dataset, &table.table_id)
                .await
            {
                Ok(metadata) => {
                    println!(
                        "{:<3} {:<35} {:<18} {:>12} {:>10}  {}",
                        icon,
                        table.table_id,
                        table.table_type,
                        metadata.info.num_rows,
                        format_bytes(metadata.info.num_bytes.max(0) as u64),
                        format_time(metadata.info.last_modified_time)
                    );
                }
                Err(_) => {
                    println!(
                        "{:<3} {:<35} {:<18} {:>12} {:>10}  {}",
                        icon,
                        table.table_id,
                        table.table_type,
                        "Error",
                        "Error",
                        format_time(table.creation_time)
                    );
                }
            }
        }
    } else {
        println!("{:<3} {:<35} {:<18} {}", "", "Table", "Type", "Created");
        for table in &tables {
            println!(
                "{:<3} {:<35} {:<18} {}",
                table_type_icon(&table.table_type),
                table.table_id,
                table.table_type,
                format_time(table.creation_time)
            );
        }
    }

    Ok(())
}
