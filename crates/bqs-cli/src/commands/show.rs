//! `bqs show` - display table or view metadata.
//!
//! Streams `bq show` output directly with inherited stdio; the cached
//! path is the browser's concern.

use anyhow::{bail, Result};
use clap::Args;
use std::process::Command;

#[derive(Args, Debug)]
#[command(after_help = "\
Common usage:
  bqs show project.dataset.table              # Complete metadata (prettyjson)
  bqs show -s project.dataset.table           # Schema only
  bqs show -v project.dataset.view            # View with SQL definition
  bqs show -f json project.dataset.table      # Compact JSON format
  bqs show -p other-project dataset.table     # Cross-project access")]
pub struct ShowArgs {
    /// Target table as project.dataset.table
    pub table: String,

    /// Show only the schema
    #[arg(short = 's', long = "schema")]
    pub schema_only: bool,

    /// Show view-specific details including SQL definition
    #[arg(short = 'v', long = "view")]
    pub view_details: bool,

    /// Show materialized view details including refresh policies
    #[arg(long = "materialized-view")]
    pub materialized_view: bool,

    /// Output format: json, prettyjson, pretty, sparse, csv
    #[arg(short = 'f', long = "format", default_value = "prettyjson")]
    pub format: String,

    /// Override project ID for cross-project access
    #[arg(short = 'p', long = "project")]
    pub project: Option<String>,

    /// Suppress status updates
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

pub fn run(args: ShowArgs) -> Result<()> {
    let parts: Vec<&str> = args.table.split('.').collect();
    if parts.len() < 3 {
        bail!(
            "invalid table format: expected project.dataset.table, got {}",
            args.table
        );
    }

    let project = args.project.as_deref().unwrap_or(parts[0]);
    let dataset_table = parts[1..].join(".");

    let mut bq_args = vec!["show".to_string(), format!("--project_id={project}")];

    if args.schema_only {
        bq_args.push("--schema".to_string());
    }
    if args.view_details {
        bq_args.push("--view".to_string());
    }
    if args.materialized_view {
        bq_args.push("--materialized_view".to_string());
    }

    bq_args.push(format!("--format={}", args.format));

    if args.quiet {
        bq_args.push("--quiet".to_string());
    }

    bq_args.push(dataset_table);

    let status = Command::new("bq").args(&bq_args).status()?;
    if !status.success() {
        bail!("bq show exited with status {}", status.code().unwrap_or(-1));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_short_target() {
        let args = ShowArgs {
            table: "dataset.table".to_string(),
            schema_only: false,
            view_details: false,
            materialized_view: false,
            format: "prettyjson".to_string(),
            project: None,
            quiet: false,
        };
        assert!(run(args).is_err());
    }
}
