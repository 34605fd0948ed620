//! Input validation for BigQuery identifiers.

use crate::error::BqsError;
use regex::Regex;
use std::sync::LazyLock;

static PROJECT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9\-]*[a-z0-9]$").unwrap());
static DATASET_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap());
static TABLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap());

/// A parsed `project.dataset[.table]` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub project: String,
    pub dataset: String,
    pub table: Option<String>,
}

/// Parse and validate a `project.dataset[.table]` identifier.
pub fn validate_target(input: &str) -> Result<Target, BqsError> {
    let parts: Vec<&str> = input.split('.').collect();

    if parts.len() < 2 {
        return Err(BqsError::validation(
            input,
            format!("invalid format: expected project.dataset or project.dataset.table, got {input}"),
        ));
    }
    if parts.len() > 3 {
        return Err(BqsError::validation(
            input,
            format!("invalid format: too many parts in {input}"),
        ));
    }

    validate_project(parts[0]).map_err(|detail| BqsError::validation(input, detail))?;
    validate_dataset(parts[1]).map_err(|detail| BqsError::validation(input, detail))?;

    let table = match parts.get(2) {
        Some(table) => {
            validate_table(table).map_err(|detail| BqsError::validation(input, detail))?;
            Some((*table).to_string())
        }
        None => None,
    };

    Ok(Target {
        project: parts[0].to_string(),
        dataset: parts[1].to_string(),
        table,
    })
}

/// Validate a BigQuery project ID.
pub fn validate_project(project: &str) -> Result<(), String> {
    if project.is_empty() {
        return Err("project cannot be empty".to_string());
    }
    if project.len() < 6 || project.len() > 30 {
        return Err(format!(
            "project length must be 6-30 characters, got {}",
            project.len()
        ));
    }
    if !PROJECT_PATTERN.is_match(project) {
        return Err(
            "project must start with lowercase letter, contain only lowercase letters, \
             numbers, and hyphens, and end with letter or number"
                .to_string(),
        );
    }
    Ok(())
}

/// Validate a BigQuery dataset ID.
pub fn validate_dataset(dataset: &str) -> Result<(), String> {
    if dataset.is_empty() {
        return Err("dataset cannot be empty".to_string());
    }
    if dataset.len() > 1024 {
        return Err(format!(
            "dataset length cannot exceed 1024 characters, got {}",
            dataset.len()
        ));
    }
    if !DATASET_PATTERN.is_match(dataset) {
        return Err(
            "dataset must start with letter or underscore, contain only letters, numbers, \
             and underscores"
                .to_string(),
        );
    }
    Ok(())
}

/// Validate a BigQuery table ID.
pub fn validate_table(table: &str) -> Result<(), String> {
    if table.is_empty() {
        return Err("table cannot be empty".to_string());
    }
    if table.len() > 1024 {
        return Err(format!(
            "table length cannot exceed 1024 characters, got {}",
            table.len()
        ));
    }
    if !TABLE_PATTERN.is_match(table) {
        return Err(
            "table must start with letter or underscore, contain only letters, numbers, \
             and underscores"
                .to_string(),
        );
    }
    Ok(())
}
