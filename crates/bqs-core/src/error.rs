//! Error types for bqs.
//!
//! All failures that cross the subprocess or cache boundary are classified
//! into a [`BqsError`] carrying a taxonomy kind, retryability, and a
//! suggested backoff. Callers dispatch on [`ErrorKind`], never on the
//! concrete type of an underlying error.

use std::fmt;
use std::time::Duration;

/// Categories of classified errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connectivity or timeout problems reaching BigQuery.
    Network,
    /// Missing or stale credentials.
    Auth,
    /// The caller lacks access to the resource.
    Permission,
    /// The dataset or table does not exist.
    NotFound,
    /// Quota or rate-limit exhaustion.
    Quota,
    /// The external `bq` command exited non-zero for another reason.
    ToolFailure,
    /// A local cache operation failed.
    Cache,
    /// User input failed validation.
    Validation,
    /// Anything that did not match a known pattern.
    Unknown,
}

/// A classified error with context and retry information.
#[derive(Debug)]
pub struct BqsError {
    pub kind: ErrorKind,
    /// Human-readable message, already cleaned of tool noise.
    pub message: String,
    pub retryable: bool,
    /// Explicit backoff hint from classification, if any.
    pub retry_after: Option<Duration>,
    /// Auxiliary fields (operation, project, dataset, table) in insertion order.
    pub context: Vec<(&'static str, String)>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BqsError {
    /// Whether this error can be retried.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// The duration to wait before retrying.
    ///
    /// Falls back to a kind-dependent default when classification did not
    /// set an explicit backoff.
    pub fn retry_after(&self) -> Duration {
        if let Some(after) = self.retry_after {
            if after > Duration::ZERO {
                return after;
            }
        }
        match self.kind {
            ErrorKind::Network => Duration::from_secs(2),
            ErrorKind::Quota => Duration::from_secs(30),
            ErrorKind::ToolFailure => Duration::from_secs(5),
            _ => Duration::from_secs(1),
        }
    }

    /// A message suitable for direct display to the user.
    pub fn user_friendly_message(&self) -> String {
        match self.kind {
            ErrorKind::NotFound => {
                format!("{} - verify the project, dataset, and table names", self.message)
            }
            ErrorKind::Permission => {
                format!("{} - contact your BigQuery administrator", self.message)
            }
            ErrorKind::Quota => format!("{} - try again in a few moments", self.message),
            ErrorKind::Network => format!("{} - check your internet connection", self.message),
            ErrorKind::Validation => {
                format!("{} - use format: project.dataset[.table]", self.message)
            }
            _ => self.message.clone(),
        }
    }

    /// Wrap a cache-layer failure. Never retryable.
    pub fn cache(operation: &str, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            kind: ErrorKind::Cache,
            message: format!("Cache {operation} failed: {err}"),
            retryable: false,
            retry_after: None,
            context: vec![("operation", operation.to_string())],
            source: Some(Box::new(err)),
        }
    }

    /// Wrap an input-validation failure. Never retryable.
    pub fn validation(input: &str, detail: impl fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: format!("Invalid input '{input}': {detail}"),
            retryable: false,
            retry_after: None,
            context: vec![("input", input.to_string())],
            source: None,
        }
    }

    /// The error returned when a caller's cancellation signal fires during
    /// a retry wait.
    pub fn cancelled() -> Self {
        Self {
            kind: ErrorKind::Unknown,
            message: "operation cancelled".to_string(),
            retryable: false,
            retry_after: None,
            context: Vec::new(),
            source: None,
        }
    }
}

impl fmt::Display for BqsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.context.is_empty() {
            return write!(f, "{}", self.message);
        }
        let parts: Vec<String> = self
            .context
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        write!(f, "{} ({})", self.message, parts.join(", "))
    }
}

impl std::error::Error for BqsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias for classified operations.
pub type Result<T> = std::result::Result<T, BqsError>;

/// A raw failure from invoking the external tool, before classification.
#[derive(Debug)]
pub enum RawFailure {
    /// The command exited non-zero; stderr was captured.
    Exit { code: Option<i32>, stderr: String },
    /// Any other failure (spawn error, unparseable output, plain text).
    Other {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RawFailure {
    pub fn other(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        RawFailure::Other {
            message: message.into(),
            source,
        }
    }

    /// The text the classifier matches against. For exit failures this
    /// includes the captured stderr.
    fn text(&self) -> String {
        match self {
            RawFailure::Exit { code, stderr } => match code {
                Some(code) => format!("exit status {code}: {stderr}"),
                None => format!("terminated by signal: {stderr}"),
            },
            RawFailure::Other { message, source } => match source {
                Some(source) => format!("{message}: {source}"),
                None => message.clone(),
            },
        }
    }

    fn into_source(self) -> Option<Box<dyn std::error::Error + Send + Sync>> {
        match self {
            RawFailure::Exit { .. } => None,
            RawFailure::Other { source, .. } => source,
        }
    }
}

impl fmt::Display for RawFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Classify a raw `bq` failure into a [`BqsError`].
///
/// Matching is ordered and case-insensitive; the first pattern wins. For
/// exit failures the captured stderr is part of the matched text, so a
/// "permission denied" on stderr classifies as `Permission` before the
/// generic exit-error branch is reached.
pub fn classify_bq_failure(
    raw: RawFailure,
    operation: &str,
    project: &str,
    dataset: &str,
    table: Option<&str>,
) -> BqsError {
    let mut context = vec![
        ("operation", operation.to_string()),
        ("project", project.to_string()),
        ("dataset", dataset.to_string()),
    ];
    if let Some(table) = table {
        context.push(("table", table.to_string()));
    }

    let text = raw.text();
    let lower = text.to_lowercase();

    let classified = |kind, message: String, retryable, retry_after, raw: RawFailure| BqsError {
        kind,
        message,
        retryable,
        retry_after,
        context: context.clone(),
        source: raw.into_source(),
    };

    if lower.contains("not found") {
        return classified(
            ErrorKind::NotFound,
            not_found_message(operation, project, dataset, table),
            false,
            None,
            raw,
        );
    }

    if lower.contains("permission denied") || lower.contains("access denied") {
        return classified(
            ErrorKind::Permission,
            format!("Access denied to {project}.{dataset} - check BigQuery permissions"),
            false,
            None,
            raw,
        );
    }

    if lower.contains("authentication") || lower.contains("credentials") {
        return classified(
            ErrorKind::Auth,
            "Authentication failed - run 'gcloud auth login' or check service account credentials"
                .to_string(),
            false,
            None,
            raw,
        );
    }

    if lower.contains("quota") || lower.contains("rate limit") {
        return classified(
            ErrorKind::Quota,
            "BigQuery quota exceeded - retrying with backoff".to_string(),
            true,
            Some(Duration::from_secs(30)),
            raw,
        );
    }

    if lower.contains("timeout") || lower.contains("deadline") {
        return classified(
            ErrorKind::Network,
            "BigQuery request timed out - retrying".to_string(),
            true,
            Some(Duration::from_secs(5)),
            raw,
        );
    }

    if lower.contains("connection") || lower.contains("network") {
        return classified(
            ErrorKind::Network,
            "Network error connecting to BigQuery - retrying".to_string(),
            true,
            Some(Duration::from_secs(2)),
            raw,
        );
    }

    if let RawFailure::Exit { ref stderr, .. } = raw {
        // A not-found surfaced through a non-zero exit takes the same
        // outcome as the text match above; both entry points are kept
        // because the tool's exit-status behavior for it is not pinned.
        if stderr.to_lowercase().contains("not found") {
            return classified(
                ErrorKind::NotFound,
                not_found_message(operation, project, dataset, table),
                false,
                None,
                raw,
            );
        }

        let cleaned = clean_error_output(stderr);
        return classified(
            ErrorKind::ToolFailure,
            format!("BigQuery command failed: {cleaned}"),
            true,
            None,
            raw,
        );
    }

    classified(
        ErrorKind::Unknown,
        format!("BigQuery operation failed: {}", clean_error_output(&text)),
        true,
        None,
        raw,
    )
}

/// Operation-specific message for a missing dataset or table.
fn not_found_message(operation: &str, project: &str, dataset: &str, table: Option<&str>) -> String {
    match operation {
        "list_tables" => format!("Dataset {project}.{dataset} not found or empty"),
        "get_metadata" | "get_schema" => match table {
            Some(table) => format!("Table {project}.{dataset}.{table} not found"),
            None => format!("Dataset {project}.{dataset} not found"),
        },
        _ => match table {
            Some(table) => format!("Table {project}.{dataset}.{table} not found"),
            None => format!("Dataset {project}.{dataset} not found"),
        },
    }
}

/// Strip tool noise from an error message: drops an `ERROR: ` prefix,
/// blank lines, and `WARNING`-prefixed lines, returning the first line
/// that survives.
fn clean_error_output(text: &str) -> String {
    let cleaned = text.trim();
    let cleaned = cleaned.strip_prefix("ERROR: ").unwrap_or(cleaned);

    cleaned
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("WARNING"))
        .map(str::to_string)
        .unwrap_or_else(|| cleaned.to_string())
}
