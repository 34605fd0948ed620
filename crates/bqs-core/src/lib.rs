//! bqs core - cached BigQuery metadata access through the `bq` CLI.
//!
//! This crate provides the library layer behind the `bqs` binary: a
//! persistent TTL cache for table lists, schemas, and full table metadata,
//! an error classifier for `bq` failures, a cancellable retry executor,
//! and the [`Client`] facade tying them together.
//!
//! # Example
//!
//! ```rust,ignore
//! use bqs_core::{cache::SqliteCache, config::CacheTtl, Client};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bqs_core::BqsError> {
//!     let cache = Arc::new(SqliteCache::open_default(CacheTtl::DEFAULT).unwrap());
//!     let client = Client::new(cache);
//!
//!     let token = CancellationToken::new();
//!     let tables = client.list_tables(&token, "my-project", "analytics").await?;
//!     println!("{} tables", tables.len());
//!     Ok(())
//! }
//! ```

pub mod bq;
pub mod cache;
pub mod client;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod format;
pub mod retry;
pub mod validation;

// Re-export commonly used types
pub use bq::{CommandRunner, Schema, SchemaField, SystemRunner, TableInfo, TableMetadata};
pub use cache::{CacheEntry, CacheStats, CacheStore, MemoryCache, SqliteCache};
pub use client::Client;
pub use error::{classify_bq_failure, BqsError, ErrorKind, RawFailure};
pub use retry::{RetryConfig, RetryableOperation};
pub use validation::{validate_target, Target};
