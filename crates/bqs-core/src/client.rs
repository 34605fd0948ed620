//! Cached BigQuery metadata client.
//!
//! Stateless orchestrator over a [`CacheStore`] and a [`CommandRunner`]:
//! check the cache, on miss run a retry-wrapped classified fetch, write the
//! result back with a type-specific TTL. Raw subprocess errors never leave
//! this module.

use crate::bq::{CommandRunner, Schema, SchemaField, SystemRunner, TableInfo, TableMetadata};
use crate::cache::{self, CacheStore};
use crate::config::{BqConfig, CacheTtl};
use crate::error::{classify_bq_failure, BqsError, RawFailure};
use crate::retry::{self, RetryConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// BigQuery metadata operations with caching and retry.
#[derive(Clone)]
pub struct Client {
    cache: Arc<dyn CacheStore>,
    runner: Arc<dyn CommandRunner>,
}

impl Client {
    /// Create a client over the given cache store, invoking the real `bq`
    /// binary.
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self::with_runner(cache, Arc::new(SystemRunner))
    }

    /// Create a client with an explicit command runner (tests).
    pub fn with_runner(cache: Arc<dyn CacheStore>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { cache, runner }
    }

    /// List tables in a dataset.
    ///
    /// Interactive path: uses the quick retry policy and a 5 minute TTL.
    pub async fn list_tables(
        &self,
        token: &CancellationToken,
        project: &str,
        dataset: &str,
    ) -> Result<Vec<TableInfo>, BqsError> {
        let key = cache::table_list_key(project, dataset);
        if let Some(tables) = self.cached(&key) {
            return Ok(tables);
        }

        let tables = retry::with_retry(token, &RetryConfig::quick(), || async move {
            self.fetch_table_list(project, dataset)
                .await
                .map_err(|raw| classify_bq_failure(raw, "list_tables", project, dataset, None))
        })
        .await?;

        self.store(&key, &tables, CacheTtl::TABLE_LIST, "table list");
        Ok(tables)
    }

    /// Get a table's schema. Standard retry policy, 30 minute TTL.
    pub async fn get_schema(
        &self,
        token: &CancellationToken,
        project: &str,
        dataset: &str,
        table: &str,
    ) -> Result<Schema, BqsError> {
        let key = cache::schema_key(project, dataset, table);
        if let Some(schema) = self.cached(&key) {
            return Ok(schema);
        }

        let schema = retry::with_retry(token, &RetryConfig::standard(), || async move {
            self.fetch_schema(project, dataset, table)
                .await
                .map_err(|raw| {
                    classify_bq_failure(raw, "get_schema", project, dataset, Some(table))
                })
        })
        .await?;

        self.store(&key, &schema, CacheTtl::SCHEMA, "schema");
        Ok(schema)
    }

    /// Get complete table metadata. Standard retry policy, 15 minute TTL.
    pub async fn get_table_metadata(
        &self,
        token: &CancellationToken,
        project: &str,
        dataset: &str,
        table: &str,
    ) -> Result<TableMetadata, BqsError> {
        let key = cache::metadata_key(project, dataset, table);
        if let Some(metadata) = self.cached(&key) {
            return Ok(metadata);
        }

        let metadata = retry::with_retry(token, &RetryConfig::standard(), || async move {
            self.fetch_table_metadata(project, dataset, table)
                .await
                .map_err(|raw| {
                    classify_bq_failure(raw, "get_metadata", project, dataset, Some(table))
                })
        })
        .await?;

        self.store(&key, &metadata, CacheTtl::METADATA, "metadata");
        Ok(metadata)
    }

    /// Whether full metadata for the table is already cached.
    ///
    /// A cheap existence probe for decorating lists; store errors count as
    /// not cached.
    pub fn is_table_metadata_cached(&self, project: &str, dataset: &str, table: &str) -> bool {
        let key = cache::metadata_key(project, dataset, table);
        self.cache.exists(&key).unwrap_or(false)
    }

    /// Remove cached entries for a table and/or its dataset's table list.
    pub fn invalidate_cache(
        &self,
        project: &str,
        dataset: &str,
        table: Option<&str>,
    ) -> Result<(), BqsError> {
        let mut keys = Vec::new();

        if let Some(table) = table {
            keys.push(cache::schema_key(project, dataset, table));
            keys.push(cache::metadata_key(project, dataset, table));
        }
        if !dataset.is_empty() {
            keys.push(cache::table_list_key(project, dataset));
        }

        for key in keys {
            self.cache
                .delete(&key)
                .map_err(|e| BqsError::cache(&format!("invalidate {key}"), e))?;
        }

        Ok(())
    }

    /// A cache hit whose payload deserializes; corrupt or missing payloads
    /// are silent misses.
    fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.cache.get(key).ok().flatten()?;
        serde_json::from_str(&entry.data).ok()
    }

    /// Cache writes are a performance optimization: failures warn and the
    /// fresh result is still returned.
    fn store<T: Serialize>(&self, key: &str, value: &T, ttl: Duration, what: &str) {
        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                warn!(
                    "{}",
                    BqsError::cache(&format!("serialize {what}"), e).user_friendly_message()
                );
                return;
            }
        };

        if let Err(e) = self.cache.set(key, &data, Some(ttl), None) {
            warn!(
                "{}",
                BqsError::cache(&format!("set {what} cache"), e).user_friendly_message()
            );
        }
    }

    async fn fetch_table_list(
        &self,
        project: &str,
        dataset: &str,
    ) -> Result<Vec<TableInfo>, RawFailure> {
        let args = vec![
            "ls".to_string(),
            format!("--project_id={project}"),
            "--format=json".to_string(),
            format!("--max_results={}", BqConfig::MAX_LIST_RESULTS),
            dataset.to_string(),
        ];
        let output = self.runner.output(BqConfig::PROGRAM, &args).await?;

        let mut tables: Vec<TableInfo> = serde_json::from_slice(&output)
            .map_err(|e| RawFailure::other("failed to parse table list", Some(Box::new(e))))?;

        // bq ls sometimes leaves the top-level tableId empty.
        for table in &mut tables {
            if table.table_id.is_empty() && !table.table_reference.table_id.is_empty() {
                table.table_id = table.table_reference.table_id.clone();
            }
        }

        Ok(tables)
    }

    async fn fetch_schema(
        &self,
        project: &str,
        dataset: &str,
        table: &str,
    ) -> Result<Schema, RawFailure> {
        let args = vec![
            "show".to_string(),
            format!("--project_id={project}"),
            "--schema".to_string(),
            "--format=json".to_string(),
            format!("{dataset}.{table}"),
        ];
        let output = self.runner.output(BqConfig::PROGRAM, &args).await?;

        let fields: Vec<SchemaField> = serde_json::from_slice(&output)
            .map_err(|e| RawFailure::other("failed to parse schema", Some(Box::new(e))))?;

        Ok(Schema { fields })
    }

    async fn fetch_table_metadata(
        &self,
        project: &str,
        dataset: &str,
        table: &str,
    ) -> Result<TableMetadata, RawFailure> {
        let args = vec![
            "show".to_string(),
            format!("--project_id={project}"),
            "--format=json".to_string(),
            format!("{dataset}.{table}"),
        ];
        let output = self.runner.output(BqConfig::PROGRAM, &args).await?;

        serde_json::from_slice(&output)
            .map_err(|e| RawFailure::other("failed to parse table metadata", Some(Box::new(e))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted runner: pops canned responses in order and counts calls.
    struct ScriptedRunner {
        responses: Mutex<Vec<Result<Vec<u8>, RawFailure>>>,
        calls: AtomicU32,
        last_args: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(responses: Vec<Result<Vec<u8>, RawFailure>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicU32::new(0),
                last_args: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn output(&self, _program: &str, args: &[String]) -> Result<Vec<u8>, RawFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_args.lock().unwrap() = args.to_vec();
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("scripted runner exhausted");
            }
            responses.remove(0)
        }
    }

    fn test_client(responses: Vec<Result<Vec<u8>, RawFailure>>) -> (Client, Arc<ScriptedRunner>) {
        let cache = Arc::new(MemoryCache::new(CacheTtl::DEFAULT));
        let runner = Arc::new(ScriptedRunner::new(responses));
        (Client::with_runner(cache, runner.clone()), runner)
    }

    const METADATA_JSON: &str = r#"{
        "tableId": "events",
        "type": "TABLE",
        "creationTime": "1700000000000",
        "lastModifiedTime": "1700000500000",
        "numRows": "10",
        "numBytes": "1024",
        "schema": {"fields": [{"name": "id", "type": "INTEGER", "mode": "REQUIRED"}]}
    }"#;

    const TABLE_LIST_JSON: &str = r#"[
        {"tableReference": {"projectId": "p", "datasetId": "d", "tableId": "events"},
         "type": "TABLE", "creationTime": "1700000000000", "lastModifiedTime": "1700000000000"},
        {"tableId": "users", "type": "VIEW",
         "creationTime": "1700000000000", "lastModifiedTime": "1700000000000"}
    ]"#;

    #[tokio::test]
    async fn test_metadata_cache_then_fetch() {
        let (client, runner) = test_client(vec![Ok(METADATA_JSON.as_bytes().to_vec())]);
        let token = CancellationToken::new();

        assert!(!client.is_table_metadata_cached("p", "d", "events"));

        // First call: exactly one external fetch and one cache write.
        let metadata = client
            .get_table_metadata(&token, "p", "d", "events")
            .await
            .unwrap();
        assert_eq!(metadata.info.table_id, "events");
        assert_eq!(runner.calls(), 1);
        assert!(client.is_table_metadata_cached("p", "d", "events"));

        // Second call within TTL: served from cache, zero external fetches.
        let metadata = client
            .get_table_metadata(&token, "p", "d", "events")
            .await
            .unwrap();
        assert_eq!(metadata.info.num_rows, 10);
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test]
    async fn test_list_tables_backfills_table_id() {
        let (client, runner) = test_client(vec![Ok(TABLE_LIST_JSON.as_bytes().to_vec())]);
        let token = CancellationToken::new();

        let tables = client.list_tables(&token, "p", "d").await.unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].table_id, "events");
        assert_eq!(tables[1].table_id, "users");

        let args = runner.last_args.lock().unwrap().clone();
        assert_eq!(
            args,
            vec![
                "ls",
                "--project_id=p",
                "--format=json",
                "--max_results=1000",
                "d"
            ]
        );
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_falls_through_to_fetch() {
        let cache = Arc::new(MemoryCache::new(CacheTtl::DEFAULT));
        cache
            .set(&cache::metadata_key("p", "d", "events"), "not json", None, None)
            .unwrap();

        let runner = Arc::new(ScriptedRunner::new(vec![Ok(METADATA_JSON
            .as_bytes()
            .to_vec())]));
        let client = Client::with_runner(cache.clone(), runner.clone());
        let token = CancellationToken::new();

        let metadata = client
            .get_table_metadata(&token, "p", "d", "events")
            .await
            .unwrap();
        assert_eq!(metadata.info.table_id, "events");
        assert_eq!(runner.calls(), 1);

        // The corrupt payload was overwritten by the fresh result.
        let entry = cache
            .get(&cache::metadata_key("p", "d", "events"))
            .unwrap()
            .unwrap();
        assert!(serde_json::from_str::<TableMetadata>(&entry.data).is_ok());
    }

    #[tokio::test]
    async fn test_not_found_surfaces_classified_without_retry() {
        let (client, runner) = test_client(vec![Err(RawFailure::Exit {
            code: Some(1),
            stderr: "BigQuery error: Not found: Dataset p:d\n".to_string(),
        })]);
        let token = CancellationToken::new();

        let err = client.list_tables(&token, "p", "d").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.message, "Dataset p.d not found or empty");
        // Non-retryable: exactly one invocation despite the retry wrapper.
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test]
    async fn test_schema_fetch_and_cache_key() {
        let schema_json = r#"[{"name": "id", "type": "INTEGER", "mode": "REQUIRED"}]"#;
        let cache = Arc::new(MemoryCache::new(CacheTtl::DEFAULT));
        let runner = Arc::new(ScriptedRunner::new(vec![Ok(schema_json
            .as_bytes()
            .to_vec())]));
        let client = Client::with_runner(cache.clone(), runner.clone());
        let token = CancellationToken::new();

        let schema = client
            .get_schema(&token, "p", "d", "events")
            .await
            .unwrap();
        assert_eq!(schema.fields.len(), 1);

        let args = runner.last_args.lock().unwrap().clone();
        assert_eq!(
            args,
            vec![
                "show",
                "--project_id=p",
                "--schema",
                "--format=json",
                "d.events"
            ]
        );

        assert!(cache
            .exists(&cache::schema_key("p", "d", "events"))
            .unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_cache_scopes() {
        let cache = Arc::new(MemoryCache::new(CacheTtl::DEFAULT));
        cache.set(&cache::table_list_key("p", "d"), "[]", None, None).unwrap();
        cache
            .set(&cache::schema_key("p", "d", "t"), "{}", None, None)
            .unwrap();
        cache
            .set(&cache::metadata_key("p", "d", "t"), "{}", None, None)
            .unwrap();
        cache
            .set(&cache::metadata_key("p", "d", "other"), "{}", None, None)
            .unwrap();

        let client = Client::with_runner(cache.clone(), Arc::new(ScriptedRunner::new(vec![])));

        // Table given: schema + metadata + table list go; unrelated keys stay.
        client.invalidate_cache("p", "d", Some("t")).unwrap();
        assert!(!cache.exists(&cache::schema_key("p", "d", "t")).unwrap());
        assert!(!cache.exists(&cache::metadata_key("p", "d", "t")).unwrap());
        assert!(!cache.exists(&cache::table_list_key("p", "d")).unwrap());
        assert!(cache
            .exists(&cache::metadata_key("p", "d", "other"))
            .unwrap());

        // Dataset only: just the table list key.
        cache.set(&cache::table_list_key("p", "d"), "[]", None, None).unwrap();
        client.invalidate_cache("p", "d", None).unwrap();
        assert!(!cache.exists(&cache::table_list_key("p", "d")).unwrap());
        assert!(cache
            .exists(&cache::metadata_key("p", "d", "other"))
            .unwrap());
    }

    #[tokio::test]
    async fn test_retryable_failure_then_success() {
        let (client, runner) = test_client(vec![
            Err(RawFailure::other("connection reset by peer", None)),
            Ok(METADATA_JSON.as_bytes().to_vec()),
        ]);
        let token = CancellationToken::new();

        // Network errors carry a 2s classified backoff; run under a paused
        // clock so the wait is instant.
        tokio::time::pause();
        let result = client.get_table_metadata(&token, "p", "d", "events").await;
        tokio::time::resume();

        let metadata = result.unwrap();
        assert_eq!(metadata.info.table_id, "events");
        assert_eq!(runner.calls(), 2);
    }
}
