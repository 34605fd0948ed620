//! Types and subprocess plumbing for the external `bq` tool.
//!
//! All remote interaction goes through `bq ... --format=json`; this module
//! owns the JSON shapes (including BigQuery's string-encoded int64 fields)
//! and the [`CommandRunner`] seam that tests script instead of spawning.

use crate::error::RawFailure;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Serde adapter for BigQuery's string-encoded int64 fields
/// (`"creationTime": "1699999999999"`). Accepts a bare number too and
/// serializes back as a string so payloads round-trip.
mod int64_str {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        struct Int64Visitor;

        impl Visitor<'_> for Int64Visitor {
            type Value = i64;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer or a string-encoded integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
                v.parse().map_err(de::Error::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
                Ok(v)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
                i64::try_from(v).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(Int64Visitor)
    }
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// BigQuery table reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub dataset_id: String,
    #[serde(default)]
    pub table_id: String,
}

/// BigQuery table metadata as returned by `bq ls` / `bq show`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    #[serde(default)]
    pub table_id: String,
    #[serde(default)]
    pub table_reference: TableReference,
    /// TABLE, VIEW, or MATERIALIZED_VIEW.
    #[serde(rename = "type", default)]
    pub table_type: String,
    #[serde(default, with = "int64_str")]
    pub creation_time: i64,
    #[serde(default, with = "int64_str")]
    pub last_modified_time: i64,
    #[serde(default, with = "int64_str", skip_serializing_if = "is_zero")]
    pub num_rows: i64,
    #[serde(default, with = "int64_str", skip_serializing_if = "is_zero")]
    pub num_bytes: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub friendly_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// A field in a BigQuery schema, possibly nested.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    /// REQUIRED, NULLABLE, or REPEATED.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mode: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Nested fields for RECORD types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<SchemaField>,
}

/// A BigQuery table schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<SchemaField>,
}

/// Complete table metadata: `bq show` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableMetadata {
    #[serde(flatten)]
    pub info: TableInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Executes an external command and returns its stdout.
///
/// The single seam between the metadata client and the operating system;
/// tests provide a scripted implementation.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn output(&self, program: &str, args: &[String]) -> Result<Vec<u8>, RawFailure>;
}

/// Real runner over `tokio::process::Command`, capturing stdout and stderr.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn output(&self, program: &str, args: &[String]) -> Result<Vec<u8>, RawFailure> {
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                RawFailure::other(format!("failed to run {program}"), Some(Box::new(e)))
            })?;

        if !output.status.success() {
            return Err(RawFailure::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_info_parses_string_encoded_ints() {
        let json = r#"{
            "tableId": "events",
            "tableReference": {"projectId": "p", "datasetId": "d", "tableId": "events"},
            "type": "TABLE",
            "creationTime": "1700000000000",
            "lastModifiedTime": "1700000500000",
            "numRows": "1234",
            "numBytes": "56789"
        }"#;

        let info: TableInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.table_id, "events");
        assert_eq!(info.creation_time, 1_700_000_000_000);
        assert_eq!(info.num_rows, 1234);
        assert_eq!(info.num_bytes, 56789);
    }

    #[test]
    fn test_table_info_tolerates_missing_fields() {
        let json = r#"{"tableReference": {"tableId": "from_ref"}, "type": "VIEW"}"#;
        let info: TableInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.table_id, "");
        assert_eq!(info.table_reference.table_id, "from_ref");
        assert_eq!(info.num_rows, 0);
    }

    #[test]
    fn test_table_info_serializes_ints_as_strings() {
        let info = TableInfo {
            table_id: "t".to_string(),
            creation_time: 42,
            num_rows: 7,
            ..Default::default()
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["creationTime"], "42");
        assert_eq!(json["numRows"], "7");
        // Zero-valued optional counters are omitted.
        assert!(json.get("numBytes").is_none());
    }

    #[test]
    fn test_nested_schema_round_trip() {
        let json = r#"{
            "fields": [
                {"name": "id", "type": "INTEGER", "mode": "REQUIRED"},
                {"name": "payload", "type": "RECORD", "mode": "REPEATED", "fields": [
                    {"name": "kind", "type": "STRING"}
                ]}
            ]
        }"#;

        let schema: Schema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[1].fields[0].name, "kind");

        let back = serde_json::to_string(&schema).unwrap();
        let again: Schema = serde_json::from_str(&back).unwrap();
        assert_eq!(again.fields[1].mode, "REPEATED");
    }

    #[test]
    fn test_metadata_flattens_info() {
        let json = r#"{
            "tableId": "events",
            "type": "TABLE",
            "creationTime": "1",
            "lastModifiedTime": "2",
            "schema": {"fields": [{"name": "id", "type": "INTEGER"}]}
        }"#;

        let metadata: TableMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.info.table_id, "events");
        assert_eq!(metadata.schema.unwrap().fields.len(), 1);
    }
}
