//! Tests for the io module

use super::query::{duckdb_value_to_json, secret_sql};
use super::*;
use crate::error::{Error, QueryErrorKind};
use crate::types::JsonValue;
use duckdb::types::{TimeUnit, Value};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::cell::Cell;
use std::time::Duration;
use tempfile::tempdir;
use test_case::test_case;

fn no_wait(attempts: u32) -> QueryRetryPolicy {
    QueryRetryPolicy {
        attempts,
        wait: Duration::ZERO,
    }
}

// ============================================================================
// Object Storage Tests
// ============================================================================

#[tokio::test]
async fn test_write_then_read() {
    let storage = ObjectStorage::in_memory();
    let body = bytes::Bytes::from_static(b"site_id,value\nALIC1,1.5\n");

    storage
        .write("raw-data", "cosmos/2024-01-01.csv", body.clone(), None)
        .await
        .unwrap();

    let read = storage.read("raw-data", "cosmos/2024-01-01.csv").await.unwrap();
    assert_eq!(read, body);
}

#[tokio::test]
async fn test_write_with_tags() {
    let storage = ObjectStorage::in_memory();
    let tags = Tags::from([
        ("project".to_string(), "fdri".to_string()),
        ("stage".to_string(), "raw".to_string()),
    ]);

    storage
        .write("raw-data", "tagged.bin", bytes::Bytes::from_static(b"\x00\x01"), Some(&tags))
        .await
        .unwrap();

    let read = storage.read("raw-data", "tagged.bin").await.unwrap();
    assert_eq!(read.as_ref(), b"\x00\x01");
}

#[tokio::test]
async fn test_overwrite_replaces_object() {
    let storage = ObjectStorage::in_memory();

    storage
        .write("b", "k", bytes::Bytes::from_static(b"first"), None)
        .await
        .unwrap();
    storage
        .write("b", "k", bytes::Bytes::from_static(b"second"), None)
        .await
        .unwrap();

    assert_eq!(storage.read("b", "k").await.unwrap().as_ref(), b"second");
}

#[tokio::test]
async fn test_read_missing_object() {
    let storage = ObjectStorage::in_memory();

    let err = storage.read("raw-data", "missing.csv").await.unwrap_err();

    assert!(
        matches!(err, Error::ObjectNotFound { ref bucket, ref key } if bucket == "raw-data" && key == "missing.csv")
    );
}

#[tokio::test]
async fn test_buckets_are_isolated() {
    let storage = ObjectStorage::in_memory();

    storage
        .write("bucket-a", "key", bytes::Bytes::from_static(b"a"), None)
        .await
        .unwrap();

    assert!(storage.read("bucket-b", "key").await.is_err());
    assert!(storage.read("bucket-a", "key").await.is_ok());
}

#[tokio::test]
async fn test_storage_clones_share_stores() {
    let storage = ObjectStorage::in_memory();
    let clone = storage.clone();

    storage
        .write("b", "k", bytes::Bytes::from_static(b"shared"), None)
        .await
        .unwrap();

    assert_eq!(clone.read("b", "k").await.unwrap().as_ref(), b"shared");
}

#[test]
fn test_tag_set_encoding() {
    let tags = Tags::from([
        ("stage".to_string(), "raw".to_string()),
        ("project".to_string(), "fdri".to_string()),
    ]);

    assert_eq!(tag_set(&tags).encoded(), "project=fdri&stage=raw");
    assert_eq!(tag_set(&Tags::new()).encoded(), "");
}

#[test]
fn test_s3_provider_with_endpoint() {
    let provider = S3StoreProvider::with_endpoint("http://localhost:4566");
    let first = provider.store("my-bucket").unwrap();
    let second = provider.store("my-bucket").unwrap();

    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

// ============================================================================
// Query Reader Tests
// ============================================================================

#[test]
fn test_read_rows_as_json() {
    let reader = DuckDbReader::new().unwrap();

    let rows = reader
        .read(
            "SELECT 1 AS id, 'ALIC1' AS site, 2.5::DOUBLE AS value UNION ALL SELECT 2, 'BUNNY', NULL ORDER BY id",
            &[],
        )
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(JsonValue::Object(rows[0].clone()), json!({"id": 1, "site": "ALIC1", "value": 2.5}));
    assert_eq!(rows[1]["site"], "BUNNY");
    assert_eq!(rows[1]["value"], JsonValue::Null);
}

#[test]
fn test_read_with_params() {
    let reader = DuckDbReader::new().unwrap();
    reader
        .execute_batch(
            "CREATE TABLE obs (site VARCHAR, value DOUBLE);
             INSERT INTO obs VALUES ('ALIC1', 1.0), ('BUNNY', 2.0), ('ALIC1', 3.0);",
        )
        .unwrap();

    let rows = reader
        .read(
            "SELECT sum(value) AS total FROM obs WHERE site = ?",
            &[Value::Text("ALIC1".to_string())],
        )
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["total"], 4.0);
}

#[test]
fn test_read_file_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("obs.csv");
    std::fs::write(&path, "site,value\nALIC1,1\nBUNNY,2\n").unwrap();

    let reader = DuckDbReader::new().unwrap();
    let rows = reader
        .read(
            &format!("SELECT site FROM read_csv_auto('{}') ORDER BY value", path.display()),
            &[],
        )
        .unwrap();

    let sites: Vec<_> = rows.iter().map(|r| r["site"].clone()).collect();
    assert_eq!(sites, vec![json!("ALIC1"), json!("BUNNY")]);
}

#[test]
fn test_read_missing_file_is_io_error() {
    let reader = DuckDbReader::new().unwrap().with_retry(no_wait(3));

    let err = reader
        .read("SELECT * FROM read_csv_auto('/nonexistent/driutils/obs.csv')", &[])
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Query {
            kind: QueryErrorKind::Io,
            ..
        }
    ));
}

#[test]
fn test_read_invalid_input_after_retries() {
    let reader = DuckDbReader::new().unwrap().with_retry(no_wait(2));

    let err = reader.read("SELECT error('corrupt row')", &[]).unwrap_err();

    assert!(matches!(
        err,
        Error::Query {
            kind: QueryErrorKind::InvalidInput,
            ..
        }
    ));
}

#[test]
fn test_read_arrow() {
    let reader = DuckDbReader::new().unwrap();

    let batches = reader
        .read_arrow("SELECT * FROM range(10) t(i)", &[])
        .unwrap();

    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 10);
    assert_eq!(batches[0].schema().field(0).name(), "i");
}

#[test_case("HTTP Error: Unable to connect to URL", QueryErrorKind::Http)]
#[test_case("IO Error: No files found that match the pattern", QueryErrorKind::Io)]
#[test_case("Invalid Input Error: No magic bytes found", QueryErrorKind::InvalidInput)]
#[test_case("Parser Error: syntax error at or near", QueryErrorKind::Other)]
fn test_classify_query_error(message: &str, expected: QueryErrorKind) {
    assert_eq!(classify_query_error(message), expected);
}

#[test]
fn test_retry_policy_retries_invalid_input() {
    let attempts = Cell::new(0);

    let result: crate::Result<()> = no_wait(3).run(|| {
        attempts.set(attempts.get() + 1);
        Err(Error::query(QueryErrorKind::InvalidInput, "corrupt"))
    });

    assert!(result.is_err());
    assert_eq!(attempts.get(), 3);
}

#[test]
fn test_retry_policy_recovers() {
    let attempts = Cell::new(0);

    let result = no_wait(3).run(|| {
        attempts.set(attempts.get() + 1);
        if attempts.get() < 2 {
            Err(Error::query(QueryErrorKind::InvalidInput, "corrupt"))
        } else {
            Ok(attempts.get())
        }
    });

    assert_eq!(result.unwrap(), 2);
}

#[test_case(QueryErrorKind::Http ; "http")]
#[test_case(QueryErrorKind::Io ; "io")]
#[test_case(QueryErrorKind::Other ; "other")]
fn test_retry_policy_does_not_retry(kind: QueryErrorKind) {
    let attempts = Cell::new(0);

    let result: crate::Result<()> = no_wait(3).run(|| {
        attempts.set(attempts.get() + 1);
        Err(Error::query(kind, "failed"))
    });

    assert!(result.is_err());
    assert_eq!(attempts.get(), 1);
}

#[test]
fn test_default_retry_policy() {
    let policy = DuckDbReader::new().unwrap().retry_policy();
    assert_eq!(policy.attempts, 3);
    assert_eq!(policy.wait, Duration::from_secs(2));
}

#[test]
fn test_duckdb_value_to_json() {
    assert_eq!(duckdb_value_to_json(Value::Null), JsonValue::Null);
    assert_eq!(duckdb_value_to_json(Value::Boolean(true)), json!(true));
    assert_eq!(duckdb_value_to_json(Value::Int(42)), json!(42));
    assert_eq!(duckdb_value_to_json(Value::Text("hello".into())), json!("hello"));
    assert_eq!(duckdb_value_to_json(Value::Double(f64::NAN)), JsonValue::Null);
    assert_eq!(duckdb_value_to_json(Value::Date32(0)), json!("1970-01-01"));
    assert_eq!(
        duckdb_value_to_json(Value::List(vec![Value::Int(1), Value::Null])),
        json!([1, null])
    );
}

#[test_case(TimeUnit::Second, 1_704_164_645, "2024-01-02T03:04:05.000000Z")]
#[test_case(TimeUnit::Millisecond, 1_704_164_645_123, "2024-01-02T03:04:05.123000Z")]
#[test_case(TimeUnit::Microsecond, 1_704_164_645_000_001, "2024-01-02T03:04:05.000001Z")]
#[test_case(TimeUnit::Nanosecond, 1_704_164_645_000_000_007, "2024-01-02T03:04:05.000000007Z")]
#[test_case(TimeUnit::Second, -1, "1969-12-31T23:59:59.000000Z"; "before epoch")]
fn test_timestamp_scaled_by_unit(unit: TimeUnit, raw: i64, expected: &str) {
    assert_eq!(duckdb_value_to_json(Value::Timestamp(unit, raw)), json!(expected));
}

#[test_case(TimeUnit::Microsecond, 45_015_000_000, "12:30:15.000000")]
#[test_case(TimeUnit::Second, 59, "00:00:59.000000")]
#[test_case(TimeUnit::Nanosecond, 1_500, "00:00:00.000001")]
fn test_time_scaled_by_unit(unit: TimeUnit, raw: i64, expected: &str) {
    assert_eq!(duckdb_value_to_json(Value::Time64(unit, raw)), json!(expected));
}

#[test_case(1, 2, 3_000_000_000, "P1M2DT3S")]
#[test_case(0, 0, 0, "P0M0DT0S")]
#[test_case(0, 1, 1_500_000_000, "P0M1DT1.5S")]
#[test_case(0, 0, -250_000_000, "P0M0DT-0.25S")]
fn test_interval_as_iso8601(months: i32, days: i32, nanos: i64, expected: &str) {
    assert_eq!(
        duckdb_value_to_json(Value::Interval {
            months,
            days,
            nanos
        }),
        json!(expected)
    );
}

#[test]
fn test_nested_values() {
    assert_eq!(duckdb_value_to_json(Value::Enum("raw".into())), json!("raw"));
    assert_eq!(
        duckdb_value_to_json(Value::Union(Box::new(Value::BigInt(7)))),
        json!(7)
    );
}

#[test]
fn test_read_temporal_and_decimal_columns() {
    let reader = DuckDbReader::new().unwrap();

    let rows = reader
        .read(
            "SELECT TIMESTAMP '2024-01-02 03:04:05' AS us, \
                    TIMESTAMP '2024-01-02 03:04:05.123'::TIMESTAMP_MS AS ms, \
                    TIMESTAMP '2024-01-02 03:04:05'::TIMESTAMP_NS AS ns, \
                    TIMESTAMP '2024-01-02 03:04:05'::TIMESTAMP_S AS s, \
                    12.50::DECIMAL(5,2) AS dec, \
                    TIME '12:30:15' AS t, \
                    INTERVAL '1 month 2 days 3 seconds' AS iv",
            &[],
        )
        .unwrap();

    assert_eq!(
        JsonValue::Object(rows[0].clone()),
        json!({
            "us": "2024-01-02T03:04:05.000000Z",
            "ms": "2024-01-02T03:04:05.123000Z",
            "ns": "2024-01-02T03:04:05.000000000Z",
            "s": "2024-01-02T03:04:05.000000Z",
            "dec": 12.5,
            "t": "12:30:15.000000",
            "iv": "P1M2DT3S"
        })
    );
}

// ============================================================================
// S3 Auth Tests
// ============================================================================

#[test_case("auto", AuthType::Auto)]
#[test_case("STS", AuthType::Sts)]
#[test_case("Custom_Endpoint", AuthType::CustomEndpoint)]
fn test_auth_type_from_str(input: &str, expected: AuthType) {
    assert_eq!(input.parse::<AuthType>().unwrap(), expected);
}

#[test]
fn test_auth_type_invalid() {
    let err = "magic".parse::<AuthType>().unwrap_err();
    assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "auth_type"));
}

#[test]
fn test_secret_sql_auto() {
    let sql = secret_sql(AuthType::Auto, None, true).unwrap();
    assert!(sql.contains("PROVIDER CREDENTIAL_CHAIN"));
    assert!(!sql.contains("CHAIN 'sts'"));
}

#[test]
fn test_secret_sql_sts() {
    let sql = secret_sql(AuthType::Sts, None, true).unwrap();
    assert!(sql.contains("CHAIN 'sts'"));
}

#[test_case(true ; "with ssl")]
#[test_case(false ; "without ssl")]
fn test_secret_sql_custom_endpoint(use_ssl: bool) {
    let sql = secret_sql(AuthType::CustomEndpoint, Some("http://localhost:4566"), use_ssl).unwrap();

    assert!(sql.contains("ENDPOINT 'localhost:4566'"));
    assert!(sql.contains("URL_STYLE 'path'"));
    assert!(sql.contains(&format!("USE_SSL '{use_ssl}'")));
}

#[test_case(None ; "missing")]
#[test_case(Some("") ; "empty")]
fn test_custom_endpoint_requires_url(endpoint: Option<&str>) {
    let err = DuckDbS3Reader::new(AuthType::CustomEndpoint, endpoint, true, false).unwrap_err();

    assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "endpoint_url"));
}
