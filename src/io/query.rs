//! DuckDB query readers
//!
//! Queries run against an in-memory DuckDB connection. The S3 variant loads
//! `httpfs` and registers a secret so `read_parquet('s3://...')` works.

use super::QueryReader;
use crate::config::DuckDbSettings;
use crate::error::{Error, QueryErrorKind, Result};
use crate::types::{JsonObject, JsonValue};
use crate::utils::remove_protocol_from_url;
use duckdb::arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveTime};
use duckdb::types::{TimeUnit, Value};
use duckdb::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, info, warn};

/// Classify a DuckDB failure by the exception prefix of its message
pub fn classify_query_error(message: &str) -> QueryErrorKind {
    if message.contains("HTTP Error") {
        QueryErrorKind::Http
    } else if message.contains("IO Error") {
        QueryErrorKind::Io
    } else if message.contains("Invalid Input Error") {
        QueryErrorKind::InvalidInput
    } else {
        QueryErrorKind::Other
    }
}

fn query_error(err: &duckdb::Error) -> Error {
    let message = err.to_string();
    Error::query(classify_query_error(&message), message)
}

/// How often a query is attempted when the engine reports invalid input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Fixed wait between attempts
    pub wait: Duration,
}

impl Default for QueryRetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            wait: Duration::from_secs(2),
        }
    }
}

impl QueryRetryPolicy {
    /// Run `op`, retrying only failures classified as invalid input
    pub fn run<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if e.is_retryable() && attempt < self.attempts => {
                    warn!("Query attempt {}/{} failed: {}", attempt, self.attempts, e);
                    std::thread::sleep(self.wait);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Reader over an in-memory DuckDB connection
pub struct DuckDbReader {
    conn: Connection,
    retry: QueryRetryPolicy,
}

impl fmt::Debug for DuckDbReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuckDbReader")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl DuckDbReader {
    /// Open a fresh in-memory database
    pub fn new() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::config(format!("Failed to create DuckDB connection: {e}")))?;
        Ok(Self {
            conn,
            retry: QueryRetryPolicy::default(),
        })
    }

    /// Replace the retry policy for invalid input failures
    #[must_use]
    pub fn with_retry(mut self, retry: QueryRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> QueryRetryPolicy {
        self.retry
    }

    /// Run statements that return no rows (DDL, `SET`, `INSTALL`, ...)
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(|e| query_error(&e))
    }

    /// Run `query` and collect every row as a JSON object keyed by column name
    pub fn read(&self, query: &str, params: &[Value]) -> Result<Vec<JsonObject>> {
        self.retry
            .run(|| self.read_once(query, params))
            .map_err(|e| log_failure(query, e))
    }

    /// Run `query` and collect the result as Arrow record batches
    pub fn read_arrow(&self, query: &str, params: &[Value]) -> Result<Vec<RecordBatch>> {
        self.retry
            .run(|| self.read_arrow_once(query, params))
            .map_err(|e| log_failure(query, e))
    }

    fn read_once(&self, query: &str, params: &[Value]) -> Result<Vec<JsonObject>> {
        let mut stmt = self.conn.prepare(query).map_err(|e| query_error(&e))?;
        let mut rows = stmt
            .query(params_from_iter(params))
            .map_err(|e| query_error(&e))?;

        let columns = rows
            .as_ref()
            .map(duckdb::Statement::column_names)
            .unwrap_or_default();

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(|e| query_error(&e))? {
            let mut record = JsonObject::new();
            for (idx, name) in columns.iter().enumerate() {
                let value: Value = row.get(idx).map_err(|e| query_error(&e))?;
                record.insert(name.clone(), duckdb_value_to_json(value));
            }
            records.push(record);
        }

        Ok(records)
    }

    fn read_arrow_once(&self, query: &str, params: &[Value]) -> Result<Vec<RecordBatch>> {
        let mut stmt = self.conn.prepare(query).map_err(|e| query_error(&e))?;
        let batches = stmt
            .query_arrow(params_from_iter(params))
            .map_err(|e| query_error(&e))?
            .collect();
        Ok(batches)
    }
}

impl QueryReader for DuckDbReader {
    fn read(&self, query: &str, params: &[Value]) -> Result<Vec<JsonObject>> {
        DuckDbReader::read(self, query, params)
    }
}

fn log_failure(query: &str, err: Error) -> Error {
    match &err {
        Error::Query {
            kind: QueryErrorKind::Http,
            ..
        } => error!("Failed to find data from web query: {}", query),
        Error::Query {
            kind: QueryErrorKind::Io,
            ..
        } => error!("Failed to read file from query: {}", query),
        Error::Query {
            kind: QueryErrorKind::InvalidInput,
            ..
        } => error!("Corrupt data found from query: {}", query),
        _ => {}
    }
    err
}

// ============================================================================
// S3
// ============================================================================

/// How the S3 secret is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// AWS credential chain (environment, profile, instance metadata)
    #[default]
    Auto,
    /// Credential chain restricted to assumed roles
    Sts,
    /// Static endpoint, e.g. localstack or MinIO
    CustomEndpoint,
}

impl AuthType {
    pub const VALID: [&'static str; 3] = ["auto", "sts", "custom_endpoint"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Sts => "sts",
            Self::CustomEndpoint => "custom_endpoint",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "sts" => Ok(Self::Sts),
            "custom_endpoint" => Ok(Self::CustomEndpoint),
            _ => Err(Error::invalid_value(
                "auth_type",
                format!("must be one of {:?}", Self::VALID),
            )),
        }
    }
}

/// Build the `CREATE SECRET` statement for an auth type
pub(crate) fn secret_sql(
    auth_type: AuthType,
    endpoint_url: Option<&str>,
    use_ssl: bool,
) -> Result<String> {
    let sql = match auth_type {
        AuthType::Auto => "CREATE SECRET aws_secret (TYPE S3, PROVIDER CREDENTIAL_CHAIN);".to_string(),
        AuthType::Sts => {
            "CREATE SECRET aws_secret (TYPE S3, PROVIDER CREDENTIAL_CHAIN, CHAIN 'sts');".to_string()
        }
        AuthType::CustomEndpoint => {
            let endpoint = endpoint_url.filter(|e| !e.is_empty()).ok_or_else(|| {
                Error::invalid_value(
                    "endpoint_url",
                    "must be provided for `custom_endpoint` authentication",
                )
            })?;
            format!(
                "CREATE SECRET aws_secret (TYPE S3, ENDPOINT '{}', URL_STYLE 'path', USE_SSL '{use_ssl}');",
                remove_protocol_from_url(endpoint)
            )
        }
    };
    Ok(sql)
}

/// DuckDB reader authenticated against S3
#[derive(Debug)]
pub struct DuckDbS3Reader {
    reader: DuckDbReader,
    auth_type: AuthType,
}

impl DuckDbS3Reader {
    /// Open a connection with `httpfs` loaded and an S3 secret registered
    pub fn new(
        auth_type: AuthType,
        endpoint_url: Option<&str>,
        use_ssl: bool,
        profiling: bool,
    ) -> Result<Self> {
        let secret = secret_sql(auth_type, endpoint_url, use_ssl)?;
        let reader = DuckDbReader::new()?;

        reader
            .execute_batch("INSTALL httpfs; LOAD httpfs; SET force_download = true;")
            .map_err(|e| Error::config(format!("Failed to load httpfs extension: {e}")))?;

        if auth_type != AuthType::CustomEndpoint {
            reader
                .execute_batch("INSTALL aws; LOAD aws;")
                .map_err(|e| Error::config(format!("Failed to load aws extension: {e}")))?;
        }

        reader
            .execute_batch(&secret)
            .map_err(|e| Error::config(format!("Failed to create S3 secret: {e}")))?;
        info!("Initialized DuckDB with '{}' secret", auth_type);

        if profiling {
            reader.execute_batch("SET enable_profiling = query_tree;")?;
        }

        Ok(Self { reader, auth_type })
    }

    /// Build a reader from the `duckdb` settings section
    pub fn from_settings(settings: &DuckDbSettings) -> Result<Self> {
        let reader = Self::new(
            settings.auth_type,
            settings.endpoint_url.as_deref(),
            settings.use_ssl,
            settings.profiling,
        )?;
        Ok(reader.with_retry(settings.retry_policy()))
    }

    #[must_use]
    pub fn with_retry(mut self, retry: QueryRetryPolicy) -> Self {
        self.reader = self.reader.with_retry(retry);
        self
    }

    pub fn auth_type(&self) -> AuthType {
        self.auth_type
    }

    /// The underlying reader
    pub fn reader(&self) -> &DuckDbReader {
        &self.reader
    }

    pub fn read(&self, query: &str, params: &[Value]) -> Result<Vec<JsonObject>> {
        self.reader.read(query, params)
    }

    pub fn read_arrow(&self, query: &str, params: &[Value]) -> Result<Vec<RecordBatch>> {
        self.reader.read_arrow(query, params)
    }
}

impl QueryReader for DuckDbS3Reader {
    fn read(&self, query: &str, params: &[Value]) -> Result<Vec<JsonObject>> {
        self.reader.read(query, params)
    }
}

// ============================================================================
// Value Conversion
// ============================================================================

/// Render a DuckDB value as JSON
///
/// Timestamps become RFC 3339 strings in UTC, scaled by their unit. TIMESTAMPTZ
/// columns arrive as plain timestamps already normalised to UTC. Decimals
/// become numbers, times `HH:MM:SS.ffffff` and intervals ISO 8601 durations.
pub(crate) fn duckdb_value_to_json(value: Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(b),
        Value::TinyInt(i) => JsonValue::Number(i.into()),
        Value::SmallInt(i) => JsonValue::Number(i.into()),
        Value::Int(i) => JsonValue::Number(i.into()),
        Value::BigInt(i) => JsonValue::Number(i.into()),
        Value::HugeInt(i) => JsonValue::String(i.to_string()),
        Value::UTinyInt(i) => JsonValue::Number(i.into()),
        Value::USmallInt(i) => JsonValue::Number(i.into()),
        Value::UInt(i) => JsonValue::Number(i.into()),
        Value::UBigInt(i) => JsonValue::Number(i.into()),
        Value::Float(f) => float_json(f64::from(f)),
        Value::Double(f) => float_json(f),
        Value::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map_or(JsonValue::String(text), JsonValue::Number)
        }
        Value::Text(s) | Value::Enum(s) => JsonValue::String(s),
        Value::Blob(b) => JsonValue::String(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            b,
        )),
        Value::Timestamp(unit, raw) => timestamp_json(unit, raw),
        Value::Date32(days) => {
            // 719163 days from 0001-01-01 to 1970-01-01
            chrono::NaiveDate::from_num_days_from_ce_opt(days + 719_163)
                .map(|date| JsonValue::String(date.format("%Y-%m-%d").to_string()))
                .unwrap_or(JsonValue::Number(days.into()))
        }
        Value::Time64(unit, raw) => time_json(unit, raw),
        Value::Interval {
            months,
            days,
            nanos,
        } => JsonValue::String(interval_iso8601(months, days, nanos)),
        Value::List(values) | Value::Array(values) => {
            JsonValue::Array(values.into_iter().map(duckdb_value_to_json).collect())
        }
        Value::Struct(fields) => JsonValue::Object(
            fields
                .iter()
                .map(|(name, v)| (name.clone(), duckdb_value_to_json(v.clone())))
                .collect(),
        ),
        Value::Map(entries) => JsonValue::Object(
            entries
                .iter()
                .map(|(k, v)| {
                    let key = match duckdb_value_to_json(k.clone()) {
                        JsonValue::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, duckdb_value_to_json(v.clone()))
                })
                .collect(),
        ),
        Value::Union(inner) => duckdb_value_to_json(*inner),
        #[allow(unreachable_patterns)]
        other => {
            warn!("No JSON rendering for DuckDB value {:?}", other);
            JsonValue::Null
        }
    }
}

fn float_json(f: f64) -> JsonValue {
    serde_json::Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number)
}

fn nanos_per_unit(unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Second => 1_000_000_000,
        TimeUnit::Millisecond => 1_000_000,
        TimeUnit::Microsecond => 1_000,
        TimeUnit::Nanosecond => 1,
    }
}

fn timestamp_json(unit: TimeUnit, raw: i64) -> JsonValue {
    let (datetime, format) = match unit {
        TimeUnit::Second => (DateTime::from_timestamp(raw, 0), "%Y-%m-%dT%H:%M:%S%.6fZ"),
        TimeUnit::Millisecond => (DateTime::from_timestamp_millis(raw), "%Y-%m-%dT%H:%M:%S%.6fZ"),
        TimeUnit::Microsecond => (DateTime::from_timestamp_micros(raw), "%Y-%m-%dT%H:%M:%S%.6fZ"),
        TimeUnit::Nanosecond => (
            Some(DateTime::from_timestamp_nanos(raw)),
            "%Y-%m-%dT%H:%M:%S%.9fZ",
        ),
    };
    datetime.map_or(JsonValue::Number(raw.into()), |dt| {
        JsonValue::String(dt.format(format).to_string())
    })
}

fn time_json(unit: TimeUnit, raw: i64) -> JsonValue {
    let nanos = raw.saturating_mul(nanos_per_unit(unit));
    u32::try_from(nanos.div_euclid(1_000_000_000))
        .ok()
        .and_then(|secs| {
            NaiveTime::from_num_seconds_from_midnight_opt(
                secs,
                nanos.rem_euclid(1_000_000_000) as u32,
            )
        })
        .map_or(JsonValue::Number(raw.into()), |t| {
            JsonValue::String(t.format("%H:%M:%S%.6f").to_string())
        })
}

/// `P{months}M{days}DT{seconds}S`, fractional seconds trimmed
fn interval_iso8601(months: i32, days: i32, nanos: i64) -> String {
    let secs = nanos / 1_000_000_000;
    let frac = (nanos % 1_000_000_000).abs();
    let seconds = if frac == 0 {
        secs.to_string()
    } else {
        let sign = if nanos < 0 && secs == 0 { "-" } else { "" };
        let digits = format!("{frac:09}");
        format!("{sign}{secs}.{}", digits.trim_end_matches('0'))
    };
    format!("P{months}M{days}DT{seconds}S")
}
