//! Library settings
//!
//! Settings are read from a YAML or JSON file and can be overridden per key
//! with `DRIUTILS_*` environment variables, e.g.
//! `DRIUTILS_METADATA_API_HOST` or `DRIUTILS_DUCKDB_AUTH_TYPE`.

use crate::error::{Error, Result};
use crate::http::RateLimiterConfig;
use crate::io::{AuthType, QueryRetryPolicy};
use crate::metadata_api::PAGE_SIZE;
use crate::types::LogLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "DRIUTILS_";

// ============================================================================
// Top-Level Settings
// ============================================================================

/// Complete settings, every section optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Level used when `RUST_LOG` is not set
    #[serde(default)]
    pub log_level: LogLevel,

    /// Metadata API client
    #[serde(default)]
    pub metadata_api: MetadataApiSettings,

    /// DuckDB query reader
    #[serde(default)]
    pub duckdb: DuckDbSettings,

    /// Object storage
    #[serde(default)]
    pub storage: StorageSettings,
}

impl Settings {
    /// Load settings from a file, choosing the format by extension
    ///
    /// `.json` files are parsed as JSON, anything else as YAML. Environment
    /// overrides are applied on top.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read settings file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut settings = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content)?,
            _ => Self::from_yaml_str(&content)?,
        };
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults plus environment overrides, for running without a file
    pub fn from_env() -> Result<Self> {
        let mut settings = Self::default();
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply `DRIUTILS_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production)
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = v.parse()?;
        }

        let api = &mut self.metadata_api;
        if let Some(v) = get("METADATA_API_HOST") {
            api.host = v;
        }
        if let Some(v) = get("METADATA_API_NETWORK") {
            api.network = v;
        }
        if let Some(v) = get("METADATA_API_PAGE_SIZE") {
            api.page_size = parse_override("METADATA_API_PAGE_SIZE", &v)?;
        }
        if let Some(v) = get("METADATA_API_TIMEOUT_SECONDS") {
            api.timeout_seconds = parse_override("METADATA_API_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("METADATA_API_MAX_RETRIES") {
            api.max_retries = parse_override("METADATA_API_MAX_RETRIES", &v)?;
        }

        let duckdb = &mut self.duckdb;
        if let Some(v) = get("DUCKDB_AUTH_TYPE") {
            duckdb.auth_type = v.parse()?;
        }
        if let Some(v) = get("DUCKDB_ENDPOINT_URL") {
            duckdb.endpoint_url = Some(v);
        }
        if let Some(v) = get("DUCKDB_USE_SSL") {
            duckdb.use_ssl = parse_override("DUCKDB_USE_SSL", &v)?;
        }
        if let Some(v) = get("DUCKDB_PROFILING") {
            duckdb.profiling = parse_override("DUCKDB_PROFILING", &v)?;
        }

        if let Some(v) = get("STORAGE_ENDPOINT_URL") {
            self.storage.endpoint_url = Some(v);
        }

        Ok(())
    }

    /// Check values that deserialize fine but cannot be used
    pub fn validate(&self) -> Result<()> {
        if self.metadata_api.page_size == 0 {
            return Err(Error::invalid_value(
                "metadata_api.page_size",
                "must be at least 1",
            ));
        }
        if self.duckdb.retry_attempts == 0 {
            return Err(Error::invalid_value(
                "duckdb.retry_attempts",
                "must be at least 1",
            ));
        }
        if self.duckdb.auth_type == AuthType::CustomEndpoint
            && self.duckdb.endpoint_url.as_deref().map_or(true, str::is_empty)
        {
            return Err(Error::invalid_value(
                "duckdb.endpoint_url",
                "must be provided for `custom_endpoint` authentication",
            ));
        }
        Ok(())
    }
}

fn parse_override<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        Error::invalid_value(
            format!("{ENV_PREFIX}{name}"),
            format!("cannot parse '{value}'"),
        )
    })
}

// ============================================================================
// Metadata API
// ============================================================================

/// Metadata API client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataApiSettings {
    /// Base URL of the API
    #[serde(default)]
    pub host: String,

    /// Sensor network to query
    #[serde(default = "default_network")]
    pub network: String,

    /// Items requested per follow-up page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries per request after the first attempt
    #[serde(default)]
    pub max_retries: u32,

    /// Client-side rate limit
    #[serde(default)]
    pub rate_limit: Option<RateLimiterConfig>,
}

impl Default for MetadataApiSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            network: default_network(),
            page_size: default_page_size(),
            timeout_seconds: default_timeout(),
            max_retries: 0,
            rate_limit: None,
        }
    }
}

impl MetadataApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_network() -> String {
    "cosmos".to_string()
}

fn default_page_size() -> usize {
    PAGE_SIZE
}

fn default_timeout() -> u64 {
    30
}

// ============================================================================
// DuckDB
// ============================================================================

/// DuckDB S3 reader settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuckDbSettings {
    /// How the S3 secret is created
    #[serde(default)]
    pub auth_type: AuthType,

    /// Endpoint for `custom_endpoint` auth
    #[serde(default)]
    pub endpoint_url: Option<String>,

    #[serde(default = "default_true")]
    pub use_ssl: bool,

    /// Record a query tree profile for every query
    #[serde(default)]
    pub profiling: bool,

    /// Attempts for queries failing on invalid input
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Seconds between those attempts
    #[serde(default = "default_retry_wait")]
    pub retry_wait_seconds: u64,
}

impl Default for DuckDbSettings {
    fn default() -> Self {
        Self {
            auth_type: AuthType::default(),
            endpoint_url: None,
            use_ssl: default_true(),
            profiling: false,
            retry_attempts: default_retry_attempts(),
            retry_wait_seconds: default_retry_wait(),
        }
    }
}

impl DuckDbSettings {
    pub fn retry_policy(&self) -> QueryRetryPolicy {
        QueryRetryPolicy {
            attempts: self.retry_attempts,
            wait: Duration::from_secs(self.retry_wait_seconds),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_wait() -> u64 {
    2
}

// ============================================================================
// Storage
// ============================================================================

/// Object storage settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Custom S3-compatible endpoint (MinIO, localstack)
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.log_level, LogLevel::Info);
        assert_eq!(settings.metadata_api.network, "cosmos");
        assert_eq!(settings.metadata_api.page_size, 25);
        assert_eq!(settings.metadata_api.max_retries, 0);
        assert_eq!(settings.duckdb.auth_type, AuthType::Auto);
        assert!(settings.duckdb.use_ssl);
        assert_eq!(
            settings.duckdb.retry_policy(),
            QueryRetryPolicy::default()
        );
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
log_level: debug
metadata_api:
  host: "https://metadata.example.com"
  network: fdri
  page_size: 50
  rate_limit:
    requests_per_second: 5
    burst_size: 2
duckdb:
  auth_type: custom_endpoint
  endpoint_url: "http://localhost:4566"
  use_ssl: false
"#;

        let settings = Settings::from_yaml_str(yaml).unwrap();

        assert_eq!(settings.log_level, LogLevel::Debug);
        assert_eq!(settings.metadata_api.host, "https://metadata.example.com");
        assert_eq!(settings.metadata_api.network, "fdri");
        assert_eq!(settings.metadata_api.page_size, 50);
        assert_eq!(settings.metadata_api.timeout_seconds, 30);
        assert_eq!(
            settings.metadata_api.rate_limit,
            Some(RateLimiterConfig::new(5, 2))
        );
        assert_eq!(settings.duckdb.auth_type, AuthType::CustomEndpoint);
        assert!(!settings.duckdb.use_ssl);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{"metadata_api": {"host": "http://localhost:8000"}, "storage": {"endpoint_url": "http://localhost:9000"}}"#;

        let settings = Settings::from_json_str(json).unwrap();

        assert_eq!(settings.metadata_api.host, "http://localhost:8000");
        assert_eq!(
            settings.storage.endpoint_url.as_deref(),
            Some("http://localhost:9000")
        );
        assert_eq!(settings.duckdb, DuckDbSettings::default());
    }

    #[test]
    fn test_parse_unknown_auth_type() {
        let err = Settings::from_yaml_str("duckdb:\n  auth_type: magic\n").unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(lookup(&[
                ("DRIUTILS_LOG_LEVEL", "warning"),
                ("DRIUTILS_METADATA_API_HOST", "http://api.test"),
                ("DRIUTILS_METADATA_API_PAGE_SIZE", "10"),
                ("DRIUTILS_METADATA_API_MAX_RETRIES", "3"),
                ("DRIUTILS_DUCKDB_AUTH_TYPE", "STS"),
                ("DRIUTILS_DUCKDB_PROFILING", "true"),
                ("DRIUTILS_STORAGE_ENDPOINT_URL", "http://minio:9000"),
            ]))
            .unwrap();

        assert_eq!(settings.log_level, LogLevel::Warn);
        assert_eq!(settings.metadata_api.host, "http://api.test");
        assert_eq!(settings.metadata_api.page_size, 10);
        assert_eq!(settings.metadata_api.max_retries, 3);
        assert_eq!(settings.duckdb.auth_type, AuthType::Sts);
        assert!(settings.duckdb.profiling);
        assert_eq!(
            settings.storage.endpoint_url.as_deref(),
            Some("http://minio:9000")
        );
    }

    #[test]
    fn test_env_override_unparseable() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(lookup(&[("DRIUTILS_METADATA_API_PAGE_SIZE", "lots")]))
            .unwrap_err();

        assert!(
            matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "DRIUTILS_METADATA_API_PAGE_SIZE")
        );
    }

    #[test]
    fn test_validate_page_size() {
        let mut settings = Settings::default();
        settings.metadata_api.page_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_custom_endpoint() {
        let mut settings = Settings::default();
        settings.duckdb.auth_type = AuthType::CustomEndpoint;
        assert!(settings.validate().is_err());

        settings.duckdb.endpoint_url = Some("http://localhost:4566".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("settings.yaml");
        let mut file = std::fs::File::create(&yaml_path).unwrap();
        writeln!(file, "metadata_api:\n  network: cosmos-uk").unwrap();

        let json_path = dir.path().join("settings.json");
        std::fs::write(&json_path, r#"{"metadata_api": {"network": "fdri"}}"#).unwrap();

        assert_eq!(
            Settings::load(&yaml_path).unwrap().metadata_api.network,
            "cosmos-uk"
        );
        assert_eq!(
            Settings::load(&json_path).unwrap().metadata_api.network,
            "fdri"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load("/nonexistent/driutils.yaml").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
