//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::Settings;
use crate::error::{Error, Result, ResultExt};
use crate::io::{DuckDbReader, DuckDbS3Reader, ObjectStorage, Reader, Tags, Writer};
use crate::metadata_api::{ApiResponse, MetadataApiClient, QueryParams};
use crate::types::{JsonObject, JsonValue, LogLevel};
use bytes::Bytes;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use tracing::info;

/// Result of a command, printed by [`Runner::run`]
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Printed as JSON in the selected format
    Json(JsonValue),
    /// Raw object bytes, written to stdout
    Bytes(Bytes),
    /// Nothing to print
    Empty,
}

/// CLI runner
pub struct Runner {
    cli: Cli,
    settings: Settings,
    storage: ObjectStorage,
}

impl Runner {
    /// Create a runner, loading settings from `--config` or the environment
    pub fn new(cli: Cli) -> Result<Self> {
        let settings = match &cli.config {
            Some(path) => Settings::load(path)?,
            None => Settings::from_env()?,
        };
        let storage = ObjectStorage::s3(settings.storage.endpoint_url.clone());
        Ok(Self::with_settings(cli, settings, storage))
    }

    /// Create a runner over explicit settings and storage
    pub fn with_settings(cli: Cli, mut settings: Settings, storage: ObjectStorage) -> Self {
        if let Some(host) = &cli.host {
            settings.metadata_api.host.clone_from(host);
        }
        if let Some(network) = &cli.network {
            settings.metadata_api.network.clone_from(network);
        }
        Self {
            cli,
            settings,
            storage,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Level for the log subscriber; `--verbose` forces debug
    pub fn log_level(&self) -> LogLevel {
        if self.cli.verbose {
            LogLevel::Debug
        } else {
            self.settings.log_level
        }
    }

    /// Run the CLI command and print its output
    pub async fn run(&self) -> Result<()> {
        match self.execute().await? {
            Output::Json(value) => self.output_json(&value),
            Output::Bytes(bytes) => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&bytes)?;
                stdout.flush()?;
            }
            Output::Empty => {}
        }
        Ok(())
    }

    /// Run the CLI command
    pub async fn execute(&self) -> Result<Output> {
        match &self.cli.command {
            Commands::Sites => {
                let response = self.client()?.fetch_sites().await?;
                Ok(Output::Json(response_json(response)))
            }
            Commands::Site { site_id } => {
                let response = self.client()?.fetch_site_metadata(site_id).await?;
                Ok(Output::Json(response_json(response)))
            }
            Commands::Fetch { url, params } => self.fetch(url, params).await,
            Commands::Query { sql, params, s3 } => self.query(sql, params, *s3),
            Commands::Get {
                bucket,
                key,
                output,
            } => self.get(bucket, key, output.as_deref()).await,
            Commands::Put {
                bucket,
                key,
                file,
                tags,
            } => self.put(bucket, key, file, tags).await,
        }
    }

    fn client(&self) -> Result<MetadataApiClient> {
        if self.settings.metadata_api.host.is_empty() {
            return Err(Error::config(
                "Metadata API host not set (use --host or metadata_api.host)",
            ));
        }
        MetadataApiClient::from_settings(&self.settings.metadata_api)
    }

    /// Fetch any URL; a bare path is resolved against the host
    async fn fetch(&self, url: &str, params: &[(String, String)]) -> Result<Output> {
        let client = self.client()?;
        let url = if url.contains("://") {
            url.to_string()
        } else {
            format!("{}/{}", client.host(), url.trim_start_matches('/'))
        };

        let params = (!params.is_empty()).then(|| QueryParams::Pairs(params.to_vec()));
        let response = client.fetcher().fetch_all(&url, params).await?;
        info!("Fetched {} items from {}", response.len(), url);

        Ok(Output::Json(response_json(response)))
    }

    fn query(&self, sql: &str, params: &[String], s3: bool) -> Result<Output> {
        let params: Vec<duckdb::types::Value> = params
            .iter()
            .map(|p| duckdb::types::Value::Text(p.clone()))
            .collect();

        let rows = if s3 {
            DuckDbS3Reader::from_settings(&self.settings.duckdb)?.read(sql, &params)?
        } else {
            DuckDbReader::new()?
                .with_retry(self.settings.duckdb.retry_policy())
                .read(sql, &params)?
        };

        Ok(Output::Json(JsonValue::Array(
            rows.into_iter().map(JsonValue::Object).collect(),
        )))
    }

    async fn get(&self, bucket: &str, key: &str, output: Option<&Path>) -> Result<Output> {
        let body = self.storage.read(bucket, key).await?;

        match output {
            Some(path) => {
                fs::write(path, &body)?;
                info!("Wrote {} bytes to {}", body.len(), path.display());
                Ok(Output::Empty)
            }
            None => Ok(Output::Bytes(body)),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        file: &Path,
        tags: &[(String, String)],
    ) -> Result<Output> {
        let body = fs::read(file).with_context(|| format!("Failed to read '{}'", file.display()))?;
        let size = body.len();
        let tags: Tags = tags.iter().cloned().collect();

        self.storage
            .write(
                bucket,
                key,
                Bytes::from(body),
                (!tags.is_empty()).then_some(&tags),
            )
            .await?;

        let mut summary = JsonObject::new();
        summary.insert("bucket".into(), bucket.into());
        summary.insert("key".into(), key.into());
        summary.insert("bytes".into(), size.into());
        Ok(Output::Json(JsonValue::Object(summary)))
    }

    /// Output a JSON value
    fn output_json(&self, value: &JsonValue) {
        let text = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(value),
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
        };
        println!("{}", text.unwrap_or_default());
    }
}

fn response_json(response: ApiResponse) -> JsonValue {
    serde_json::to_value(response).unwrap_or(JsonValue::Null)
}
