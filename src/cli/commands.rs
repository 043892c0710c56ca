//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Utilities for the metadata API, object storage and DuckDB
#[derive(Parser, Debug)]
#[command(name = "driutils")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Metadata API host, overriding the settings file
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Sensor network, overriding the settings file
    #[arg(long, global = true)]
    pub network: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the sites of the network
    Sites,

    /// Show metadata for one site
    Site {
        /// Site identifier, e.g. `cosmos-alic1`
        site_id: String,
    },

    /// Fetch every page of a metadata API URL
    Fetch {
        /// Absolute URL, or a path relative to the host
        url: String,

        /// Query parameter as `key=value`; repeat for several values
        #[arg(short, long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },

    /// Run a SQL query through DuckDB and print the rows
    Query {
        sql: String,

        /// Positional parameter bound to `?`, in order
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Authenticate against S3 using the `duckdb` settings
        #[arg(long)]
        s3: bool,
    },

    /// Download an object
    Get {
        bucket: String,
        key: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a file as an object
    Put {
        bucket: String,
        key: String,
        file: PathBuf,

        /// Object tag as `key=value`
        #[arg(short, long = "tag", value_parser = parse_key_val)]
        tags: Vec<(String, String)>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON on one line
    Json,
    /// Indented JSON
    Pretty,
}

/// Parse a `key=value` argument
pub fn parse_key_val(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{arg}'"))
}
