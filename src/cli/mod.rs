//! CLI module
//!
//! Command-line interface over the library.
//!
//! # Commands
//!
//! - `sites` / `site` - Network and site metadata
//! - `fetch` - Every page of any metadata API URL
//! - `query` - SQL through DuckDB, locally or against S3
//! - `get` / `put` - Object storage downloads and uploads

mod commands;
mod runner;

pub use commands::{parse_key_val, Cli, Commands, OutputFormat};
pub use runner::{Output, Runner};
