#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # driutils
//!
//! Shared plumbing for sensor-network data pipelines.
//!
//! ## Features
//!
//! - **Metadata API**: Paginated `_limit`/`_offset` fetching and typed endpoint helpers
//! - **Test doubles**: An in-process metadata API with the server's filter semantics
//! - **Object storage**: Tagged S3 reads and writes through `object_store`
//! - **DuckDB**: SQL over local files or S3, with error classification and retry
//! - **Date ranges**: Sanitising, chunking and ISO 8601 duration checks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use driutils::{MetadataApiClient, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = MetadataApiClient::new("https://dri-metadata-api.staging.eds.ceh.ac.uk", "cosmos")?;
//!
//!     let sites = client.fetch_sites().await?;
//!     for item in &sites.items {
//!         println!("{}", item["@id"]);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 MetadataApiClient endpoints                  │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//! ┌──────────────────────────────┴───────────────────────────────┐
//! │          PaginatingFetcher  (_limit / _offset loop)          │
//! └──────────────┬─────────────────────────────┬─────────────────┘
//!                │ PageFetcher                 │ PageFetcher
//! ┌──────────────┴──────────────┐ ┌────────────┴─────────────────┐
//! │ HttpPageFetcher (reqwest)   │ │ MockMetadataApi (filters)    │
//! └─────────────────────────────┘ └──────────────────────────────┘
//!
//! ┌──────────────┬──────────────┬──────────────┬─────────────────┐
//! │ ObjectStorage│ DuckDbReader │ datetime     │ config / logging│
//! └──────────────┴──────────────┴──────────────┴─────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// HTTP client with retry and rate limiting
pub mod http;

/// Metadata API client and pagination
pub mod metadata_api;

/// In-process metadata API for tests
pub mod testing;

/// Object storage and DuckDB readers
pub mod io;

/// Small string and list helpers
pub mod utils;

/// Date range handling
pub mod datetime;

/// Settings file and environment configuration
pub mod config;

/// Log subscriber setup
pub mod logging;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, QueryErrorKind, Result, ResultExt};
pub use types::*;

pub use config::Settings;
pub use io::{DuckDbReader, DuckDbS3Reader, ObjectStorage, QueryReader, Reader, Writer};
pub use metadata_api::{ApiResponse, MetadataApiClient, PageFetcher, PaginatingFetcher, QueryParams};
pub use testing::MockMetadataApi;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
