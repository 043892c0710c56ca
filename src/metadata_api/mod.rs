//! Metadata API module
//!
//! Client for the paginated metadata API.
//!
//! # Overview
//!
//! - [`ApiResponse`] / [`QueryParams`]: the request and response shapes
//! - [`PageFetcher`]: a single-page GET, implemented over HTTP by
//!   [`HttpPageFetcher`] and in memory by [`crate::testing::MockMetadataApi`]
//! - [`PaginatingFetcher`]: stitches pages together into one result set
//! - [`MetadataApiClient`]: endpoint helpers for one sensor network

mod client;
mod fetcher;
mod types;
pub mod utils;

pub use client::{HttpPageFetcher, MetadataApiClient};
pub use fetcher::{PageFetcher, PaginatingFetcher};
pub use types::{
    ApiResponse, ParamMultimap, QueryParams, LIMIT_PARAM, OFFSET_PARAM, PAGE_SIZE,
};
