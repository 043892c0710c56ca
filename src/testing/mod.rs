//! Test doubles
//!
//! [`MockMetadataApi`] answers metadata API requests from an in-memory table,
//! applying the same filtering and `_offset`/`_limit` slicing as the real
//! service. It implements [`crate::metadata_api::PageFetcher`], so it can sit
//! behind [`crate::metadata_api::MetadataApiClient`] in tests.

mod filters;
mod mock_api;

pub use filters::{
    filter_by_applies_to_ts_id, filter_by_column, filter_by_id, filter_by_periodicity,
    filter_by_processing_level, filter_by_site, filter_by_type, FilterFn, FilterKey,
};
pub use mock_api::{MockMetadataApi, RecordedCall};
