//! HTTP transport
//!
//! The collaborator behind [`HttpPageFetcher`](crate::metadata_api::HttpPageFetcher).
//! Query parameters go out in order with repeated keys kept. Retries are off
//! unless `max_retries` is set, and a `governor` token bucket can cap the
//! request rate.

mod client;
mod rate_limit;

pub use client::{Backoff, HttpClient, HttpClientConfig, HttpClientConfigBuilder, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
