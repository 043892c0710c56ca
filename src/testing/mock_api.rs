//! In-memory stand-in for the metadata API
//!
//! Serves responses from a backing table keyed by URL, filtering and slicing
//! them the way the real API would for the same request.

use super::filters::{FilterFn, FilterKey};
use crate::error::{Error, Result};
use crate::metadata_api::{ApiResponse, PageFetcher, QueryParams, LIMIT_PARAM, OFFSET_PARAM};
use crate::types::JsonValue;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::trace;

/// A page request received by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Requested URL
    pub url: String,
    /// Parameters as supplied, if any
    pub params: Option<QueryParams>,
}

/// Mock metadata API backed by a static `{url: response}` table
#[derive(Debug, Default)]
pub struct MockMetadataApi {
    api_data: HashMap<String, ApiResponse>,
    extra_filters: HashMap<String, FilterFn>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockMetadataApi {
    /// Create a mock over a backing table
    pub fn new(api_data: HashMap<String, ApiResponse>) -> Self {
        Self {
            api_data,
            ..Self::default()
        }
    }

    /// Create a mock from a JSON object of `{url: {"meta": ..., "items": ...}}`
    pub fn from_json(value: JsonValue) -> Result<Self> {
        let JsonValue::Object(entries) = value else {
            return Err(Error::malformed("mock API data must be a JSON object"));
        };

        let api_data = entries
            .into_iter()
            .map(|(url, response)| ApiResponse::from_json(response).map(|r| (url, r)))
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(Self::new(api_data))
    }

    /// Register (or replace) the response stored for `url`
    pub fn insert(&mut self, url: impl Into<String>, response: ApiResponse) {
        self.api_data.insert(url.into(), response);
    }

    /// Register a filter for a parameter key the built-in filters do not cover
    #[must_use]
    pub fn with_filter(mut self, param: impl Into<String>, filter: FilterFn) -> Self {
        self.extra_filters.insert(param.into(), filter);
        self
    }

    /// Answer a request as the real API would
    ///
    /// Without params the stored response is returned unmodified. Otherwise
    /// each registered filter present in the params narrows the items in
    /// turn, and `_offset`/`_limit` slice the result if either was given.
    pub fn respond(&self, url: &str, params: Option<&QueryParams>) -> Result<ApiResponse> {
        let stored = self
            .api_data
            .get(url)
            .ok_or_else(|| Error::unknown_resource(url))?;

        let Some(params) = params else {
            return Ok(stored.clone());
        };

        let mut items = stored.items.clone();
        let mut offset = None;
        let mut limit = None;

        for (key, values) in params.normalize().iter() {
            match key {
                OFFSET_PARAM => offset = Some(parse_cursor(key, values)?),
                LIMIT_PARAM => limit = Some(parse_cursor(key, values)?),
                _ => {}
            }

            if let Some(filter) = self.filter_for(key) {
                items = filter(values, items);
            }
        }

        if offset.is_some() || limit.is_some() {
            items = items
                .into_iter()
                .skip(offset.unwrap_or(0))
                .take(limit.unwrap_or(usize::MAX))
                .collect();
        }

        Ok(ApiResponse::new(stored.meta.clone(), items))
    }

    /// Number of page requests served so far
    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    /// Every page request served so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock_calls().clone()
    }

    fn filter_for(&self, key: &str) -> Option<FilterFn> {
        FilterKey::from_param(key)
            .map(FilterKey::predicate)
            .or_else(|| self.extra_filters.get(key).copied())
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<RecordedCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PageFetcher for MockMetadataApi {
    async fn fetch_page(&self, url: &str, params: Option<&QueryParams>) -> Result<ApiResponse> {
        self.lock_calls().push(RecordedCall {
            url: url.to_string(),
            params: params.cloned(),
        });
        let response = self.respond(url, params)?;
        trace!("Mock served {} items for {}", response.len(), url);
        Ok(response)
    }
}

fn parse_cursor(key: &str, values: &[String]) -> Result<usize> {
    let first = values.first().map_or("", String::as_str);
    first
        .parse()
        .map_err(|_| Error::invalid_value(key, format!("expected a count, got '{first}'")))
}
