//! Metadata API client
//!
//! Endpoint helpers for a sensor network's metadata, all routed through
//! [`PaginatingFetcher`] so callers always receive complete result sets.

use super::fetcher::{PageFetcher, PaginatingFetcher};
use super::types::{ApiResponse, QueryParams};
use crate::config::MetadataApiSettings;
use crate::error::Result;
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error};

/// Single-page fetcher backed by HTTP GET requests
#[derive(Debug)]
pub struct HttpPageFetcher {
    http: HttpClient,
    network: String,
}

impl HttpPageFetcher {
    /// Create a fetcher; `network` is only used to label log messages
    pub fn new(http: HttpClient, network: impl Into<String>) -> Self {
        Self {
            http,
            network: network.into(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str, params: Option<&QueryParams>) -> Result<ApiResponse> {
        let request = match params {
            Some(params) => RequestConfig::new().query_pairs(params.to_pairs()),
            None => RequestConfig::new(),
        };

        debug!("Trying to access: {}", url);
        let body = self.http.get_json(url, &request).await.map_err(|e| {
            error!("Failed to fetch {} data: {}", self.network, e);
            e
        })?;

        ApiResponse::from_json(body)
    }
}

/// Client for the metadata API of one sensor network
#[derive(Debug)]
pub struct MetadataApiClient<F = HttpPageFetcher> {
    host: String,
    network: String,
    fetcher: PaginatingFetcher<F>,
}

impl MetadataApiClient<HttpPageFetcher> {
    /// Create an HTTP client with default transport settings
    pub fn new(host: impl Into<String>, network: impl Into<String>) -> Result<Self> {
        let network = network.into();
        let http = HttpClient::new()?;
        Ok(Self::with_fetcher(
            host,
            network.clone(),
            HttpPageFetcher::new(http, network),
        ))
    }

    /// Create an HTTP client from settings
    pub fn from_settings(settings: &MetadataApiSettings) -> Result<Self> {
        let mut builder = HttpClientConfig::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .max_retries(settings.max_retries);
        if let Some(rate_limit) = &settings.rate_limit {
            builder = builder.rate_limit(rate_limit.clone());
        }

        let http = HttpClient::with_config(builder.build())?;
        let fetcher = HttpPageFetcher::new(http, settings.network.clone());

        Ok(
            Self::with_fetcher(settings.host.clone(), settings.network.clone(), fetcher)
                .with_page_size(settings.page_size),
        )
    }
}

impl<F: PageFetcher> MetadataApiClient<F> {
    /// Create a client over any single-page fetcher
    pub fn with_fetcher(host: impl Into<String>, network: impl Into<String>, fetcher: F) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            network: network.into(),
            fetcher: PaginatingFetcher::new(fetcher),
        }
    }

    /// Set the page size used for follow-up pages
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.fetcher = self.fetcher.with_page_size(page_size);
        self
    }

    /// Host URL of the API
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Sensor network being queried
    pub fn network(&self) -> &str {
        &self.network
    }

    /// The paginating fetcher used by every endpoint
    pub fn fetcher(&self) -> &PaginatingFetcher<F> {
        &self.fetcher
    }

    /// Fetch every site of the network
    pub async fn fetch_sites(&self) -> Result<ApiResponse> {
        let url = format!("{}/id/network/{}", self.host, self.network);
        self.fetcher.fetch_all(&url, None).await
    }

    /// Fetch metadata for a single site
    pub async fn fetch_site_metadata(&self, site_id: &str) -> Result<ApiResponse> {
        let url = format!("{}/id/site/{site_id}", self.host);
        self.fetcher.fetch_all(&url, None).await
    }

    /// Fetch processing configurations (infill, QC and/or correction)
    pub async fn fetch_processing_configs(
        &self,
        params: impl Into<QueryParams>,
    ) -> Result<ApiResponse> {
        let url = format!("{}/id/data-processing-configuration.json", self.host);
        self.fetcher.fetch_all(&url, Some(params.into())).await
    }

    /// Fetch metadata for one or more time series datasets
    pub async fn fetch_timeseries_metadata(
        &self,
        params: impl Into<QueryParams>,
    ) -> Result<ApiResponse> {
        let url = format!("{}/id/dataset", self.host);
        self.fetcher.fetch_all(&url, Some(params.into())).await
    }

    /// Fetch the metadata of the datasets a time series depends on
    pub async fn fetch_dependent_dataset_metadata(&self, timeseries_id: &str) -> Result<ApiResponse> {
        let url = format!("{}/id/dataset/{timeseries_id}/_dependencies", self.host);
        self.fetcher.fetch_all(&url, None).await
    }

    /// Fetch derivation metadata for a time series definition
    pub async fn fetch_timeseries_derivation_metadata(
        &self,
        timeseries_def: &str,
    ) -> Result<ApiResponse> {
        let url = format!("{}/ref/time-series-definition", self.host);
        let params = QueryParams::map([("_view", "derivation"), ("@id", timeseries_def)]);
        self.fetcher.fetch_all(&url, Some(params)).await
    }
}
