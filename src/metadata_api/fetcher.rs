//! Paginated fetching over a single-page primitive
//!
//! Some metadata endpoints paginate and some do not, and the only way to tell
//! is to look at the first response. [`PaginatingFetcher::fetch_all`] makes
//! that first request, then either returns it as-is or walks the remaining
//! pages with `_limit`/`_offset` until an empty page comes back.

use super::types::{ApiResponse, QueryParams, LIMIT_PARAM, OFFSET_PARAM, PAGE_SIZE};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fetches exactly one page for a URL and parameter set
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Issue a single request. `None` means no query string at all, which
    /// some endpoints treat differently from an empty one.
    async fn fetch_page(&self, url: &str, params: Option<&QueryParams>) -> Result<ApiResponse>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch_page(&self, url: &str, params: Option<&QueryParams>) -> Result<ApiResponse> {
        (**self).fetch_page(url, params).await
    }
}

/// Assembles the complete result set for a request, page by page
#[derive(Debug, Clone)]
pub struct PaginatingFetcher<F> {
    fetcher: F,
    page_size: usize,
    cancel: Option<CancellationToken>,
}

impl<F: PageFetcher> PaginatingFetcher<F> {
    /// Wrap a page fetcher using the default page size
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            page_size: PAGE_SIZE,
            cancel: None,
        }
    }

    /// Set the number of items requested per follow-up page
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Abort between pages once `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Items requested per follow-up page
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// The underlying single-page fetcher
    pub fn inner(&self) -> &F {
        &self.fetcher
    }

    /// Fetch the full logical result set for `url`
    ///
    /// Without params a single request is made and returned verbatim. With
    /// params, the first response decides: no `meta.limit`, or fewer items
    /// than the limit, ends the fetch there. Otherwise pages are requested
    /// at `_offset = page_size, 2 * page_size, ...` until one is empty.
    /// The returned `meta` is always the first page's.
    ///
    /// Any failure aborts the whole fetch; no partial result is returned.
    pub async fn fetch_all(&self, url: &str, params: Option<QueryParams>) -> Result<ApiResponse> {
        let Some(mut params) = params else {
            return self.fetcher.fetch_page(url, None).await;
        };

        let initial = self.fetcher.fetch_page(url, Some(&params)).await?;

        let Some(limit) = initial.page_limit()? else {
            debug!("{} does not paginate, returning single response", url);
            return Ok(initial);
        };

        if initial.items.len() < limit {
            return Ok(initial);
        }

        if self.page_size == 0 {
            return Err(Error::invalid_value("page_size", "must be at least 1"));
        }

        let ApiResponse { meta, mut items } = initial;

        params.set(LIMIT_PARAM, self.page_size.to_string());
        let mut offset = 0;

        loop {
            self.check_cancelled(url)?;

            offset += self.page_size;
            params.set(OFFSET_PARAM, offset.to_string());

            let page = self.fetcher.fetch_page(url, Some(&params)).await?;
            debug!("Fetched {} items from {} at offset {}", page.len(), url, offset);

            if page.items.is_empty() {
                break;
            }
            items.extend(page.items);
        }

        debug!("Assembled {} items from {}", items.len(), url);
        Ok(ApiResponse { meta, items })
    }

    fn check_cancelled(&self, url: &str) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled {
                url: url.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
