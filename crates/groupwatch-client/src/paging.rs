use crate::retry::RateLimitRetry;
use groupwatch_core::{ApiError, ApiResult, Page, PageRequest, PagingConfig};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Why a paged listing stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The server reported no further pages
    Exhausted,
    /// The caller's item cap was hit before the listing ended
    CapReached,
    /// `max_pages` pages were fetched and the server still had more
    PageLimit,
    /// A page failed; items gathered before it are kept
    Failed(ApiError),
}

#[derive(Debug, Clone)]
pub struct FetchAll<T> {
    pub items: Vec<T>,
    pub pages: usize,
    pub stop: StopReason,
}

impl<T> FetchAll<T> {
    /// True when every page was retrieved.
    pub fn is_complete(&self) -> bool {
        self.stop == StopReason::Exhausted
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Walks a paginated endpoint page by page.
#[derive(Debug, Clone)]
pub struct PagedFetcher {
    page_size: u32,
    page_delay: Duration,
    max_pages: usize,
    retry: RateLimitRetry,
}

impl PagedFetcher {
    pub fn new(page_size: u32, page_delay: Duration, max_pages: usize, retry: RateLimitRetry) -> Self {
        Self {
            page_size,
            page_delay,
            max_pages,
            retry,
        }
    }

    pub fn from_config(config: &PagingConfig) -> Self {
        Self::new(
            config.page_size,
            config.page_delay(),
            config.max_pages,
            RateLimitRetry::from_config(config),
        )
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn retry(&self) -> &RateLimitRetry {
        &self.retry
    }

    /// Fetch every page (or up to `cap` items) via `fetch_page`.
    ///
    /// Throttled pages are retried in place without advancing the cursor.
    /// Any other failure ends the walk and returns what was gathered so far.
    pub async fn fetch_all<T, F, Fut>(
        &self,
        what: &str,
        cap: Option<usize>,
        mut fetch_page: F,
    ) -> FetchAll<T>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = ApiResult<Page<T>>>,
    {
        let mut items = Vec::new();
        let mut pages = 0;
        let mut request = PageRequest::first(self.page_size);

        if cap == Some(0) {
            return FetchAll {
                items,
                pages,
                stop: StopReason::CapReached,
            };
        }

        let stop = loop {
            if pages >= self.max_pages {
                warn!(
                    "{}: stopped after {} pages, server still reports more",
                    what, pages
                );
                break StopReason::PageLimit;
            }

            let page = match self.retry.run(what, || fetch_page(request.clone())).await {
                Ok(page) => page,
                Err(e) => {
                    debug!("{}: page {} failed: {}", what, pages + 1, e);
                    break StopReason::Failed(e);
                }
            };
            pages += 1;

            let has_more = page.next.is_some();
            items.extend(page.items);
            debug!("{}: page {} done, {} items so far", what, pages, items.len());

            if let Some(cap) = cap {
                if items.len() > cap || (items.len() == cap && has_more) {
                    items.truncate(cap);
                    break StopReason::CapReached;
                }
            }

            match page.next {
                None => break StopReason::Exhausted,
                Some(next) => {
                    request = PageRequest {
                        cursor: Some(next),
                        limit: self.page_size,
                    };
                    if !self.page_delay.is_zero() {
                        tokio::time::sleep(self.page_delay).await;
                    }
                }
            }
        };

        FetchAll { items, pages, stop }
    }
}
