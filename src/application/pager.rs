//! Cursor pager: one backend request per page, no retries, no reordering.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use futures::Stream;
use metrics::histogram;
use tracing::{debug, instrument, warn};

use crate::application::backend::FeedBackend;
use crate::application::error::FeedError;
use crate::application::pagination::{Page, PageRequest};
use crate::cache::FeedIdentity;

const METRIC_FETCH_PAGE_MS: &str = "murmur_fetch_page_ms";

#[derive(Clone)]
pub struct CursorPager {
    backend: Arc<dyn FeedBackend>,
    page_size: NonZeroU32,
}

impl CursorPager {
    pub fn new(backend: Arc<dyn FeedBackend>, page_size: NonZeroU32) -> Self {
        Self { backend, page_size }
    }

    pub fn page_size(&self) -> NonZeroU32 {
        self.page_size
    }

    /// Fetch the page of `identity` after `cursor` (`None` = first page).
    ///
    /// At most one backend request per call; on failure no partial page is
    /// returned and nothing is retried.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn fetch_page(
        &self,
        identity: &FeedIdentity,
        cursor: Option<&str>,
    ) -> Result<Page, FeedError> {
        let started_at = Instant::now();
        let request = PageRequest::new(self.page_size.get(), cursor.map(str::to_string));
        let result = self.backend.fetch_feed_page(identity, request).await;

        histogram!(
            METRIC_FETCH_PAGE_MS,
            "scope" => identity.scope().as_str(),
            "result" => if result.is_ok() { "ok" } else { "error" }
        )
        .record(started_at.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(page) => {
                debug!(
                    tweets = page.tweets.len(),
                    terminal = page.is_terminal(),
                    "Feed page fetched"
                );
                Ok(page)
            }
            Err(cause) => {
                warn!(error = %cause, "Feed page fetch failed");
                Err(FeedError::FetchFailed {
                    identity: identity.clone(),
                    cursor: cursor.map(str::to_string),
                    cause,
                })
            }
        }
    }

    /// Lazily walk every page of `identity` from the start.
    ///
    /// Each call starts a fresh sequence; the stream ends after the terminal
    /// page or at the first error.
    pub fn pages(&self, identity: FeedIdentity) -> impl Stream<Item = Result<Page, FeedError>> + '_ {
        async_stream::try_stream! {
            let mut cursor: Option<String> = None;
            loop {
                let page = self.fetch_page(&identity, cursor.as_deref()).await?;
                let next = page.next_cursor.clone();
                yield page;
                match next {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
        }
    }
}
