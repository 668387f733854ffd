//! Lazy pagination over a feed endpoint
//!
//! A session starts with a one-record probe that captures `TotalResults`. That
//! total is a snapshot: pages are then requested at increasing offsets until
//! the cumulative number of returned records reaches it, and it is never
//! re-queried. Records arriving mid-session are left for the next session.

use crate::error::Result;
use crate::feed::client::{FeedClient, FeedQuery};
use crate::feed::types::FeedResponse;
use futures::Stream;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, warn};

/// The API refuses larger pages.
pub const MAX_PAGE_SIZE: u64 = 100;

/// One batch of records and where it sits in the session.
#[derive(Debug)]
pub struct Page<T> {
    /// Offset the page was requested at
    pub offset: u64,
    /// Session total captured by the probe
    pub total_count: u64,
    pub response: FeedResponse<T>,
}

impl<T> Page<T> {
    pub fn returned_count(&self) -> u64 {
        self.response.results.len() as u64
    }
}

/// A probed pagination session.
pub struct Pager<'a> {
    client: &'a FeedClient,
    query: FeedQuery,
    page_size: u64,
    total_count: u64,
}

impl<'a> Pager<'a> {
    /// Probe the endpoint and capture the session total.
    pub async fn open(client: &'a FeedClient, query: FeedQuery, page_size: u64) -> Result<Self> {
        let probe: FeedResponse<IgnoredAny> = client.fetch_page(&query, 0, 1).await?;
        debug!(endpoint = %query.path, total = probe.total_results, "Probed feed");

        Ok(Self {
            client,
            query,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            total_count: probe.total_results,
        })
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Consume the session as a stream of pages.
    ///
    /// The stream ends once the returned records add up to the probed total,
    /// or early if the API returns an empty page. The first error ends it too;
    /// nothing is retried.
    pub fn pages<T>(self) -> impl Stream<Item = Result<Page<T>>> + 'a
    where
        T: DeserializeOwned + 'a,
    {
        futures::stream::try_unfold((self, 0u64), |(pager, captured)| pager.next_page(captured))
    }

    async fn next_page<T: DeserializeOwned>(
        self,
        captured: u64,
    ) -> Result<Option<(Page<T>, (Self, u64))>> {
        if captured >= self.total_count {
            return Ok(None);
        }

        let response: FeedResponse<T> = self
            .client
            .fetch_page(&self.query, captured, self.page_size)
            .await?;

        let returned = response.results.len() as u64;
        if returned == 0 {
            warn!(
                endpoint = %self.query.path,
                captured,
                total = self.total_count,
                "Feed returned an empty page before reaching its total; ending session"
            );
            return Ok(None);
        }

        let page = Page {
            offset: captured,
            total_count: self.total_count,
            response,
        };
        Ok(Some((page, (self, captured + returned))))
    }
}
