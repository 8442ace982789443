//! Page-number pagination over a remote collection.

use std::future::Future;

use serde_json::Value;

use super::{RateLimitedExecutor, RemoteClient, RemoteError};
use crate::models::EntityType;

/// Records requested per page.
pub const PAGE_SIZE: u32 = 100;

/// Anything that can return one 1-indexed page of a remote collection.
pub trait PageSource: Sync {
    fn fetch_page(
        &self,
        entity: EntityType,
        page: u32,
        per_page: u32,
    ) -> impl Future<Output = Result<Vec<Value>, RemoteError>> + Send;
}

impl PageSource for RemoteClient {
    fn fetch_page(
        &self,
        entity: EntityType,
        page: u32,
        per_page: u32,
    ) -> impl Future<Output = Result<Vec<Value>, RemoteError>> + Send {
        self.list_page(entity, page, per_page)
    }
}

/// Lazy page cursor. Each page request goes through the executor; the stream
/// ends at the first empty page and stays ended until [`PageStream::restart`].
#[derive(Debug)]
pub struct PageStream<'a, S> {
    source: &'a S,
    executor: &'a RateLimitedExecutor,
    entity: EntityType,
    per_page: u32,
    next_page: u32,
    finished: bool,
    requests: usize,
}

impl<'a, S: PageSource> PageStream<'a, S> {
    pub const fn new(source: &'a S, executor: &'a RateLimitedExecutor, entity: EntityType) -> Self {
        Self {
            source,
            executor,
            entity,
            per_page: PAGE_SIZE,
            next_page: 1,
            finished: false,
            requests: 0,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Page requests that produced a response, not counting rate-limited retries.
    pub const fn requests(&self) -> usize {
        self.requests
    }

    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn restart(&mut self) {
        self.next_page = 1;
        self.finished = false;
    }

    pub async fn next_page(&mut self) -> Result<Option<Vec<Value>>, RemoteError> {
        if self.finished {
            return Ok(None);
        }
        if self.executor.is_cancelled() {
            return Err(RemoteError::Cancelled);
        }

        let page = self.next_page;
        let (source, entity, per_page) = (self.source, self.entity, self.per_page);
        let operation = format!("list {} page {page}", entity.remote_path());
        let items = self
            .executor
            .execute(&operation, || source.fetch_page(entity, page, per_page))
            .await?;
        self.requests += 1;

        if items.is_empty() {
            self.finished = true;
            tracing::debug!(entity = %entity, pages = page - 1, "Reached end of remote collection");
            return Ok(None);
        }

        self.next_page += 1;
        Ok(Some(items))
    }
}

/// Fetch every record of `entity`. Any page failure discards what was gathered.
pub async fn fetch_all<S: PageSource>(
    source: &S,
    executor: &RateLimitedExecutor,
    entity: EntityType,
) -> Result<Vec<Value>, RemoteError> {
    let mut stream = PageStream::new(source, executor, entity);
    let mut records = Vec::new();
    while let Some(page) = stream.next_page().await? {
        records.extend(page);
    }

    tracing::debug!(
        entity = %entity,
        records = records.len(),
        requests = stream.requests(),
        "Fetched remote collection"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct FixedSource {
        total: u32,
        calls: Mutex<Vec<u32>>,
        fail_on: Option<u32>,
        rate_limit_once_on: Option<u32>,
        rate_limited: AtomicBool,
    }

    impl FixedSource {
        fn new(total: u32) -> Self {
            Self {
                total,
                calls: Mutex::new(Vec::new()),
                fail_on: None,
                rate_limit_once_on: None,
                rate_limited: AtomicBool::new(false),
            }
        }

        fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }

        fn page(&self, page: u32, per_page: u32) -> Result<Vec<Value>, RemoteError> {
            if self.fail_on == Some(page) {
                return Err(RemoteError::Status {
                    status: 500,
                    body: "internal error".to_string(),
                });
            }
            if self.rate_limit_once_on == Some(page) && !self.rate_limited.swap(true, Ordering::SeqCst)
            {
                return Err(RemoteError::RateLimited {
                    retry_after: Some(std::time::Duration::from_secs(1)),
                });
            }
            let start = (page - 1) * per_page;
            let end = (start + per_page).min(self.total);
            Ok((start..end).map(|id| json!({"id": id + 1})).collect())
        }
    }

    impl PageSource for FixedSource {
        fn fetch_page(
            &self,
            _entity: EntityType,
            page: u32,
            per_page: u32,
        ) -> impl Future<Output = Result<Vec<Value>, RemoteError>> + Send {
            self.calls.lock().unwrap().push(page);
            std::future::ready(self.page(page, per_page))
        }
    }

    #[tokio::test]
    async fn fetches_until_first_empty_page() {
        let source = FixedSource::new(250);
        let records = fetch_all(&source, &RateLimitedExecutor::default(), EntityType::Product)
            .await
            .unwrap();

        assert_eq!(records.len(), 250);
        assert_eq!(source.calls(), vec![1, 2, 3, 4]);
        assert_eq!(records[249]["id"], 250);
    }

    #[tokio::test]
    async fn empty_collection_costs_one_request() {
        let source = FixedSource::new(0);
        let records = fetch_all(&source, &RateLimitedExecutor::default(), EntityType::Customer)
            .await
            .unwrap();

        assert!(records.is_empty());
        assert_eq!(source.calls(), vec![1]);
    }

    #[tokio::test]
    async fn page_failure_discards_partial_results() {
        let mut source = FixedSource::new(250);
        source.fail_on = Some(2);

        let error = fetch_all(&source, &RateLimitedExecutor::default(), EntityType::Order)
            .await
            .unwrap_err();

        assert_eq!(error.status(), Some(500));
        assert_eq!(source.calls(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_page_is_retried_in_place() {
        let mut source = FixedSource::new(150);
        source.rate_limit_once_on = Some(2);

        let records = fetch_all(&source, &RateLimitedExecutor::default(), EntityType::Product)
            .await
            .unwrap();

        assert_eq!(records.len(), 150);
        assert_eq!(source.calls(), vec![1, 2, 2, 3]);
    }

    #[tokio::test]
    async fn stream_stays_finished_until_restarted() {
        let source = FixedSource::new(5);
        let executor = RateLimitedExecutor::default();
        let mut stream = PageStream::new(&source, &executor, EntityType::Product).with_page_size(2);

        let mut seen = 0;
        while let Some(page) = stream.next_page().await.unwrap() {
            seen += page.len();
        }
        assert_eq!(seen, 5);
        assert!(stream.is_finished());
        assert_eq!(stream.next_page().await.unwrap(), None);
        assert_eq!(stream.requests(), 4);

        stream.restart();
        assert_eq!(stream.next_page().await.unwrap().map(|p| p.len()), Some(2));
    }
}
