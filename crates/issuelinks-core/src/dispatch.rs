//! Fan-out dispatcher
//!
//! Expands (issue × spec) into [`ShortenRequest`]s and spawns one task per
//! request. Tasks are spawned immediately; a shared semaphore caps how many
//! of them are inside the shortening service at once. Each task sends its
//! single [`ShortenResult`] over the completion channel and touches no other
//! shared state.

use crate::error::ShortenError;
use crate::shortener::ShorteningWorker;
use crate::spec::LinkSpecRegistry;
use crate::types::{ShortenRequest, ShortenResult};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// In-flight work of one dispatch
#[derive(Debug)]
pub struct Dispatch {
    /// Completion channel, one message per request
    pub receiver: mpsc::Receiver<ShortenResult>,
    /// Number of requests dispatched
    pub expected: usize,
    tasks: JoinSet<()>,
}

impl Dispatch {
    /// Abort unfinished workers and reap all tasks
    ///
    /// Returns the number of workers that panicked.
    pub async fn shutdown(mut self) -> usize {
        self.tasks.abort_all();
        self.receiver.close();

        let mut panicked = 0;
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    panicked += 1;
                    tracing::error!("Shortening worker panicked: {}", e);
                }
            }
        }
        panicked
    }
}

/// Launches one concurrent worker per (issue, spec) pair
#[derive(Debug, Clone)]
pub struct FanOutDispatcher {
    worker: ShorteningWorker,
    limit: Arc<Semaphore>,
    concurrency_limit: usize,
}

impl FanOutDispatcher {
    /// Create dispatcher allowing `concurrency_limit` calls in flight
    ///
    /// A limit of zero is raised to one.
    #[must_use]
    pub fn new(worker: ShorteningWorker, concurrency_limit: usize) -> Self {
        let concurrency_limit = concurrency_limit.max(1);
        Self {
            worker,
            limit: Arc::new(Semaphore::new(concurrency_limit)),
            concurrency_limit,
        }
    }

    /// Configured in-flight cap
    #[inline]
    #[must_use]
    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Build the request for every (issue, spec) pair, issue-major
    #[must_use]
    pub fn requests(issue_keys: &[String], registry: &LinkSpecRegistry) -> Vec<ShortenRequest> {
        let mut requests = Vec::with_capacity(issue_keys.len() * registry.len());
        for (issue_index, key) in issue_keys.iter().enumerate() {
            for (name, spec) in registry.entries() {
                requests.push(ShortenRequest {
                    issue_index,
                    spec_name: Arc::clone(name),
                    long_url: spec.expand(key),
                });
            }
        }
        requests
    }

    /// Spawn a worker for every pair and return without waiting on them
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(
        &self,
        issue_keys: &[String],
        registry: &LinkSpecRegistry,
        cancel: &CancellationToken,
    ) -> Dispatch {
        let requests = Self::requests(issue_keys, registry);
        let expected = requests.len();
        // Capacity covers every result, so workers never wait on the aggregator.
        let (sender, receiver) = mpsc::channel(expected.max(1));
        let mut tasks = JoinSet::new();

        for request in requests {
            let worker = self.worker.clone();
            let limit = Arc::clone(&self.limit);
            let sender = sender.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                tracing::debug!(
                    "Dispatching '{}' for issue #{}",
                    request.spec_name,
                    request.issue_index
                );

                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    permit = limit.acquire_owned() => permit.ok(),
                };

                let result = match permit {
                    Some(_permit) => worker.run(request, &cancel).await,
                    None => ShortenResult::for_request(request, Err(ShortenError::Cancelled)),
                };

                if sender.send(result).await.is_err() {
                    tracing::debug!("Aggregator stopped before result was delivered");
                }
            });
        }

        tracing::debug!(
            "Dispatched {} requests ({} issues x {} specs, limit {})",
            expected,
            issue_keys.len(),
            registry.len(),
            self.concurrency_limit
        );

        Dispatch {
            receiver,
            expected,
            tasks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortener::{Shortener, WorkerSettings};
    use crate::types::ShortLink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Tracks the highest number of concurrent calls
    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Shortener for Gauge {
        async fn shorten(&self, long_url: &str) -> Result<ShortLink, ShortenError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(ShortLink::new(format!("short:{long_url}"), long_url))
        }
    }

    fn registry() -> LinkSpecRegistry {
        LinkSpecRegistry::jira_and_stash("https://x", "https://y").unwrap()
    }

    fn keys(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("AB-{i}")).collect()
    }

    #[test]
    fn requests_cover_cross_product() {
        let requests = FanOutDispatcher::requests(&keys(3), &registry());

        assert_eq!(requests.len(), 6);
        assert_eq!(requests[0].issue_index, 0);
        assert_eq!(&*requests[0].spec_name, "jira");
        assert_eq!(requests[0].long_url, "https://x/browse/AB-1");
        assert_eq!(&*requests[5].spec_name, "stash");
        assert_eq!(requests[5].issue_index, 2);
        assert!(requests[5].long_url.ends_with("refs%2Fheads%2FAB-3"));
    }

    #[test]
    fn zero_limit_raised_to_one() {
        let worker = ShorteningWorker::new(Arc::new(Gauge::default()), WorkerSettings::default());
        assert_eq!(FanOutDispatcher::new(worker, 0).concurrency_limit(), 1);
    }

    #[tokio::test]
    async fn dispatch_delivers_one_result_per_request() {
        let worker = ShorteningWorker::new(Arc::new(Gauge::default()), WorkerSettings::default());
        let dispatcher = FanOutDispatcher::new(worker, 4);

        let mut dispatch = dispatcher.dispatch(&keys(5), &registry(), &CancellationToken::new());
        assert_eq!(dispatch.expected, 10);

        let mut received = Vec::new();
        while let Some(result) = dispatch.receiver.recv().await {
            received.push(result);
        }
        assert_eq!(received.len(), 10);
        assert!(received.iter().all(|r| r.outcome.is_ok()));
        assert_eq!(dispatch.shutdown().await, 0);
    }

    #[tokio::test]
    async fn dispatch_respects_concurrency_limit() {
        let gauge = Arc::new(Gauge::default());
        let worker = ShorteningWorker::new(gauge.clone(), WorkerSettings::default());
        let dispatcher = FanOutDispatcher::new(worker, 3);

        let mut dispatch = dispatcher.dispatch(&keys(10), &registry(), &CancellationToken::new());
        for _ in 0..dispatch.expected {
            assert!(dispatch.receiver.recv().await.is_some());
        }

        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {peak} exceeded limit");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn cancelled_dispatch_reports_cancelled_results() {
        let worker = ShorteningWorker::new(Arc::new(Gauge::default()), WorkerSettings::default());
        let dispatcher = FanOutDispatcher::new(worker, 2);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut dispatch = dispatcher.dispatch(&keys(2), &registry(), &cancel);
        let mut cancelled = 0;
        while let Some(result) = dispatch.receiver.recv().await {
            assert_eq!(result.outcome, Err(ShortenError::Cancelled));
            cancelled += 1;
        }
        assert_eq!(cancelled, 4);
    }

    #[tokio::test]
    async fn empty_dispatch_closes_channel() {
        let worker = ShorteningWorker::new(Arc::new(Gauge::default()), WorkerSettings::default());
        let dispatcher = FanOutDispatcher::new(worker, 2);

        let mut dispatch = dispatcher.dispatch(&[], &registry(), &CancellationToken::new());
        assert_eq!(dispatch.expected, 0);
        assert!(dispatch.receiver.recv().await.is_none());
    }
}
