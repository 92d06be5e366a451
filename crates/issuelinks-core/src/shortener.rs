//! Shortening service seam and the per-pair worker
//!
//! [`Shortener`] is the only contact with the external service. A
//! [`ShorteningWorker`] wraps one call for one request and always turns it
//! into exactly one [`ShortenResult`]: timeouts, service errors and
//! cancellation all become a failed outcome instead of a missing result.

use crate::config::AnnotateConfig;
use crate::error::ShortenError;
use crate::types::{ShortLink, ShortenRequest, ShortenResult};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Upper bound for a single retry backoff
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// URL shortening service
///
/// Implement this trait to plug in a real client. Implementations may be
/// slow and may fail; the worker bounds and classifies both.
#[async_trait::async_trait]
pub trait Shortener: Send + Sync {
    /// Shorten `long_url`
    async fn shorten(&self, long_url: &str) -> Result<ShortLink, ShortenError>;
}

/// Timeout, retry and formatting settings for workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Per-attempt timeout
    pub request_timeout: Duration,
    /// Extra attempts for retryable failures
    pub max_retries: u32,
    /// Backoff before the first retry, doubled after each
    pub retry_backoff: Duration,
    /// Strip the scheme from short URLs
    pub strip_scheme: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from(&AnnotateConfig::default())
    }
}

impl From<&AnnotateConfig> for WorkerSettings {
    fn from(config: &AnnotateConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
            strip_scheme: config.strip_scheme,
        }
    }
}

/// Runs one shortening request to completion
#[derive(Clone)]
pub struct ShorteningWorker {
    shortener: Arc<dyn Shortener>,
    settings: WorkerSettings,
}

impl std::fmt::Debug for ShorteningWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShorteningWorker")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ShorteningWorker {
    /// Create new worker
    #[inline]
    #[must_use]
    pub fn new(shortener: Arc<dyn Shortener>, settings: WorkerSettings) -> Self {
        Self {
            shortener,
            settings,
        }
    }

    /// Worker settings
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Shorten the request's URL and report the outcome
    ///
    /// Never fails: every path yields one result for `request`.
    pub async fn run(&self, request: ShortenRequest, cancel: &CancellationToken) -> ShortenResult {
        let outcome = if cancel.is_cancelled() {
            Err(ShortenError::Cancelled)
        } else {
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(ShortenError::Cancelled),
                outcome = self.shorten_with_retry(&request.long_url) => outcome,
            }
        };

        let outcome = match outcome {
            Ok(link) if self.settings.strip_scheme => Ok(link.without_scheme()),
            other => other,
        };

        match &outcome {
            Err(ShortenError::Cancelled) => tracing::debug!(
                "Shortening '{}' for issue #{} cancelled",
                request.spec_name,
                request.issue_index
            ),
            Err(e) => tracing::warn!(
                "Shortening '{}' for issue #{} failed: {}",
                request.spec_name,
                request.issue_index,
                e
            ),
            Ok(_) => {}
        }

        ShortenResult::for_request(request, outcome)
    }

    /// Call the service, retrying retryable failures with backoff
    async fn shorten_with_retry(&self, long_url: &str) -> Result<ShortLink, ShortenError> {
        let mut attempt = 0;
        let mut delay = self.settings.retry_backoff.min(MAX_BACKOFF);

        loop {
            match self.attempt(long_url).await {
                Ok(link) => {
                    if attempt > 0 {
                        tracing::info!("Shortened {} after {} retries", long_url, attempt);
                    }
                    return Ok(link);
                }
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "Retrying {} in {:?} (attempt {}/{}): {}",
                        long_url,
                        delay,
                        attempt,
                        self.settings.max_retries,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_BACKOFF);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One bounded call
    async fn attempt(&self, long_url: &str) -> Result<ShortLink, ShortenError> {
        let timeout = self.settings.request_timeout;
        match tokio::time::timeout(timeout, self.shortener.shorten(long_url)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ShortenError::TimedOut {
                after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}
