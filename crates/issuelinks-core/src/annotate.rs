//! Annotation entry point
//!
//! [`LinkAnnotator`] drives one run end to end:
//!
//! 1. Read the issue keys and expand every (issue, spec) pair
//! 2. Fan the pairs out to concurrent shortening workers
//! 3. Aggregate completions into the result table on this task
//! 4. Merge the frozen table back onto the issues
//!
//! The call returns only after every pair completed (or the run was stopped)
//! and the table was merged. No worker is left running afterwards.

use crate::aggregate::ResultAggregator;
use crate::config::AnnotateConfig;
use crate::dispatch::FanOutDispatcher;
use crate::error::{AnnotateError, RoutingError};
use crate::merge::{merge_links, IssueRecord};
use crate::shortener::{Shortener, ShorteningWorker, WorkerSettings};
use crate::source::IssueDocument;
use crate::spec::LinkSpecRegistry;
use crate::types::RunId;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Summary of one annotation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotationReport {
    /// Run identifier, also recorded on the tracing span
    pub run_id: RunId,
    /// Number of issues annotated
    pub issues: usize,
    /// Number of link specs applied
    pub specs: usize,
    /// Number of (issue, spec) pairs dispatched
    pub pairs: usize,
    /// Pairs that ended in a failure
    pub failures: usize,
    /// Results that could not be placed
    pub routing_errors: Vec<RoutingError>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl AnnotationReport {
    /// Check if every pair produced a short link
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures == 0 && self.routing_errors.is_empty()
    }
}

/// Annotated issues with the run report
#[derive(Debug, Clone)]
pub struct Annotated<I> {
    /// Issues in input order, each carrying its link map
    pub issues: Vec<I>,
    /// Run summary
    pub report: AnnotationReport,
}

/// Annotated search document with the run report
#[derive(Debug, Clone)]
pub struct AnnotatedJson {
    /// Input document with link maps attached
    pub document: serde_json::Value,
    /// Run summary
    pub report: AnnotationReport,
}

/// Annotates issues with short links for every registered spec
#[derive(Debug, Clone)]
pub struct LinkAnnotator {
    registry: LinkSpecRegistry,
    config: AnnotateConfig,
    dispatcher: FanOutDispatcher,
}

impl LinkAnnotator {
    /// Create annotator
    ///
    /// # Errors
    /// `AnnotateError::Config` if `config` does not validate.
    pub fn new(
        shortener: Arc<dyn Shortener>,
        registry: LinkSpecRegistry,
        config: AnnotateConfig,
    ) -> Result<Self, AnnotateError> {
        config.validate()?;

        let worker = ShorteningWorker::new(shortener, WorkerSettings::from(&config));
        let dispatcher = FanOutDispatcher::new(worker, config.concurrency_limit);

        Ok(Self {
            registry,
            config,
            dispatcher,
        })
    }

    /// Create annotator using the links declared in `config`
    ///
    /// # Errors
    /// `AnnotateError::Registry` if the declared links are invalid, or
    /// `AnnotateError::Config` if `config` does not validate.
    pub fn from_config(shortener: Arc<dyn Shortener>, config: AnnotateConfig) -> Result<Self, AnnotateError> {
        let registry = LinkSpecRegistry::from_config(&config)?;
        Self::new(shortener, registry, config)
    }

    /// Registered link specs
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &LinkSpecRegistry {
        &self.registry
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &AnnotateConfig {
        &self.config
    }

    /// Annotate `issues`, returning them in input order
    ///
    /// # Errors
    /// See [`LinkAnnotator::annotate_with_cancel`].
    pub async fn annotate<I: IssueRecord>(&self, issues: Vec<I>) -> Result<Annotated<I>, AnnotateError> {
        self.annotate_with_cancel(issues, CancellationToken::new()).await
    }

    /// Annotate `issues`, stopping early if `cancel` fires
    ///
    /// Per-pair failures do not fail the run under the default policy; they
    /// are recorded in the affected issue's link map.
    ///
    /// # Errors
    /// - `AnnotateError::Incomplete` on cancellation, overall deadline, or
    ///   lost workers, carrying the partial table
    /// - `AnnotateError::PairFailed` / `AnnotateError::Routing` under
    ///   fail-fast
    /// - `AnnotateError::LengthMismatch` if merging is impossible
    pub async fn annotate_with_cancel<I: IssueRecord>(
        &self,
        issues: Vec<I>,
        cancel: CancellationToken,
    ) -> Result<Annotated<I>, AnnotateError> {
        let run_id = RunId::new();
        let span = tracing::info_span!("annotate", run_id = %run_id);
        self.run(run_id, issues, cancel).instrument(span).await
    }

    /// Annotate an issue search document in place
    ///
    /// Each issue object gets its link map under the configured
    /// `link_field`; every other field is kept as is.
    ///
    /// The document is consumed. If the run fails, only the partial result
    /// table in `AnnotateError::Incomplete` survives; callers that need the
    /// original document afterwards should keep a copy.
    ///
    /// # Errors
    /// `AnnotateError::Source` if the document shape is wrong, otherwise as
    /// [`LinkAnnotator::annotate_with_cancel`].
    pub async fn annotate_json(&self, value: serde_json::Value) -> Result<AnnotatedJson, AnnotateError> {
        let mut document = IssueDocument::from_value(value, &self.config.link_field)?;

        let Annotated { issues, report } = self.annotate(document.take_issues()).await?;
        document.set_issues(issues);

        Ok(AnnotatedJson {
            document: document.into_value(),
            report,
        })
    }

    async fn run<I: IssueRecord>(
        &self,
        run_id: RunId,
        mut issues: Vec<I>,
        cancel: CancellationToken,
    ) -> Result<Annotated<I>, AnnotateError> {
        let started = Instant::now();
        let keys: Arc<[String]> = issues.iter().map(|i| i.issue_key().to_string()).collect();
        let specs = self.registry.len();

        if keys.is_empty() {
            tracing::debug!("No issues to annotate");
            return Ok(Annotated {
                issues,
                report: AnnotationReport {
                    run_id,
                    issues: 0,
                    specs,
                    pairs: 0,
                    failures: 0,
                    routing_errors: Vec::new(),
                    elapsed: started.elapsed(),
                },
            });
        }

        tracing::info!(
            "Annotating {} issues with {} link specs ({} pairs)",
            keys.len(),
            specs,
            keys.len() * specs
        );

        let run_cancel = cancel.child_token();
        let deadline = self
            .config
            .overall_timeout()
            .map(|timeout| tokio::time::Instant::now() + timeout);

        let mut dispatch = self.dispatcher.dispatch(&keys, &self.registry, &run_cancel);
        let pairs = dispatch.expected;

        let aggregator = ResultAggregator::new(Arc::clone(&keys), &self.registry, self.config.failure_policy);
        let collected = aggregator
            .collect(&mut dispatch.receiver, &run_cancel, deadline)
            .await;

        if collected.is_err() {
            run_cancel.cancel();
        }
        let panicked = dispatch.shutdown().await;
        if panicked > 0 {
            tracing::error!("{} shortening workers panicked", panicked);
        }

        let outcome = match collected {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Annotation run failed: {}", e);
                return Err(e);
            }
        };

        merge_links(&mut issues, outcome.table)?;

        let report = AnnotationReport {
            run_id,
            issues: issues.len(),
            specs,
            pairs,
            failures: outcome.failures,
            routing_errors: outcome.routing_errors,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Annotated {} issues: {} pairs, {} failed, {} unroutable in {:?}",
            report.issues,
            report.pairs,
            report.failures,
            report.routing_errors.len(),
            report.elapsed
        );

        Ok(Annotated { issues, report })
    }
}
