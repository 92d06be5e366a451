//! Result aggregator
//!
//! The aggregator is the only writer to the [`ResultTable`]. It consumes
//! completions in arrival order and writes each into the slot for its issue
//! index under its spec name.
//!
//! # Critical Invariant
//!
//! Each (issue, spec) pair is written at most once, and only here. Workers
//! never see the table; they hand their result over the completion channel
//! and give up ownership of it.

use crate::config::FailurePolicy;
use crate::error::{AnnotateError, IncompleteReason, RoutingError};
use crate::spec::LinkSpecRegistry;
use crate::types::{ResultTable, ShortenResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Everything the aggregator produced for a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOutcome {
    /// Filled table, one slot per issue
    pub table: ResultTable,
    /// Results consumed from the channel
    pub received: usize,
    /// Results that could not be placed
    pub routing_errors: Vec<RoutingError>,
    /// Pairs recorded as failed
    pub failures: usize,
}

/// Single-writer collector for shortening results
#[derive(Debug)]
pub struct ResultAggregator {
    table: ResultTable,
    issue_keys: Arc<[String]>,
    spec_names: Arc<[Arc<str>]>,
    expected: usize,
    received: usize,
    routing_errors: Vec<RoutingError>,
    policy: FailurePolicy,
}

impl ResultAggregator {
    /// Create aggregator with one preallocated slot per issue
    #[must_use]
    pub fn new(issue_keys: Arc<[String]>, registry: &LinkSpecRegistry, policy: FailurePolicy) -> Self {
        let spec_names: Arc<[Arc<str>]> = registry.names().into();
        Self {
            table: ResultTable::with_slots(issue_keys.len()),
            expected: issue_keys.len() * spec_names.len(),
            issue_keys,
            spec_names,
            received: 0,
            routing_errors: Vec::new(),
            policy,
        }
    }

    /// Number of results the run must consume
    #[inline]
    #[must_use]
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Number of results consumed so far
    #[inline]
    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }

    /// Check if every expected result has been consumed
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.received >= self.expected
    }

    /// Read-only view of the table
    #[inline]
    #[must_use]
    pub fn table(&self) -> &ResultTable {
        &self.table
    }

    /// Write one result into its slot
    ///
    /// # Errors
    /// `RoutingError` if the spec name is unknown, the index is outside the
    /// table, or the pair was already written. The table is left unchanged.
    pub fn record(&mut self, result: ShortenResult) -> Result<(), RoutingError> {
        let ShortenResult {
            issue_index,
            spec_name,
            outcome,
        } = result;

        if !self.spec_names.iter().any(|n| *n == spec_name) {
            return Err(RoutingError::UnrecognizedSpec {
                issue_index,
                spec_name: spec_name.to_string(),
            });
        }

        let issue_count = self.table.len();
        let slot = self
            .table
            .slot_mut(issue_index)
            .ok_or(RoutingError::IssueIndexOutOfRange {
                issue_index,
                issue_count,
            })?;

        if !slot.insert_once(&spec_name, outcome.into()) {
            return Err(RoutingError::DuplicateResult {
                issue_index,
                spec_name: spec_name.to_string(),
            });
        }
        Ok(())
    }

    /// Consume one result, counting it and applying the failure policy
    ///
    /// # Errors
    /// Under [`FailurePolicy::FailFast`], the first failed pair or routing
    /// error. Under [`FailurePolicy::Collect`], never.
    pub fn consume(&mut self, result: ShortenResult) -> Result<(), AnnotateError> {
        self.received += 1;

        let issue_index = result.issue_index;
        let spec_name = Arc::clone(&result.spec_name);
        let failure = result.outcome.as_ref().err().cloned();

        tracing::debug!(
            "Aggregated '{}' for issue #{} ({}/{})",
            spec_name,
            issue_index,
            self.received,
            self.expected
        );

        if let Err(routing) = self.record(result) {
            tracing::warn!("Dropping unroutable result: {}", routing);
            if self.policy == FailurePolicy::FailFast {
                return Err(routing.into());
            }
            self.routing_errors.push(routing);
            return Ok(());
        }

        match failure {
            Some(source) if self.policy == FailurePolicy::FailFast => Err(AnnotateError::PairFailed {
                issue_key: self
                    .issue_keys
                    .get(issue_index)
                    .cloned()
                    .unwrap_or_default(),
                spec_name: spec_name.to_string(),
                source,
            }),
            _ => Ok(()),
        }
    }

    /// Drain the completion channel until every expected result arrived
    ///
    /// Stops early, returning [`AnnotateError::Incomplete`] with the partial
    /// table, when `cancel` fires, `deadline` passes, or the channel closes
    /// before the expected count is reached.
    ///
    /// # Errors
    /// `AnnotateError::Incomplete` as above, or the fail-fast errors of
    /// [`ResultAggregator::consume`].
    pub async fn collect(
        mut self,
        receiver: &mut mpsc::Receiver<ShortenResult>,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<AggregateOutcome, AnnotateError> {
        let expired = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(expired);

        while !self.is_complete() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.incomplete(IncompleteReason::Cancelled)),
                () = &mut expired => return Err(self.incomplete(IncompleteReason::DeadlineElapsed)),
                next = receiver.recv() => match next {
                    Some(result) => self.consume(result)?,
                    None => return Err(self.incomplete(IncompleteReason::WorkersLost)),
                },
            }
        }

        Ok(self.finish())
    }

    /// Freeze the table, ordering each slot by registry order
    #[must_use]
    pub fn finish(mut self) -> AggregateOutcome {
        self.sort_slots();
        let failures = self.table.failure_count();
        AggregateOutcome {
            table: self.table,
            received: self.received,
            routing_errors: self.routing_errors,
            failures,
        }
    }

    fn incomplete(mut self, reason: IncompleteReason) -> AnnotateError {
        tracing::error!(
            "Aggregation stopped ({}): {}/{} results received",
            reason,
            self.received,
            self.expected
        );
        self.sort_slots();
        AnnotateError::Incomplete {
            reason,
            expected: self.expected,
            received: self.received,
            partial: Box::new(self.table),
        }
    }

    fn sort_slots(&mut self) {
        for index in 0..self.table.len() {
            if let Some(slot) = self.table.slot_mut(index) {
                slot.sort_by_order(&self.spec_names);
            }
        }
    }
}
