//! Issue Links Core - concurrent short-link annotation
//!
//! Given a set of issues and a registry of link specs, produces one short
//! link per (issue, spec) pair and attaches the links back onto the issues:
//! - Every pair is shortened concurrently, bounded by a semaphore
//! - Completions flow over a channel to a single aggregator task
//! - Per-pair failures stay in the affected issue's link map
//! - Results are merged only after every pair has been accounted for
//!
//! # Example
//!
//! ```rust,ignore
//! use issuelinks_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(shortener: Arc<dyn Shortener>) -> Result<(), AnnotateError> {
//! let registry = LinkSpecRegistry::jira_and_stash(
//!     "https://jira.example.com",
//!     "https://stash.example.com",
//! )?;
//! let annotator = LinkAnnotator::new(shortener, registry, AnnotateConfig::new())?;
//!
//! let annotated = annotator
//!     .annotate(vec![Issue::new("AB-1"), Issue::new("AB-2")])
//!     .await?;
//! println!("{} pairs, {} failed", annotated.report.pairs, annotated.report.failures);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod aggregate;
pub mod annotate;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod merge;
pub mod shortener;
pub mod source;
pub mod spec;
pub mod telemetry;
pub mod types;

// Re-exports for convenience
pub use aggregate::{AggregateOutcome, ResultAggregator};
pub use annotate::{Annotated, AnnotatedJson, AnnotationReport, LinkAnnotator};
pub use config::{AnnotateConfig, FailurePolicy, DEFAULT_LINK_FIELD};
pub use dispatch::{Dispatch, FanOutDispatcher};
pub use error::{
    AnnotateError, ConfigError, IncompleteReason, RegistryError, RoutingError, ShortenError,
    SourceError,
};
pub use merge::{merge_links, Issue, IssueRecord};
pub use shortener::{Shortener, ShorteningWorker, WorkerSettings};
pub use source::{IssueDocument, JsonIssue};
pub use spec::{LinkSpec, LinkSpecRegistry, ISSUE_PLACEHOLDER};
pub use types::{
    IssueLinks, LinkOutcome, ResultTable, RunId, ShortLink, ShortenRequest, ShortenResult,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for annotating issues
    pub use crate::{
        AnnotateConfig, AnnotateError, Annotated, FailurePolicy, Issue, IssueLinks, IssueRecord,
        LinkAnnotator, LinkOutcome, LinkSpec, LinkSpecRegistry, ShortLink, ShortenError,
        Shortener,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
