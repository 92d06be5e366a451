//! Core types for link annotation
//!
//! Defines the values that move through the pipeline:
//! - Work units ([`ShortenRequest`]) and their completions ([`ShortenResult`])
//! - Per-pair outcomes ([`LinkOutcome`]) and per-issue link maps ([`IssueLinks`])
//! - The preallocated [`ResultTable`] owned by the aggregator

use crate::error::ShortenError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use ulid::Ulid;

/// Unique annotation run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shortened link returned by the shortening service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShortLink {
    /// Short URL
    pub url: String,
    /// URL that was shortened
    pub long_url: String,
}

impl ShortLink {
    /// Create new short link
    #[inline]
    pub fn new(url: impl Into<String>, long_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            long_url: long_url.into(),
        }
    }

    /// Drop a leading `http://` or `https://` from the short URL
    #[must_use]
    pub fn without_scheme(mut self) -> Self {
        if let Some(rest) = self
            .url
            .strip_prefix("http://")
            .or_else(|| self.url.strip_prefix("https://"))
        {
            self.url = rest.to_string();
        }
        self
    }
}

/// One unit of work: shorten `long_url` for issue `issue_index` under `spec_name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenRequest {
    /// Issue position in the caller's collection
    pub issue_index: usize,
    /// Link spec the URL was generated from
    pub spec_name: Arc<str>,
    /// Fully substituted URL
    pub long_url: String,
}

/// Completion of exactly one [`ShortenRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenResult {
    /// Issue position copied from the request
    pub issue_index: usize,
    /// Spec name copied from the request
    pub spec_name: Arc<str>,
    /// Short link, or the failure that replaced it
    pub outcome: Result<ShortLink, ShortenError>,
}

impl ShortenResult {
    /// Build the result for a request
    #[inline]
    #[must_use]
    pub fn for_request(request: ShortenRequest, outcome: Result<ShortLink, ShortenError>) -> Self {
        Self {
            issue_index: request.issue_index,
            spec_name: request.spec_name,
            outcome,
        }
    }
}

/// Final state of one (issue, spec) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LinkOutcome {
    /// Service returned a short link
    Shortened(ShortLink),
    /// Shortening failed; the failure is kept
    Failed {
        /// Why it failed
        error: ShortenError,
    },
}

impl LinkOutcome {
    /// Short URL, if shortening succeeded
    #[inline]
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Shortened(link) => Some(&link.url),
            Self::Failed { .. } => None,
        }
    }

    /// Failure, if shortening failed
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&ShortenError> {
        match self {
            Self::Shortened(_) => None,
            Self::Failed { error } => Some(error),
        }
    }

    /// Check if shortening succeeded
    #[inline]
    #[must_use]
    pub fn is_shortened(&self) -> bool {
        matches!(self, Self::Shortened(_))
    }
}

impl From<Result<ShortLink, ShortenError>> for LinkOutcome {
    fn from(outcome: Result<ShortLink, ShortenError>) -> Self {
        match outcome {
            Ok(link) => Self::Shortened(link),
            Err(error) => Self::Failed { error },
        }
    }
}

/// Link map of one issue, keyed by spec name in registry order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IssueLinks {
    links: IndexMap<String, LinkOutcome>,
}

impl IssueLinks {
    /// Create empty link map
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome for a spec name
    #[inline]
    #[must_use]
    pub fn get(&self, spec_name: &str) -> Option<&LinkOutcome> {
        self.links.get(spec_name)
    }

    /// Short URL for a spec name, if it succeeded
    #[inline]
    #[must_use]
    pub fn url(&self, spec_name: &str) -> Option<&str> {
        self.get(spec_name).and_then(LinkOutcome::url)
    }

    /// Check if a spec name has been written
    #[inline]
    #[must_use]
    pub fn contains(&self, spec_name: &str) -> bool {
        self.links.contains_key(spec_name)
    }

    /// Number of written specs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Check if nothing has been written
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Number of failed specs
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.links.values().filter(|o| !o.is_shortened()).count()
    }

    /// Iterate over (spec name, outcome)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LinkOutcome)> {
        self.links.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Write an outcome; returns false if the spec was already written
    pub(crate) fn insert_once(&mut self, spec_name: &str, outcome: LinkOutcome) -> bool {
        if self.links.contains_key(spec_name) {
            return false;
        }
        self.links.insert(spec_name.to_string(), outcome);
        true
    }

    /// Reorder entries to follow `order`, leaving unknown names at the end
    pub(crate) fn sort_by_order(&mut self, order: &[Arc<str>]) {
        self.links.sort_by_cached_key(|name, _| {
            order
                .iter()
                .position(|o| &**o == name.as_str())
                .unwrap_or(usize::MAX)
        });
    }
}

/// Per-issue link maps, one slot per issue position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultTable {
    slots: Vec<IssueLinks>,
}

impl ResultTable {
    /// Preallocate `count` empty slots
    #[must_use]
    pub fn with_slots(count: usize) -> Self {
        Self {
            slots: vec![IssueLinks::new(); count],
        }
    }

    /// Number of slots
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the table has no slots
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Link map of issue `index`
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&IssueLinks> {
        self.slots.get(index)
    }

    /// Iterate over slots in issue order
    pub fn iter(&self) -> impl Iterator<Item = &IssueLinks> {
        self.slots.iter()
    }

    /// Total number of written pairs
    #[must_use]
    pub fn filled_pairs(&self) -> usize {
        self.slots.iter().map(IssueLinks::len).sum()
    }

    /// Total number of failed pairs
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.slots.iter().map(IssueLinks::failure_count).sum()
    }

    /// Consume into slots
    #[inline]
    #[must_use]
    pub fn into_slots(self) -> Vec<IssueLinks> {
        self.slots
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut IssueLinks> {
        self.slots.get_mut(index)
    }
}
