//! Error types for issue link annotation
//!
//! Errors are split by how far they travel:
//! - [`ShortenError`] stays attached to a single (issue, spec) pair
//! - [`RoutingError`] describes a result that could not be placed in the table
//! - [`AnnotateError`] is the only error that aborts a whole run

use crate::types::ResultTable;
use serde::Serialize;
use std::path::PathBuf;

/// Failure of one call to the shortening service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShortenError {
    /// Service rejected the request
    #[error("shortening service error: {message}")]
    Service {
        /// Message returned by the service
        message: String,
    },

    /// Service could not be reached
    #[error("shortening service unavailable: {message}")]
    Unavailable {
        /// Transport-level description
        message: String,
    },

    /// Service asked the client to slow down
    #[error("shortening service rate limited the request")]
    RateLimited,

    /// Call did not finish within the per-request timeout
    #[error("shortening request timed out after {after_ms}ms")]
    TimedOut {
        /// Timeout that elapsed
        after_ms: u64,
    },

    /// Run was cancelled before the call was made
    #[error("shortening request cancelled")]
    Cancelled,
}

impl ShortenError {
    /// Create service error
    #[inline]
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
        }
    }

    /// Create unavailable error
    #[inline]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Check if another attempt may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::RateLimited | Self::TimedOut { .. }
        )
    }
}

/// A completed result that could not be written into the result table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutingError {
    /// Spec name is not in the registry
    #[error("unrecognized link spec '{spec_name}' for issue #{issue_index}")]
    UnrecognizedSpec {
        /// Issue position
        issue_index: usize,
        /// Offending spec name
        spec_name: String,
    },

    /// Issue index outside the table
    #[error("issue index {issue_index} out of range (issues: {issue_count})")]
    IssueIndexOutOfRange {
        /// Offending issue position
        issue_index: usize,
        /// Number of slots in the table
        issue_count: usize,
    },

    /// Second result for an already written pair
    #[error("duplicate result for link spec '{spec_name}' on issue #{issue_index}")]
    DuplicateResult {
        /// Issue position
        issue_index: usize,
        /// Spec name written twice
        spec_name: String,
    },
}

/// Link spec registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No specs registered
    #[error("link spec registry is empty")]
    Empty,

    /// Spec without a name
    #[error("link spec name must not be empty")]
    EmptyName,

    /// Two specs share a name
    #[error("duplicate link spec name: '{0}'")]
    DuplicateName(String),

    /// Template never references the issue
    #[error("url template for '{name}' does not contain ${{issueName}}")]
    MissingPlaceholder {
        /// Spec name
        name: String,
    },
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error during file read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// YAML syntax or shape error
    #[error("invalid yaml config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML syntax or shape error
    #[error("invalid toml config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Extension is neither yaml nor toml
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),

    /// Values parsed but are not usable
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Issue search document errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Document has no `issues` field
    #[error("document has no 'issues' field")]
    MissingIssues,

    /// `issues` is not an array
    #[error("'issues' is not an array")]
    NotAnArray,

    /// Issue entry is not an object
    #[error("issue #{index} is not an object")]
    NotAnObject {
        /// Issue position
        index: usize,
    },

    /// Issue entry has no string `key`
    #[error("issue #{index} has no string 'key'")]
    MissingKey {
        /// Issue position
        index: usize,
    },
}

/// Why a run stopped before every pair completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteReason {
    /// Caller cancelled the run
    Cancelled,
    /// Overall deadline elapsed
    DeadlineElapsed,
    /// Workers exited without reporting
    WorkersLost,
}

impl std::fmt::Display for IncompleteReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Cancelled => "cancelled",
            Self::DeadlineElapsed => "deadline elapsed",
            Self::WorkersLost => "workers lost",
        };
        f.write_str(s)
    }
}

/// Top-level annotation error
#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    /// Issue collection and result table disagree on length
    #[error("length mismatch: {issues} issues but {slots} result slots")]
    LengthMismatch {
        /// Number of issues supplied
        issues: usize,
        /// Number of slots in the table
        slots: usize,
    },

    /// Run stopped before all pairs completed
    #[error("annotation incomplete ({reason}): received {received} of {expected} results")]
    Incomplete {
        /// Why the run stopped
        reason: IncompleteReason,
        /// Number of pairs dispatched
        expected: usize,
        /// Number of results consumed
        received: usize,
        /// Whatever was filled before stopping
        partial: Box<ResultTable>,
    },

    /// A pair failed under the fail-fast policy
    #[error("shortening '{spec_name}' for {issue_key} failed: {source}")]
    PairFailed {
        /// Issue identifier
        issue_key: String,
        /// Spec name
        spec_name: String,
        /// Per-pair failure
        #[source]
        source: ShortenError,
    },

    /// A result could not be routed under the fail-fast policy
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    /// Registry rejected
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Issue document rejected
    #[error("issue source error: {0}")]
    Source(#[from] SourceError),
}

impl AnnotateError {
    /// Check if rerunning the same input may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Incomplete { reason, .. } => *reason != IncompleteReason::Cancelled,
            Self::PairFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Partially filled table, if the run stopped early
    #[inline]
    #[must_use]
    pub fn partial(&self) -> Option<&ResultTable> {
        match self {
            Self::Incomplete { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
