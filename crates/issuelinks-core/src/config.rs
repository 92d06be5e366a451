//! Annotation configuration
//!
//! [`AnnotateConfig`] can be built in code with the `with_*` methods or read
//! from a YAML/TOML file. Every field has a default, so a config file only
//! needs the keys it changes.

use crate::error::ConfigError;
use crate::spec::LinkSpec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default JSON field the link map is attached under
pub const DEFAULT_LINK_FIELD: &str = "bitlyLink";

/// What to do when a single pair fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure on the pair and keep going
    #[default]
    Collect,
    /// Abort the run on the first failed pair
    FailFast,
}

/// Annotation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotateConfig {
    /// Maximum in-flight shortening calls
    pub concurrency_limit: usize,
    /// Per-attempt timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Deadline for the whole run in milliseconds
    pub overall_timeout_ms: Option<u64>,
    /// Per-pair failure handling
    pub failure_policy: FailurePolicy,
    /// Extra attempts for retryable failures
    pub max_retries: u32,
    /// Initial retry backoff in milliseconds
    pub retry_backoff_ms: u64,
    /// Strip `http://`/`https://` from short URLs
    pub strip_scheme: bool,
    /// JSON field the link map is written to
    pub link_field: String,
    /// Link specs for the registry
    pub links: Vec<LinkSpec>,
}

impl AnnotateConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML
    ///
    /// # Errors
    /// `ConfigError::Yaml` on syntax errors, `ConfigError::Invalid` on bad values.
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML
    ///
    /// # Errors
    /// `ConfigError::Toml` on syntax errors, `ConfigError::Invalid` on bad values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.yml`, `.yaml` or `.toml` file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read,
    /// `ConfigError::UnsupportedFormat` for other extensions,
    /// plus the parse errors of the matching format.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let parse: fn(&str) -> Result<Self, ConfigError> = match extension.as_deref() {
            Some("yml" | "yaml") => Self::from_yaml_str,
            Some("toml") => Self::from_toml_str,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!("Loading annotate config from {}", path.display());
        parse(&source)
    }

    /// Check values are usable
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::Invalid(
                "concurrency_limit must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.overall_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "overall_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.link_field.trim().is_empty() {
            return Err(ConfigError::Invalid("link_field must not be empty".to_string()));
        }
        Ok(())
    }

    /// With concurrency limit
    #[inline]
    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// With per-attempt timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = duration_ms(timeout);
        self
    }

    /// With overall deadline
    #[inline]
    #[must_use]
    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// With failure policy
    #[inline]
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// With retries for retryable failures
    #[inline]
    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = duration_ms(backoff);
        self
    }

    /// With scheme stripping
    #[inline]
    #[must_use]
    pub fn with_strip_scheme(mut self, strip: bool) -> Self {
        self.strip_scheme = strip;
        self
    }

    /// With JSON link field
    #[inline]
    #[must_use]
    pub fn with_link_field(mut self, field: impl Into<String>) -> Self {
        self.link_field = field.into();
        self
    }

    /// With link specs
    #[inline]
    #[must_use]
    pub fn with_links(mut self, links: Vec<LinkSpec>) -> Self {
        self.links = links;
        self
    }

    /// Per-attempt timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Overall deadline, if any
    #[inline]
    #[must_use]
    pub fn overall_timeout(&self) -> Option<Duration> {
        self.overall_timeout_ms.map(Duration::from_millis)
    }

    /// Initial retry backoff
    #[inline]
    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 8,
            request_timeout_ms: 10_000,
            overall_timeout_ms: None,
            failure_policy: FailurePolicy::Collect,
            max_retries: 0,
            retry_backoff_ms: 200,
            strip_scheme: false,
            link_field: DEFAULT_LINK_FIELD.to_string(),
            links: Vec::new(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = AnnotateConfig::new();
        assert_eq!(config.concurrency_limit, 8);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.overall_timeout(), None);
        assert_eq!(config.failure_policy, FailurePolicy::Collect);
        assert_eq!(config.link_field, "bitlyLink");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_methods() {
        let config = AnnotateConfig::new()
            .with_concurrency_limit(2)
            .with_request_timeout(Duration::from_millis(150))
            .with_overall_timeout(Duration::from_secs(3))
            .with_failure_policy(FailurePolicy::FailFast)
            .with_retries(2, Duration::from_millis(10))
            .with_strip_scheme(true)
            .with_link_field("shortLinks");

        assert_eq!(config.concurrency_limit, 2);
        assert_eq!(config.request_timeout_ms, 150);
        assert_eq!(config.overall_timeout_ms, Some(3000));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_backoff(), Duration::from_millis(10));
        assert!(config.strip_scheme);
        assert_eq!(config.link_field, "shortLinks");
    }

    #[test]
    fn yaml_partial_config_uses_defaults() {
        let config = AnnotateConfig::from_yaml_str(
            r#"
concurrency_limit: 4
failure_policy: fail_fast
links:
  - name: jira
    url_template: "https://x/browse/${issueName}"
"#,
        )
        .unwrap();

        assert_eq!(config.concurrency_limit, 4);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.request_timeout_ms, 10_000);
        assert_eq!(config.links, vec![LinkSpec::new("jira", "https://x/browse/${issueName}")]);
    }

    #[test]
    fn toml_config() {
        let config = AnnotateConfig::from_toml_str(
            r#"
request_timeout_ms = 500
overall_timeout_ms = 2000
strip_scheme = true

[[links]]
name = "stash"
url_template = "https://y/repos/app/browse?at=${issueName}"
"#,
        )
        .unwrap();

        assert_eq!(config.request_timeout_ms, 500);
        assert_eq!(config.overall_timeout_ms, Some(2000));
        assert!(config.strip_scheme);
        assert_eq!(config.links.len(), 1);
    }

    #[test]
    fn invalid_values_rejected() {
        let err = AnnotateConfig::from_yaml_str("concurrency_limit: 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("concurrency_limit")));

        let err = AnnotateConfig::from_toml_str("request_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config = AnnotateConfig::new().with_link_field(" ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn syntax_errors_reported() {
        assert!(matches!(
            AnnotateConfig::from_yaml_str("concurrency_limit: [").unwrap_err(),
            ConfigError::Yaml(_)
        ));
        assert!(matches!(
            AnnotateConfig::from_toml_str("concurrency_limit = ").unwrap_err(),
            ConfigError::Toml(_)
        ));
    }

    #[test]
    fn load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("links.yml");
        let mut file = std::fs::File::create(&yaml_path).unwrap();
        writeln!(file, "max_retries: 3").unwrap();
        assert_eq!(AnnotateConfig::load(&yaml_path).unwrap().max_retries, 3);

        let toml_path = dir.path().join("links.toml");
        std::fs::write(&toml_path, "max_retries = 1\n").unwrap();
        assert_eq!(AnnotateConfig::load(&toml_path).unwrap().max_retries, 1);

        let json_path = dir.path().join("links.json");
        std::fs::write(&json_path, "{}").unwrap();
        assert!(matches!(
            AnnotateConfig::load(&json_path).unwrap_err(),
            ConfigError::UnsupportedFormat(_)
        ));

        assert!(matches!(
            AnnotateConfig::load(dir.path().join("missing.yaml")).unwrap_err(),
            ConfigError::Io { .. }
        ));
    }
}
