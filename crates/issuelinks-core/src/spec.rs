//! Link spec registry
//!
//! A [`LinkSpec`] names a URL template; the registry is the fixed, ordered
//! set of specs applied to every issue. Adding a link type means adding one
//! spec here and nothing else.

use crate::config::AnnotateConfig;
use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Placeholder substituted with the issue identifier
pub const ISSUE_PLACEHOLDER: &str = "${issueName}";

/// Named URL template
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkSpec {
    /// Stable key used to route results
    pub name: String,
    /// Template containing [`ISSUE_PLACEHOLDER`]
    pub url_template: String,
}

impl LinkSpec {
    /// Create new link spec
    #[inline]
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
        }
    }

    /// Substitute `issue_key` for every placeholder
    #[inline]
    #[must_use]
    pub fn expand(&self, issue_key: &str) -> String {
        self.url_template.replace(ISSUE_PLACEHOLDER, issue_key)
    }

    fn check(&self) -> Result<(), RegistryError> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if !self.url_template.contains(ISSUE_PLACEHOLDER) {
            return Err(RegistryError::MissingPlaceholder {
                name: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Immutable, ordered set of link specs
///
/// Cloning is cheap; workers share the same backing storage.
#[derive(Debug, Clone)]
pub struct LinkSpecRegistry {
    specs: Arc<[LinkSpec]>,
    names: Arc<[Arc<str>]>,
}

impl LinkSpecRegistry {
    /// Create registry from specs, in the given order
    ///
    /// # Errors
    /// - `RegistryError::Empty` if `specs` is empty
    /// - `RegistryError::EmptyName` / `DuplicateName` on bad names
    /// - `RegistryError::MissingPlaceholder` if a template never uses the issue
    pub fn new(specs: Vec<LinkSpec>) -> Result<Self, RegistryError> {
        if specs.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen = HashSet::with_capacity(specs.len());
        for spec in &specs {
            spec.check()?;
            if !seen.insert(spec.name.as_str()) {
                return Err(RegistryError::DuplicateName(spec.name.clone()));
            }
        }

        let names = specs
            .iter()
            .map(|s| Arc::<str>::from(s.name.as_str()))
            .collect();

        Ok(Self {
            specs: specs.into(),
            names,
        })
    }

    /// Standard issue and branch links
    ///
    /// - `jira`: `{jira_endpoint}/browse/${issueName}`
    /// - `stash`: `{stash_endpoint}/projects/APPS/repos/app/browse?at=refs%2Fheads%2F${issueName}`
    ///
    /// # Errors
    /// `RegistryError` only if an endpoint itself breaks the template.
    pub fn jira_and_stash(jira_endpoint: &str, stash_endpoint: &str) -> Result<Self, RegistryError> {
        let jira = jira_endpoint.trim_end_matches('/');
        let stash = stash_endpoint.trim_end_matches('/');

        Self::new(vec![
            LinkSpec::new("jira", format!("{jira}/browse/{ISSUE_PLACEHOLDER}")),
            LinkSpec::new(
                "stash",
                format!("{stash}/projects/APPS/repos/app/browse?at=refs%2Fheads%2F{ISSUE_PLACEHOLDER}"),
            ),
        ])
    }

    /// Registry from the `links` section of a config
    ///
    /// # Errors
    /// Same as [`LinkSpecRegistry::new`].
    pub fn from_config(config: &AnnotateConfig) -> Result<Self, RegistryError> {
        Self::new(config.links.clone())
    }

    /// Specs in registry order
    #[inline]
    #[must_use]
    pub fn specs(&self) -> &[LinkSpec] {
        &self.specs
    }

    /// Spec names in registry order
    #[inline]
    #[must_use]
    pub fn names(&self) -> &[Arc<str>] {
        &self.names
    }

    /// Pairs of shared name and spec, in registry order
    pub fn entries(&self) -> impl Iterator<Item = (&Arc<str>, &LinkSpec)> {
        self.names.iter().zip(self.specs.iter())
    }

    /// Look up spec by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LinkSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Check if a spec name is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| &**n == name)
    }

    /// Number of specs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Always false for a constructed registry
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_replaces_every_placeholder() {
        let spec = LinkSpec::new("both", "https://x/${issueName}?q=${issueName}");
        assert_eq!(spec.expand("AB-1"), "https://x/AB-1?q=AB-1");
    }

    #[test]
    fn registry_keeps_order() {
        let registry = LinkSpecRegistry::new(vec![
            LinkSpec::new("stash", "https://y/repos/app/browse?at=${issueName}"),
            LinkSpec::new("jira", "https://x/browse/${issueName}"),
        ])
        .unwrap();

        let names: Vec<&str> = registry.names().iter().map(|n| &**n).collect();
        assert_eq!(names, vec!["stash", "jira"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("jira"));
        assert!(!registry.contains("gitlab"));
    }

    #[test]
    fn registry_rejects_empty() {
        assert_eq!(LinkSpecRegistry::new(vec![]).unwrap_err(), RegistryError::Empty);
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let result = LinkSpecRegistry::new(vec![
            LinkSpec::new("jira", "https://x/${issueName}"),
            LinkSpec::new("jira", "https://y/${issueName}"),
        ]);
        assert_eq!(result.unwrap_err(), RegistryError::DuplicateName("jira".to_string()));
    }

    #[test]
    fn registry_rejects_blank_name() {
        let result = LinkSpecRegistry::new(vec![LinkSpec::new("  ", "https://x/${issueName}")]);
        assert_eq!(result.unwrap_err(), RegistryError::EmptyName);
    }

    #[test]
    fn registry_rejects_missing_placeholder() {
        let result = LinkSpecRegistry::new(vec![LinkSpec::new("jira", "https://x/browse")]);
        assert!(matches!(
            result.unwrap_err(),
            RegistryError::MissingPlaceholder { name } if name == "jira"
        ));
    }

    #[test]
    fn jira_and_stash_templates() {
        let registry =
            LinkSpecRegistry::jira_and_stash("https://jira.example.com/", "https://stash.example.com").unwrap();

        assert_eq!(
            registry.get("jira").unwrap().expand("AB-1"),
            "https://jira.example.com/browse/AB-1"
        );
        assert_eq!(
            registry.get("stash").unwrap().expand("AB-1"),
            "https://stash.example.com/projects/APPS/repos/app/browse?at=refs%2Fheads%2FAB-1"
        );
    }

    #[test]
    fn entries_pair_names_with_specs() {
        let registry = LinkSpecRegistry::jira_and_stash("https://j", "https://s").unwrap();
        for (name, spec) in registry.entries() {
            assert_eq!(&**name, spec.name.as_str());
        }
    }
}
