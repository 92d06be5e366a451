//! Annotation merger
//!
//! Copies the frozen result table back onto the caller's issues. Issue `i`
//! receives slot `i`; nothing else is inspected.

use crate::error::AnnotateError;
use crate::types::{IssueLinks, ResultTable};
use serde::Serialize;

/// An issue that can be annotated with short links
pub trait IssueRecord {
    /// Identifier substituted into link templates
    fn issue_key(&self) -> &str;

    /// Receive the finished link map
    fn attach_links(&mut self, links: IssueLinks);
}

/// Minimal issue record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Issue identifier, e.g. `AB-1`
    pub key: String,
    /// Link map, set once annotated
    pub links: Option<IssueLinks>,
}

impl Issue {
    /// Create unannotated issue
    #[inline]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            links: None,
        }
    }
}

impl IssueRecord for Issue {
    fn issue_key(&self) -> &str {
        &self.key
    }

    fn attach_links(&mut self, links: IssueLinks) {
        self.links = Some(links);
    }
}

/// Attach slot `i` of `table` to `issues[i]`
///
/// # Errors
/// `AnnotateError::LengthMismatch` if the lengths disagree; no issue is
/// modified in that case.
pub fn merge_links<I: IssueRecord>(issues: &mut [I], table: ResultTable) -> Result<(), AnnotateError> {
    if issues.len() != table.len() {
        tracing::error!(
            "Cannot merge {} link slots onto {} issues",
            table.len(),
            issues.len()
        );
        return Err(AnnotateError::LengthMismatch {
            issues: issues.len(),
            slots: table.len(),
        });
    }

    for (issue, links) in issues.iter_mut().zip(table.into_slots()) {
        issue.attach_links(links);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LinkOutcome, ShortLink};

    fn table_for(urls: &[&str]) -> ResultTable {
        let mut table = ResultTable::with_slots(urls.len());
        for (i, url) in urls.iter().enumerate() {
            table
                .slot_mut(i)
                .unwrap()
                .insert_once("jira", LinkOutcome::Shortened(ShortLink::new(*url, "long")));
        }
        table
    }

    #[test]
    fn merge_attaches_by_position() {
        let mut issues = vec![Issue::new("AB-1"), Issue::new("AB-2")];
        merge_links(&mut issues, table_for(&["u1", "u2"])).unwrap();

        assert_eq!(issues[0].links.as_ref().unwrap().url("jira"), Some("u1"));
        assert_eq!(issues[1].links.as_ref().unwrap().url("jira"), Some("u2"));
    }

    #[test]
    fn merge_rejects_length_mismatch() {
        let mut issues = vec![Issue::new("AB-1")];
        let err = merge_links(&mut issues, table_for(&["u1", "u2"])).unwrap_err();

        assert!(matches!(err, AnnotateError::LengthMismatch { issues: 1, slots: 2 }));
        assert!(issues[0].links.is_none());
    }

    #[test]
    fn merge_empty() {
        let mut issues: Vec<Issue> = Vec::new();
        assert!(merge_links(&mut issues, ResultTable::default()).is_ok());
    }
}
