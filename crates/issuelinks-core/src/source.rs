//! Issue search document adapter
//!
//! The tracker's search endpoint answers with
//! `{"issues": [{"key": "AB-1", ...}, ...], ...}`. [`IssueDocument`] checks
//! that shape up front, exposes each issue as an [`IssueRecord`], and puts
//! the document back together with the link maps attached.

use crate::error::SourceError;
use crate::merge::IssueRecord;
use crate::types::IssueLinks;
use serde_json::{Map, Value};

/// One issue object of a search document
#[derive(Debug, Clone, PartialEq)]
pub struct JsonIssue {
    key: String,
    fields: Map<String, Value>,
    link_field: String,
}

impl JsonIssue {
    /// Raw issue object
    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Consume into the raw issue object
    #[inline]
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl IssueRecord for JsonIssue {
    fn issue_key(&self) -> &str {
        &self.key
    }

    fn attach_links(&mut self, links: IssueLinks) {
        let value = match serde_json::to_value(&links) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Cannot serialize links for {}: {}", self.key, e);
                Value::Null
            }
        };
        self.fields.insert(self.link_field.clone(), value);
    }
}

/// Parsed search document
#[derive(Debug, Clone, PartialEq)]
pub struct IssueDocument {
    root: Map<String, Value>,
    issues: Vec<JsonIssue>,
}

impl IssueDocument {
    /// Validate `value` and extract its issues in order
    ///
    /// `link_field` is the key each issue's link map is written under.
    ///
    /// # Errors
    /// `SourceError` if `issues` is missing, not an array, or an entry is
    /// not an object with a string `key`.
    pub fn from_value(value: Value, link_field: &str) -> Result<Self, SourceError> {
        let Value::Object(mut root) = value else {
            return Err(SourceError::MissingIssues);
        };

        let entries = match root.remove("issues") {
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(SourceError::NotAnArray),
            None => return Err(SourceError::MissingIssues),
        };

        let issues = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let Value::Object(fields) = entry else {
                    return Err(SourceError::NotAnObject { index });
                };
                let key = fields
                    .get("key")
                    .and_then(Value::as_str)
                    .ok_or(SourceError::MissingKey { index })?
                    .to_string();
                Ok(JsonIssue {
                    key,
                    fields,
                    link_field: link_field.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { root, issues })
    }

    /// Issue keys in document order
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.key.as_str()).collect()
    }

    /// Number of issues
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Check if the document has no issues
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Move the issues out, leaving the rest of the document
    #[must_use]
    pub fn take_issues(&mut self) -> Vec<JsonIssue> {
        std::mem::take(&mut self.issues)
    }

    /// Put (annotated) issues back
    pub fn set_issues(&mut self, issues: Vec<JsonIssue>) {
        self.issues = issues;
    }

    /// Reassemble the JSON document
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut root = self.root;
        let issues = self
            .issues
            .into_iter()
            .map(|i| Value::Object(i.fields))
            .collect();
        root.insert("issues".to_string(), Value::Array(issues));
        Value::Object(root)
    }
}
