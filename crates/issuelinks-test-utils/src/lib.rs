//! Testing utilities for the issuelinks workspace
//!
//! Stub shorteners with scripted behaviour, and fixtures for issues,
//! registries and search documents.

#![allow(missing_docs)]

use issuelinks_core::{Issue, LinkSpecRegistry, ShortLink, ShortenError, Shortener};
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const JIRA_ENDPOINT: &str = "https://jira.example.com";
pub const STASH_ENDPOINT: &str = "https://stash.example.com";

/// Short URL the echo stubs produce for `long_url`
pub fn echo_url(long_url: &str) -> String {
    let path = long_url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    format!("http://sho.rt/{path}")
}

fn echo(long_url: &str) -> ShortLink {
    ShortLink::new(echo_url(long_url), long_url)
}

/// n-th call returns `http://sho.rt/<n>`, starting at 1
#[derive(Debug, Default)]
pub struct SequentialShortener {
    calls: Mutex<Vec<String>>,
}

impl SequentialShortener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Long URLs in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl Shortener for SequentialShortener {
    async fn shorten(&self, long_url: &str) -> Result<ShortLink, ShortenError> {
        let n = {
            let mut calls = self.calls.lock();
            calls.push(long_url.to_string());
            calls.len()
        };
        Ok(ShortLink::new(format!("http://sho.rt/{n}"), long_url))
    }
}

/// Deterministic: the short URL is derived from the long URL only
#[derive(Debug, Default)]
pub struct EchoShortener {
    calls: AtomicUsize,
}

impl EchoShortener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Shortener for EchoShortener {
    async fn shorten(&self, long_url: &str) -> Result<ShortLink, ShortenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(echo(long_url))
    }
}

/// Fails with `error` for one long URL, echoes everything else
#[derive(Debug)]
pub struct FailingShortener {
    target: String,
    error: ShortenError,
}

impl FailingShortener {
    pub fn new(target: impl Into<String>, error: ShortenError) -> Self {
        Self {
            target: target.into(),
            error,
        }
    }
}

#[async_trait::async_trait]
impl Shortener for FailingShortener {
    async fn shorten(&self, long_url: &str) -> Result<ShortLink, ShortenError> {
        if long_url == self.target {
            return Err(self.error.clone());
        }
        Ok(echo(long_url))
    }
}

/// Never answers for one long URL, echoes everything else
#[derive(Debug)]
pub struct HangingShortener {
    target: String,
}

impl HangingShortener {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait::async_trait]
impl Shortener for HangingShortener {
    async fn shorten(&self, long_url: &str) -> Result<ShortLink, ShortenError> {
        if long_url == self.target {
            futures::future::pending::<()>().await;
        }
        Ok(echo(long_url))
    }
}

/// Echoes after a random delay, so completions arrive out of order
#[derive(Debug)]
pub struct JitterShortener {
    max_delay: Duration,
}

impl JitterShortener {
    pub fn new(max_delay: Duration) -> Self {
        Self { max_delay }
    }
}

#[async_trait::async_trait]
impl Shortener for JitterShortener {
    async fn shorten(&self, long_url: &str) -> Result<ShortLink, ShortenError> {
        let max_micros = u64::try_from(self.max_delay.as_micros()).unwrap_or(u64::MAX);
        let delay = Duration::from_micros(rand::rng().random_range(0..=max_micros));
        tokio::time::sleep(delay).await;
        Ok(echo(long_url))
    }
}

/// Fails retryably for the first `failures` calls, then echoes
#[derive(Debug)]
pub struct FlakyShortener {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyShortener {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Shortener for FlakyShortener {
    async fn shorten(&self, long_url: &str) -> Result<ShortLink, ShortenError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(ShortenError::unavailable(format!("flaky call {call}")));
        }
        Ok(echo(long_url))
    }
}

/// Panics for one long URL, echoes everything else
#[derive(Debug)]
pub struct PanickingShortener {
    target: String,
}

impl PanickingShortener {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait::async_trait]
impl Shortener for PanickingShortener {
    async fn shorten(&self, long_url: &str) -> Result<ShortLink, ShortenError> {
        if long_url == self.target {
            panic!("shortener crashed on {long_url}");
        }
        Ok(echo(long_url))
    }
}

pub fn issues(keys: &[&str]) -> Vec<Issue> {
    keys.iter().map(|key| Issue::new(*key)).collect()
}

/// `AB-1` ..= `AB-<count>`
pub fn numbered_issues(count: usize) -> Vec<Issue> {
    (1..=count).map(|i| Issue::new(format!("AB-{i}"))).collect()
}

pub fn example_registry() -> LinkSpecRegistry {
    LinkSpecRegistry::jira_and_stash(JIRA_ENDPOINT, STASH_ENDPOINT).unwrap()
}

pub fn jira_url(key: &str) -> String {
    format!("{JIRA_ENDPOINT}/browse/{key}")
}

pub fn stash_url(key: &str) -> String {
    format!("{STASH_ENDPOINT}/projects/APPS/repos/app/browse?at=refs%2Fheads%2F{key}")
}

/// Issue search response with the given keys and some unrelated fields
pub fn search_document(keys: &[&str]) -> serde_json::Value {
    let issues: Vec<serde_json::Value> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            serde_json::json!({
                "id": format!("{}", 10_000 + i),
                "key": key,
                "fields": {
                    "summary": format!("Summary of {key}"),
                    "status": {"name": "Open"}
                }
            })
        })
        .collect();

    serde_json::json!({
        "expand": "schema,names",
        "startAt": 0,
        "maxResults": 50,
        "total": keys.len(),
        "issues": issues
    })
}
