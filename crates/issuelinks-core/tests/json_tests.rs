//! Search document annotation and config-driven setup

use issuelinks_core::prelude::*;
use issuelinks_core::SourceError;
use issuelinks_test_utils::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn annotates_search_document() -> anyhow::Result<()> {
    let annotator = LinkAnnotator::new(Arc::new(EchoShortener::new()), example_registry(), AnnotateConfig::new())?;

    let annotated = annotator.annotate_json(search_document(&["AB-1", "AB-2"])).await?;
    let document = annotated.document;

    assert_eq!(annotated.report.pairs, 4);
    assert_eq!(document["total"], 2);
    assert_eq!(document["expand"], "schema,names");

    for (index, key) in ["AB-1", "AB-2"].iter().enumerate() {
        let issue = &document["issues"][index];
        assert_eq!(issue["key"], *key);
        assert_eq!(issue["fields"]["summary"], format!("Summary of {key}"));
        assert_eq!(
            issue["bitlyLink"],
            json!({
                "jira": {"url": echo_url(&jira_url(key)), "long_url": jira_url(key)},
                "stash": {"url": echo_url(&stash_url(key)), "long_url": stash_url(key)}
            })
        );
    }
    Ok(())
}

#[tokio::test]
async fn failed_pair_serializes_error() -> anyhow::Result<()> {
    let shortener = FailingShortener::new(jira_url("AB-1"), ShortenError::RateLimited);
    let annotator = LinkAnnotator::new(Arc::new(shortener), example_registry(), AnnotateConfig::new())?;

    let annotated = annotator.annotate_json(search_document(&["AB-1"])).await?;

    assert_eq!(
        annotated.document["issues"][0]["bitlyLink"]["jira"],
        json!({"error": {"kind": "rate_limited"}})
    );
    assert_eq!(annotated.report.failures, 1);
    Ok(())
}

#[tokio::test]
async fn custom_link_field() -> anyhow::Result<()> {
    let config = AnnotateConfig::new().with_link_field("shortLinks");
    let annotator = LinkAnnotator::new(Arc::new(EchoShortener::new()), example_registry(), config)?;

    let annotated = annotator.annotate_json(search_document(&["AB-7"])).await?;
    let issue = &annotated.document["issues"][0];

    assert!(issue.get("bitlyLink").is_none());
    assert_eq!(issue["shortLinks"]["jira"]["long_url"], jira_url("AB-7"));
    Ok(())
}

#[tokio::test]
async fn empty_document_is_unchanged() -> anyhow::Result<()> {
    let shortener = Arc::new(EchoShortener::new());
    let annotator = LinkAnnotator::new(shortener.clone(), example_registry(), AnnotateConfig::new())?;

    let input = search_document(&[]);
    let annotated = annotator.annotate_json(input.clone()).await?;

    assert_eq!(annotated.document, input);
    assert_eq!(shortener.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn malformed_document_rejected() {
    let annotator =
        LinkAnnotator::new(Arc::new(EchoShortener::new()), example_registry(), AnnotateConfig::new()).unwrap();

    let err = annotator
        .annotate_json(json!({"issues": [{"id": "1"}]}))
        .await
        .expect_err("issue without key");
    assert!(matches!(err, AnnotateError::Source(SourceError::MissingKey { index: 0 })));
}

#[tokio::test]
async fn annotator_from_yaml_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("issuelinks.yaml");
    std::fs::write(
        &path,
        r#"
concurrency_limit: 2
link_field: links
links:
  - name: tracker
    url_template: "https://tracker.example.com/issue/${issueName}"
"#,
    )?;

    let config = AnnotateConfig::load(&path)?;
    let annotator = LinkAnnotator::from_config(Arc::new(EchoShortener::new()), config)?;
    assert_eq!(annotator.config().concurrency_limit, 2);

    let annotated = annotator.annotate_json(search_document(&["AB-1"])).await?;
    assert_eq!(
        annotated.document["issues"][0]["links"]["tracker"]["url"],
        echo_url("https://tracker.example.com/issue/AB-1")
    );
    Ok(())
}
