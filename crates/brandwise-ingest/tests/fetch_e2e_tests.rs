//! End-to-end tests for `brandwise fetch`
//!
//! A wiremock server plays the feed API. These tests validate:
//! - A full multi-page run ending in an archive and a saved cursor
//! - Resuming from the cursor when nothing new arrived
//! - A failure mid-run leaving earlier pages on disk and the cursor untouched
//! - API-reported errors
//! - Transport failures keeping their underlying cause

use brandwise_ingest::config::IngestConfig;
use brandwise_ingest::cursor::CursorStore;
use brandwise_ingest::record::read_rows;
use brandwise_ingest::run::{Ingestor, RunOutcome};
use brandwise_ingest::IngestError;
use chrono::DateTime;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, Request, Respond, ResponseTemplate,
};

const PASSKEY: &str = "test-passkey-123";

/// 2024-05-13T10:20:00Z
const FIRST_SUBMISSION: i64 = 1_715_595_600;

/// Serves reviews sorted by submission time, honoring Offset, Limit and the
/// `SubmissionTime:gt:` filter.
struct ReviewFeed {
    reviews: Vec<(i64, Value)>,
    fail_at_offset: Option<usize>,
    extra_total: usize,
}

impl ReviewFeed {
    fn new(count: usize) -> Self {
        let reviews = (0..count)
            .map(|i| {
                let epoch = FIRST_SUBMISSION + 60 * i as i64;
                let time = DateTime::from_timestamp(epoch, 0)
                    .expect("valid timestamp")
                    .to_rfc3339();
                let review = json!({
                    "Id": format!("R{i}"),
                    "ProductId": format!("P{}", i % 3),
                    "Rating": i % 5 + 1,
                    "Title": format!("Review {i}"),
                    "ReviewText": "Nice texture",
                    "UserNickname": format!("user{i}"),
                    "SubmissionTime": time,
                    "ContextDataValues": {
                        "skinTone": {"ValueLabel": "lightMedium"}
                    }
                });
                (epoch, review)
            })
            .collect();

        Self {
            reviews,
            fail_at_offset: None,
            extra_total: 0,
        }
    }

    /// Report more results than the feed actually has.
    fn overstating_total(mut self, extra: usize) -> Self {
        self.extra_total = extra;
        self
    }

    fn failing_at(mut self, offset: usize) -> Self {
        self.fail_at_offset = Some(offset);
        self
    }
}

impl Respond for ReviewFeed {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut offset = 0usize;
        let mut limit = 100usize;
        let mut after = None;
        for (key, value) in request.url.query_pairs() {
            match key.as_ref() {
                "Offset" => offset = value.parse().expect("numeric Offset"),
                "Limit" => limit = value.parse().expect("numeric Limit"),
                "Filter" => {
                    if let Some(epoch) = value.strip_prefix("SubmissionTime:gt:") {
                        after = Some(epoch.parse::<i64>().expect("numeric filter"));
                    }
                },
                _ => {},
            }
        }

        if limit > 1 && self.fail_at_offset == Some(offset) {
            return ResponseTemplate::new(500);
        }

        let matching: Vec<&Value> = self
            .reviews
            .iter()
            .filter(|(epoch, _)| after.is_none_or(|after| *epoch > after))
            .map(|(_, review)| review)
            .collect();
        let page: Vec<&Value> = matching.iter().skip(offset).take(limit).copied().collect();

        ResponseTemplate::new(200).set_body_json(json!({
            "Offset": offset,
            "Limit": limit,
            "TotalResults": matching.len() + self.extra_total,
            "HasErrors": false,
            "Errors": [],
            "Results": page,
            "Includes": {
                "Products": {
                    "P0": {"Name": "Velvet Lip", "CategoryId": "C1", "Brand": {"Name": "Glossier"}},
                    "P1": {"Name": "Lash Slick", "CategoryId": "C2", "Brand": {"Name": "Glossier"}},
                    "P2": {"Name": "Hydro Grip", "CategoryId": "C9", "Brand": {"Name": "Milk"}}
                }
            }
        }))
    }
}

fn categories_response() -> Value {
    json!({
        "TotalResults": 2,
        "HasErrors": false,
        "Errors": [],
        "Results": [
            {"Id": "C1", "Name": "Lipstick"},
            {"Id": "C2", "Name": "Mascara"}
        ]
    })
}

async fn mount_categories(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/data/categories.json"))
        .and(query_param("passkey", PASSKEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(categories_response()))
        .mount(server)
        .await;
}

async fn mount_reviews(server: &MockServer, feed: ReviewFeed) {
    Mock::given(method("GET"))
        .and(path("/data/reviews.json"))
        .and(query_param("passkey", PASSKEY))
        .and(query_param("apiversion", "5.4"))
        .and(query_param("Sort", "SubmissionTime:asc"))
        .respond_with(feed)
        .mount(server)
        .await;
}

fn config(server: &MockServer, dir: &TempDir) -> IngestConfig {
    IngestConfig {
        api_base_url: server.uri(),
        passkey: Some(PASSKEY.to_string()),
        data_dir: dir.path().to_path_buf(),
        timeout_secs: 5,
        ..IngestConfig::default()
    }
}

fn archives(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("Failed to list data directory")
        .map(|entry| entry.expect("dir entry").path())
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().starts_with("Reviews_"))
                .unwrap_or(false)
        })
        .collect();
    found.sort();
    found
}

#[tokio::test]
async fn test_full_run_archives_every_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("Failed to create temp dir");
    mount_categories(&server).await;
    mount_reviews(&server, ReviewFeed::new(250)).await;

    let ingestor = Ingestor::new(config(&server, &dir)).expect("Failed to build ingestor");
    let outcome = ingestor.run().await.expect("Run failed");

    let RunOutcome::Archived(summary) = outcome else {
        panic!("expected an archive, got {outcome:?}");
    };
    assert_eq!(summary.rows, 250);
    assert_eq!(summary.pages, 3);
    assert_eq!(
        summary.archive,
        dir.path().join("Reviews_2024_05_13_14_29.csv")
    );
    assert!(!dir.path().join("Reviews.csv").exists());

    let rows = read_rows(&summary.archive).expect("Failed to read archive");
    assert_eq!(rows.len(), 250);
    assert_eq!(rows[0].category, "Lipstick");
    assert_eq!(rows[0].brand, "Glossier");
    assert_eq!(rows[0].rating, "1 out of 5 stars.");
    assert_eq!(rows[0].skintone, "Light/Medium");
    assert_eq!(rows[0].incentivised, "No");
    // C9 is not in the category table
    assert_eq!(rows[2].category, "");
    assert_eq!(rows[249].review_title, "Review 249");

    let cursor = CursorStore::new(dir.path().join("checkpoint.json"))
        .load()
        .expect("Failed to load cursor")
        .expect("cursor saved");
    assert_eq!(cursor.position, FIRST_SUBMISSION + 60 * 249);
    assert_eq!(cursor, summary.cursor);

    let requests = server.received_requests().await.expect("request recording");
    let review_pages = requests
        .iter()
        .filter(|r| r.url.path() == "/data/reviews.json")
        .filter(|r| r.url.query_pairs().any(|(k, v)| k == "Limit" && v == "100"))
        .count();
    assert_eq!(review_pages, 3);
}

#[tokio::test]
async fn test_resume_with_nothing_new() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("Failed to create temp dir");
    mount_categories(&server).await;
    mount_reviews(&server, ReviewFeed::new(120)).await;

    let first = Ingestor::new(config(&server, &dir))
        .expect("Failed to build ingestor")
        .run()
        .await
        .expect("First run failed");
    let RunOutcome::Archived(summary) = first else {
        panic!("expected an archive, got {first:?}");
    };

    let second = Ingestor::new(config(&server, &dir))
        .expect("Failed to build ingestor")
        .run()
        .await
        .expect("Second run failed");

    assert_eq!(
        second,
        RunOutcome::NothingNew {
            resumed_from: Some(summary.cursor.clone())
        }
    );
    assert_eq!(archives(dir.path()).len(), 1);
    assert!(!dir.path().join("Reviews.csv").exists());

    let expected_filter = format!("SubmissionTime:gt:{}", summary.cursor.position);
    let requests = server.received_requests().await.expect("request recording");
    assert!(requests
        .iter()
        .any(|r| r.url.query_pairs().any(|(k, v)| k == "Filter" && v == expected_filter)));
}

#[tokio::test]
async fn test_failure_mid_run_keeps_saved_pages() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("Failed to create temp dir");
    mount_categories(&server).await;
    mount_reviews(&server, ReviewFeed::new(250).failing_at(100)).await;

    let err = Ingestor::new(config(&server, &dir))
        .expect("Failed to build ingestor")
        .run()
        .await
        .expect_err("Run should fail on the second page");

    assert!(err.is_remote(), "unexpected error: {err:?}");
    assert!(!err.to_string().contains(PASSKEY));
    let working = dir.path().join("Reviews.csv");
    assert_eq!(read_rows(&working).expect("working file").len(), 100);
    assert!(!dir.path().join("checkpoint.json").exists());
    assert!(archives(dir.path()).is_empty());

    // Next run starts from the beginning again and appends to the leftover file.
    server.reset().await;
    mount_categories(&server).await;
    mount_reviews(&server, ReviewFeed::new(250)).await;

    let outcome = Ingestor::new(config(&server, &dir))
        .expect("Failed to build ingestor")
        .run()
        .await
        .expect("Retry failed");
    let RunOutcome::Archived(summary) = outcome else {
        panic!("expected an archive, got {outcome:?}");
    };
    assert_eq!(summary.rows, 250);
    assert_eq!(read_rows(&summary.archive).expect("archive").len(), 350);
}

#[tokio::test]
async fn test_shrinking_feed_ends_on_empty_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("Failed to create temp dir");
    mount_categories(&server).await;
    mount_reviews(&server, ReviewFeed::new(100).overstating_total(50)).await;

    let outcome = Ingestor::new(config(&server, &dir))
        .expect("Failed to build ingestor")
        .run()
        .await
        .expect("Run failed");

    let RunOutcome::Archived(summary) = outcome else {
        panic!("expected an archive, got {outcome:?}");
    };
    assert_eq!(summary.rows, 100);
    assert_eq!(summary.pages, 1);
}

#[tokio::test]
async fn test_api_reported_error_aborts_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("Failed to create temp dir");
    mount_categories(&server).await;
    Mock::given(method("GET"))
        .and(path("/data/reviews.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "TotalResults": 0,
            "Results": [],
            "HasErrors": true,
            "Errors": [{"Code": "ERROR_ACCESS_DENIED", "Message": "Invalid passkey"}]
        })))
        .mount(&server)
        .await;

    let err = Ingestor::new(config(&server, &dir))
        .expect("Failed to build ingestor")
        .run()
        .await
        .expect_err("Run should fail");

    match &err {
        IngestError::Api { endpoint, messages } => {
            assert_eq!(endpoint, "data/reviews.json");
            assert!(messages.contains("ERROR_ACCESS_DENIED: Invalid passkey"));
        },
        other => panic!("expected an API error, got {other:?}"),
    }
    assert!(!dir.path().join("Reviews.csv").exists());
}

#[tokio::test]
async fn test_refused_connection_reports_underlying_cause() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);

    let config = IngestConfig {
        api_base_url: format!("http://127.0.0.1:{port}"),
        passkey: Some(PASSKEY.to_string()),
        data_dir: dir.path().to_path_buf(),
        timeout_secs: 5,
        ..IngestConfig::default()
    };
    let err = Ingestor::new(config)
        .expect("Failed to build ingestor")
        .run()
        .await
        .expect_err("Run should fail");

    assert!(matches!(err, IngestError::Http(_)), "got {err:?}");
    assert!(err.is_remote());

    let causes = err.causes();
    assert!(!causes.is_empty(), "no cause beneath: {err}");
    let detail = causes.join(": ").to_lowercase();
    assert!(detail.contains("connect"), "unexpected causes: {detail}");
    assert!(!detail.contains(PASSKEY));
    assert!(!err.to_string().contains(PASSKEY));
    assert!(!dir.path().join("Reviews.csv").exists());
}

#[tokio::test]
async fn test_missing_passkey_is_reported_before_any_request() {
    let server = MockServer::start().await;
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = IngestConfig {
        passkey: None,
        ..config(&server, &dir)
    };

    let err = match Ingestor::new(config) {
        Ok(_) => panic!("expected a configuration error"),
        Err(err) => err,
    };
    assert!(err.is_actionable());
    assert!(server
        .received_requests()
        .await
        .expect("request recording")
        .is_empty());
}
