//! End-to-end tests for the sync cycle: bootstrap, dedup, partial-failure
//! isolation, and conditional refetch.
//!
//! Each test builds its own engine over an in-memory snapshot backend and
//! a wiremock HTTP server, so cycles run against real network plumbing
//! without touching the disk.

use std::sync::Arc;

use brook::storage::{MemoryBackend, SnapshotBackend, StoreError};
use brook::{Config, SyncEngine};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn rss_feed(title: &str, items: &[(&str, &str, &str)]) -> String {
    let mut body = format!(
        "<?xml version=\"1.0\"?>\n<rss version=\"2.0\"><channel><title>{title}</title>"
    );
    for (item_title, link, date) in items {
        body.push_str(&format!(
            "<item><title>{item_title}</title><link>{link}</link>\
             <description>Body of {item_title}</description>\
             <pubDate>{date}</pubDate></item>"
        ));
    }
    body.push_str("</channel></rss>");
    body
}

fn test_config(feeds: Vec<String>) -> Config {
    Config {
        feeds,
        batch_limit: 5,
        fetch_timeout_secs: 5,
        cycle_deadline_secs: None,
        snapshot_path: None,
    }
}

fn engine_for(feeds: Vec<String>) -> Arc<SyncEngine> {
    Arc::new(SyncEngine::new(
        test_config(feeds),
        Arc::new(MemoryBackend::new()),
    ))
}

#[tokio::test]
async fn test_bootstrap_then_first_sync_inserts_articles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(
            "Example",
            &[
                ("Old", "http://a/1", "Mon, 01 Jan 2024 00:00:00 GMT"),
                ("New", "http://a/2", "Tue, 02 Jan 2024 00:00:00 GMT"),
            ],
        )))
        .mount(&server)
        .await;

    let engine = engine_for(vec![format!("{}/rss.xml", server.uri())]);
    assert!(engine.initialize_or_load().await.unwrap());
    // Idempotent: a second call is a no-op
    assert!(engine.initialize_or_load().await.unwrap());

    let report = engine.run_sync_cycle(5).await;
    assert_eq!(report.feeds_selected, 1);
    assert_eq!(report.feeds_failed, 0);
    assert_eq!(report.inserted, 2);
    assert!(report.persist_error.is_none());

    let articles = engine.list_recent_articles(80).await;
    assert_eq!(articles.len(), 2);
    // Sorted by published descending
    assert_eq!(articles[0].link, "http://a/2");
    assert_eq!(articles[1].link, "http://a/1");

    let stats = engine.stats().await;
    assert_eq!(stats.article_count, 2);
    let meta = stats.last_sync.unwrap();
    assert_eq!(meta.article_count, 2);
    assert_eq!(meta.feed_list.len(), 1);
}

#[tokio::test]
async fn test_rerun_inserts_nothing_and_keeps_original_titles() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(
            "Example",
            &[("Original title", "http://a/1", "Mon, 01 Jan 2024 00:00:00 GMT")],
        )))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    // Same link reappears later with a revised title and body
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(
            "Example",
            &[("Revised title", "http://a/1", "Mon, 01 Jan 2024 00:00:00 GMT")],
        )))
        .mount(&server)
        .await;

    let engine = engine_for(vec![format!("{}/rss.xml", server.uri())]);
    engine.initialize_or_load().await.unwrap();

    assert_eq!(engine.run_sync_cycle(5).await.inserted, 1);
    let second = engine.run_sync_cycle(5).await;
    // Insert-only semantics: no duplicate, no update-on-conflict
    assert_eq!(second.inserted, 0);
    assert_eq!(second.feeds_failed, 0);

    let articles = engine.list_recent_articles(80).await;
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].title, "Original title");
}

#[tokio::test]
async fn test_partial_failure_isolation() {
    let mut urls = Vec::new();
    let mut servers = Vec::new();
    for i in 0..5 {
        let server = MockServer::start().await;
        if i == 2 {
            // Feed #3 fails
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(500))
                .mount(&server)
                .await;
        } else {
            let item_title = format!("Item {i}");
            let item_link = format!("http://feed{i}/item");
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(
                    &format!("Feed {i}"),
                    &[(
                        item_title.as_str(),
                        item_link.as_str(),
                        "Mon, 01 Jan 2024 00:00:00 GMT",
                    )],
                )))
                .mount(&server)
                .await;
        }
        urls.push(format!("{}/rss.xml", server.uri()));
        servers.push(server);
    }

    let engine = engine_for(urls);
    engine.initialize_or_load().await.unwrap();

    let report = engine.run_sync_cycle(5).await;
    assert_eq!(report.feeds_selected, 5);
    assert_eq!(report.feeds_failed, 1);
    assert_eq!(report.inserted, 4);
    assert_eq!(engine.list_recent_articles(80).await.len(), 4);
}

#[tokio::test]
async fn test_failing_feed_does_not_starve_others() {
    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;
    let healthy = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(
            "Healthy",
            &[("Item", "http://healthy/1", "Mon, 01 Jan 2024 00:00:00 GMT")],
        )))
        .mount(&healthy)
        .await;

    // Both feeds start never-fetched, so the broken one (listed first)
    // takes the only slot of the first batch
    let engine = engine_for(vec![
        format!("{}/rss.xml", broken.uri()),
        format!("{}/rss.xml", healthy.uri()),
    ]);
    engine.initialize_or_load().await.unwrap();

    let first = engine.run_sync_cycle(1).await;
    assert_eq!(first.feeds_selected, 1);
    assert_eq!(first.feeds_failed, 1);
    assert_eq!(first.inserted, 0);

    // The failed attempt advanced the broken feed's fetch date, so the
    // healthy feed gets the next slot instead of being starved
    let second = engine.run_sync_cycle(1).await;
    assert_eq!(second.feeds_selected, 1);
    assert_eq!(second.feeds_failed, 0);
    assert_eq!(second.inserted, 1);
    assert_eq!(engine.list_recent_articles(80).await[0].link, "http://healthy/1");
}

#[tokio::test]
async fn test_second_cycle_uses_conditional_fetch() {
    let server = MockServer::start().await;
    // Mount order matters: the validator-matching mock takes precedence
    Mock::given(method("GET"))
        .and(header("If-None-Match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss_feed(
                    "Example",
                    &[("One", "http://a/1", "Mon, 01 Jan 2024 00:00:00 GMT")],
                ))
                .insert_header("ETag", "\"v1\""),
        )
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(vec![format!("{}/rss.xml", server.uri())]);
    engine.initialize_or_load().await.unwrap();

    assert_eq!(engine.run_sync_cycle(5).await.inserted, 1);

    let second = engine.run_sync_cycle(5).await;
    assert_eq!(second.inserted, 0);
    // A 304 is not a failure; the feed's refresh still completed
    assert_eq!(second.feeds_failed, 0);
    assert_eq!(engine.list_recent_articles(80).await.len(), 1);
}

#[tokio::test]
async fn test_batch_limit_bounds_selection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed("Empty", &[])))
        .mount(&server)
        .await;

    let urls: Vec<String> = (0..4)
        .map(|i| format!("{}/feed{i}.xml", server.uri()))
        .collect();
    let engine = engine_for(urls);
    engine.initialize_or_load().await.unwrap();

    let report = engine.run_sync_cycle(2).await;
    assert_eq!(report.feeds_selected, 2);
}

#[tokio::test]
async fn test_add_feed_is_idempotent_and_fetches_immediately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(
            "Added",
            &[("Item", "http://added/1", "Mon, 01 Jan 2024 00:00:00 GMT")],
        )))
        .mount(&server)
        .await;

    let engine = engine_for(vec![]);
    engine.initialize_or_load().await.unwrap();

    let url = format!("{}/rss.xml", server.uri());
    let feed = engine.add_feed(&url).await;
    assert_eq!(feed.url, url);
    assert_eq!(engine.list_recent_articles(80).await.len(), 1);

    let again = engine.add_feed(&url).await;
    assert_eq!(again.id, feed.id);
    assert_eq!(engine.stats().await.feed_count, 1);
    assert_eq!(engine.list_recent_articles(80).await.len(), 1);
}

#[tokio::test]
async fn test_add_feed_with_failing_fetch_keeps_bare_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let engine = engine_for(vec![]);
    engine.initialize_or_load().await.unwrap();

    let url = format!("{}/rss.xml", server.uri());
    let feed = engine.add_feed(&url).await;
    assert_eq!(feed.url, url);
    assert!(feed.last_fetched.is_none());
    assert_eq!(engine.stats().await.feed_count, 1);
}

#[tokio::test]
async fn test_cycle_deadline_abandons_slow_fetches() {
    let fast = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(
            "Fast",
            &[("Quick", "http://fast/1", "Mon, 01 Jan 2024 00:00:00 GMT")],
        )))
        .mount(&fast)
        .await;

    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss_feed(
                    "Slow",
                    &[("Late", "http://slow/1", "Mon, 01 Jan 2024 00:00:00 GMT")],
                ))
                .set_delay(std::time::Duration::from_secs(30)),
        )
        .mount(&slow)
        .await;

    let mut config = test_config(vec![
        format!("{}/rss.xml", fast.uri()),
        format!("{}/rss.xml", slow.uri()),
    ]);
    config.cycle_deadline_secs = Some(1);
    let engine = Arc::new(SyncEngine::new(config, Arc::new(MemoryBackend::new())));
    engine.initialize_or_load().await.unwrap();

    let report = engine.run_sync_cycle(5).await;
    assert_eq!(report.feeds_selected, 2);
    // The abandoned fetch is discarded, never merged
    assert_eq!(report.inserted, 1);
    assert_eq!(engine.list_recent_articles(80).await[0].link, "http://fast/1");

    // The slow feed's last_fetched never advanced, so it stays first in line
    let stats = engine.stats().await;
    assert_eq!(stats.article_count, 1);
}

struct FailingBackend;

impl SnapshotBackend for FailingBackend {
    fn load(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(None)
    }
    fn save(&self, _blob: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk on fire")))
    }
}

#[tokio::test]
async fn test_persist_failure_is_reported_but_memory_state_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss_feed(
            "Example",
            &[("Item", "http://a/1", "Mon, 01 Jan 2024 00:00:00 GMT")],
        )))
        .mount(&server)
        .await;

    let engine = Arc::new(SyncEngine::new(
        test_config(vec![format!("{}/rss.xml", server.uri())]),
        Arc::new(FailingBackend),
    ));
    engine.initialize_or_load().await.unwrap();

    let report = engine.run_sync_cycle(5).await;
    assert_eq!(report.inserted, 1);
    assert!(report.persist_error.is_some());

    // Reads operate on in-memory state regardless of persistence failures
    assert_eq!(engine.list_recent_articles(80).await.len(), 1);
    assert!(engine.persist_now().await.is_err());
}
