//! End-to-end crawl tests
//!
//! Each test serves a small site from a wiremock server and runs a full
//! session through the coordinator.

use crawl_engine::config::Config;
use crawl_engine::crawler::{crawl, Coordinator};
use crawl_engine::storage::{CrawlResult, MemoryStore, ResultStore, SqliteStore, StoreError, StoreResult};
use crawl_engine::{CrawlSession, SessionId, SessionStatus};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> Config {
    let mut config = Config::default();
    config.crawler.politeness_delay_ms = 0;
    config.crawler.respect_robots = false;
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 50;
    config.retry.jitter_percent = 0;
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_raw(body, "text/html; charset=utf-8")
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

fn find<'a>(results: &'a [CrawlResult], suffix: &str) -> &'a CrawlResult {
    results
        .iter()
        .find(|r| r.url.ends_with(suffix))
        .unwrap_or_else(|| panic!("no result for {}", suffix))
}

#[tokio::test]
async fn test_crawl_follows_links_one_level() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<html><head><title>Example</title>
        <meta name="description" content="An example site"></head>
        <body><p>Welcome to the example.</p><a href="/about">About</a></body></html>"#,
    )
    .await;
    mount_page(
        &server,
        "/about",
        "<html><head><title>About</title></head><body><p>About us.</p></body></html>",
    )
    .await;

    let mut config = test_config();
    config.crawler.max_depth = 1;
    let store = Arc::new(MemoryStore::new());
    let (session, results) = crawl(config, store, &server.uri()).await.unwrap();

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.visited_count, 2);
    assert_eq!(session.error_count, 0);
    assert!(session.started_at.is_some());
    assert!(session.finished_at.is_some());

    assert_eq!(results.len(), 2);
    let root = &results[0];
    assert_eq!(root.url, format!("{}/", server.uri()));
    assert_eq!(root.status_code, 200);
    assert_eq!(root.depth, 0);
    assert_eq!(root.info.title, "Example");
    assert_eq!(root.info.description, "An example site");
    assert_eq!(root.info.paragraphs, vec!["Welcome to the example.".to_string()]);
    assert_eq!(root.info.links.len(), 1);
    assert_eq!(root.info.links[0].name, "About");

    let about = find(&results, "/about");
    assert_eq!(about.depth, 1);
    assert_eq!(about.info.title, "About");
    assert!(!about.is_error);
}

#[tokio::test]
async fn test_connection_refused_is_recorded_as_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let store = Arc::new(MemoryStore::new());
    let (session, results) = crawl(test_config(), store, &format!("http://127.0.0.1:{}/", port))
        .await
        .unwrap();

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.visited_count, 1);
    assert_eq!(session.error_count, 1);
    assert_eq!(results.len(), 1);
    assert!(results[0].is_error);
    assert_eq!(results[0].status_code, 0);
    assert!(results[0].error_message.is_some());
}

#[tokio::test]
async fn test_invalid_root_creates_no_session() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = Coordinator::new(test_config(), store.clone()).unwrap();

    assert!(coordinator.start("not a url").await.is_err());
    assert!(coordinator.start("ftp://example.com/").await.is_err());
    assert!(store.list_sessions().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_links_are_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<a href="/a">one</a><a href="/a#top">two</a><a href="/a">three</a><a href="/">home</a>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<a href="/">back</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let (session, results) = crawl(test_config(), store, &server.uri()).await.unwrap();

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn test_max_pages_budget() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/p1">1</a><a href="/p2">2</a><a href="/p3">3</a><a href="/p4">4</a><a href="/p5">5</a>"#,
    )
    .await;
    for n in 1..=5 {
        mount_page(&server, &format!("/p{}", n), "<p>leaf</p>").await;
    }

    let mut config = test_config();
    config.crawler.max_pages = 3;
    let store = Arc::new(MemoryStore::new());
    let (session, results) = crawl(config, store, &server.uri()).await.unwrap();

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(results.len(), 3);
    assert_eq!(session.visited_count, 3);
}

#[tokio::test]
async fn test_max_depth_stops_link_following() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/d1">next</a>"#).await;
    mount_page(&server, "/d1", r#"<a href="/d2">next</a>"#).await;
    mount_page(&server, "/d2", r#"<a href="/d3">next</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/d3"))
        .respond_with(html("<p>too deep</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.crawler.max_depth = 2;
    let store = Arc::new(MemoryStore::new());
    let (_, results) = crawl(config, store, &server.uri()).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(find(&results, "/d2").depth, 2);
    assert!(results.iter().all(|r| r.depth <= 2));
}

#[tokio::test]
async fn test_out_of_scope_links_are_not_fetched() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="http://other.invalid/page">elsewhere</a><a href="/local">local</a>"#,
    )
    .await;
    mount_page(&server, "/local", "<p>here</p>").await;

    let store = Arc::new(MemoryStore::new());
    let (_, results) = crawl(test_config(), store, &server.uri()).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| !r.url.contains("other.invalid")));
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", "<title>Recovered</title>").await;

    let store = Arc::new(MemoryStore::new());
    let (session, results) = crawl(test_config(), store, &server.uri()).await.unwrap();

    assert_eq!(session.error_count, 0);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status_code, 200);
    assert_eq!(results[0].info.title, "Recovered");
}

#[tokio::test]
async fn test_not_found_is_recorded_once() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/missing">gone</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let (session, results) = crawl(test_config(), store, &server.uri()).await.unwrap();

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.error_count, 1);
    let missing = find(&results, "/missing");
    assert!(missing.is_error);
    assert_eq!(missing.status_code, 404);
    assert_eq!(missing.body, "not here");
}

#[tokio::test]
async fn test_robots_disallow_is_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        r#"<a href="/private/data">secret</a><a href="/public">open</a>"#,
    )
    .await;
    mount_page(&server, "/public", "<p>open</p>").await;
    Mock::given(method("GET"))
        .and(path("/private/data"))
        .respond_with(html("<p>secret</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.crawler.respect_robots = true;
    let store = Arc::new(MemoryStore::new());
    let (session, results) = crawl(config, store, &server.uri()).await.unwrap();

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(results.len(), 3);
    let private = find(&results, "/private/data");
    assert!(private.is_error);
    assert_eq!(private.status_code, 0);
    assert_eq!(private.error_message.as_deref(), Some("disallowed by robots.txt"));
    assert!(!find(&results, "/public").is_error);
}

async fn requested_urls(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| request.url.to_string())
        .collect()
}

#[tokio::test]
async fn test_stop_cancels_running_session() {
    let server = MockServer::start().await;
    let links: String = (0..20)
        .map(|n| format!(r#"<a href="/slow{}">{}</a>"#, n, n))
        .collect();
    mount_page(&server, "/", &links).await;
    Mock::given(method("GET"))
        .respond_with(html("<p>slow</p>").set_delay(Duration::from_millis(200)))
        .mount(&server)
        .await;

    let workers = 2;
    let mut config = test_config();
    config.crawler.max_concurrency = workers;
    config.crawler.max_depth = 1;
    let store = Arc::new(MemoryStore::new());
    let coordinator = Coordinator::new(config, store).unwrap();
    let id = coordinator.start(&server.uri()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    let requested_at_stop = requested_urls(&server).await.len();
    let snapshot = coordinator.stop(id).unwrap();
    assert_eq!(snapshot.status, SessionStatus::Running);

    let session = coordinator.wait(id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Cancelled);
    assert!(session.finished_at.is_some());

    // Only fetches already in flight at stop time may reach the server.
    let requested = requested_urls(&server).await;
    assert!(requested.len() <= requested_at_stop + workers as usize);
    assert!(requested.len() < 21);

    // Every request that went out has a stored result.
    let results = coordinator.results(id).unwrap();
    for url in &requested {
        assert!(
            results.iter().any(|r| &r.url == url),
            "no result for requested {}",
            url
        );
    }
    assert_eq!(results.len(), requested.len());
    assert_eq!(session.visited_count as usize, results.len());

    let again = coordinator.stop(id).unwrap();
    assert_eq!(again.status, SessionStatus::Cancelled);
}

#[tokio::test]
async fn test_absurd_crawl_delay_does_not_fail_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 1e30\n"))
        .mount(&server)
        .await;
    mount_page(&server, "/", "<title>Patient</title>").await;

    let mut config = test_config();
    config.crawler.respect_robots = true;
    let store = Arc::new(MemoryStore::new());
    let (session, results) = crawl(config, store, &server.uri()).await.unwrap();

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.failure_reason, None);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].info.title, "Patient");
}

#[tokio::test]
async fn test_retries_respect_politeness_delay() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(&server, "/", "<title>Eventually</title>").await;

    let mut config = test_config();
    config.crawler.politeness_delay_ms = 400;
    let store = Arc::new(MemoryStore::new());
    let started = std::time::Instant::now();
    let (session, results) = crawl(config, store, &server.uri()).await.unwrap();

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(results[0].status_code, 200);
    assert_eq!(requested_urls(&server).await.len(), 3);
    assert!(started.elapsed() >= Duration::from_millis(800));
}

#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/x">x</a>"#).await;
    mount_page(&server, "/x", "<p>x</p>").await;

    let store = Arc::new(MemoryStore::new());
    let coordinator = Coordinator::new(test_config(), store.clone()).unwrap();
    let first = coordinator.start(&server.uri()).await.unwrap();
    let second = coordinator.start(&server.uri()).await.unwrap();
    assert_ne!(first, second);

    let a = coordinator.wait(first).await.unwrap();
    let b = coordinator.wait(second).await.unwrap();
    assert_eq!(a.visited_count, 2);
    assert_eq!(b.visited_count, 2);
    assert_eq!(coordinator.results(first).unwrap().len(), 2);
    assert_eq!(coordinator.results(second).unwrap().len(), 2);
    assert_eq!(coordinator.sessions().unwrap().len(), 2);
}

#[tokio::test]
async fn test_sqlite_store_persists_session() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "<title>Stored</title>").await;

    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let (session, _) = crawl(test_config(), store.clone(), &server.uri())
        .await
        .unwrap();

    let stored = store.status(session.id).unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
    assert_eq!(stored.visited_count, 1);

    let results = store.get(session.id).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].info.title, "Stored");
}

/// Accepts sessions but rejects every result write
struct FailingStore {
    inner: MemoryStore,
}

impl ResultStore for FailingStore {
    fn create_session(&self, session: &CrawlSession) -> StoreResult<()> {
        self.inner.create_session(session)
    }

    fn update_session(&self, session: &CrawlSession) -> StoreResult<()> {
        self.inner.update_session(session)
    }

    fn status(&self, session_id: SessionId) -> StoreResult<CrawlSession> {
        self.inner.status(session_id)
    }

    fn list_sessions(&self) -> StoreResult<Vec<CrawlSession>> {
        self.inner.list_sessions()
    }

    fn put(&self, _session_id: SessionId, _result: CrawlResult) -> StoreResult<()> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }

    fn get(&self, session_id: SessionId) -> StoreResult<Vec<CrawlResult>> {
        self.inner.get(session_id)
    }
}

#[tokio::test]
async fn test_store_failure_fails_session() {
    let server = MockServer::start().await;
    mount_page(&server, "/", r#"<a href="/next">next</a>"#).await;
    mount_page(&server, "/next", "<p>next</p>").await;

    let store = Arc::new(FailingStore {
        inner: MemoryStore::new(),
    });
    let coordinator = Coordinator::new(test_config(), store.clone()).unwrap();
    let id = coordinator.start(&server.uri()).await.unwrap();
    let session = coordinator.wait(id).await.unwrap();

    assert_eq!(session.status, SessionStatus::Failed);
    let reason = session.failure_reason.unwrap();
    assert!(reason.contains("disk full"));
    assert_eq!(store.status(id).unwrap().status, SessionStatus::Failed);
}
