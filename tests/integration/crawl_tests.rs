//! Integration tests for the crawler
//!
//! Most tests drive the engine with scripted in-process fetchers so timing is
//! deterministic (tokio's paused clock). The HTTP adapter is exercised end to
//! end against a wiremock server.

use async_trait::async_trait;
use ripple_crawl::config::{CrawlerConfig, UserAgentConfig};
use ripple_crawl::crawler::{
    Coordinator, FetchError, FetchResponse, Fetcher, HtmlExtractor, HttpFetcher, StopHandle,
};
use ripple_crawl::state::{CrawlResult, CrawlState, CrawlStatus};
use ripple_crawl::storage::{open_store, CrawlStore, EntryStatus, RunStatus};
use ripple_crawl::url::HostScope;
use ripple_crawl::CrawlError;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio::time::Instant;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ===== Helpers =====

fn crawler_config(seeds: &[&str]) -> CrawlerConfig {
    CrawlerConfig {
        max_concurrency: 2,
        per_request_timeout_ms: 30_000,
        max_retries: 3,
        base_backoff_ms: 100,
        max_backoff_ms: 10_000,
        max_depth: 2,
        seeds: seeds.iter().map(|s| s.to_string()).collect(),
        ..CrawlerConfig::default()
    }
}

fn html(body: &str) -> FetchResponse {
    FetchResponse::new(200, format!("<html><body>{}</body></html>", body))
        .with_header("content-type", "text/html")
}

fn extractor() -> Arc<HtmlExtractor> {
    Arc::new(HtmlExtractor::for_class("prodbox").unwrap())
}

fn urls(results: &[CrawlResult]) -> Vec<&str> {
    results.iter().map(|r| r.url.as_str()).collect()
}

/// Serves canned responses and records every fetch
///
/// Each URL has a queue of responses; the last one repeats. Unknown URLs get
/// a 404.
#[derive(Default)]
struct ScriptedFetcher {
    pages: Mutex<HashMap<String, VecDeque<FetchResponse>>>,
    delays: HashMap<String, Duration>,
    log: Mutex<Vec<(String, Instant)>>,
    stop_on: Option<String>,
    stopper: Mutex<Option<StopHandle>>,
}

impl ScriptedFetcher {
    fn new() -> Self {
        Self::default()
    }

    fn page(self, url: &str, response: FetchResponse) -> Self {
        self.pages
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    fn delayed(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    /// Requests a crawl stop while `url` is being fetched
    fn stop_during(mut self, url: &str) -> Self {
        self.stop_on = Some(url.to_string());
        self
    }

    fn arm(&self, stopper: StopHandle) {
        *self.stopper.lock().unwrap() = Some(stopper);
    }

    fn fetches(&self) -> Vec<(String, Instant)> {
        self.log.lock().unwrap().clone()
    }

    fn fetched_urls(&self) -> Vec<String> {
        self.fetches().into_iter().map(|(url, _)| url).collect()
    }

    fn fetch_count(&self, url: &str) -> usize {
        self.fetched_urls().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<FetchResponse, FetchError> {
        self.log
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        if self.stop_on.as_deref() == Some(url.as_str()) {
            if let Some(stopper) = self.stopper.lock().unwrap().as_ref() {
                stopper.stop();
            }
        }

        if let Some(delay) = self.delays.get(url.as_str()) {
            tokio::time::sleep(*delay).await;
        }

        let response = {
            let mut pages = self.pages.lock().unwrap();
            match pages.get_mut(url.as_str()) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        Ok(response.unwrap_or_else(|| FetchResponse::new(404, "")))
    }
}

/// Holds every fetch until released
struct GatedFetcher {
    started: AtomicUsize,
    expected: usize,
    all_started: Notify,
    gate: Semaphore,
    log: Mutex<Vec<String>>,
}

impl GatedFetcher {
    fn new(expected: usize) -> Self {
        Self {
            started: AtomicUsize::new(0),
            expected,
            all_started: Notify::new(),
            gate: Semaphore::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    fn release(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<FetchResponse, FetchError> {
        self.log.lock().unwrap().push(url.to_string());
        if self.started.fetch_add(1, Ordering::SeqCst) + 1 == self.expected {
            self.all_started.notify_one();
        }

        let _permit = self.gate.acquire().await;
        Ok(html(""))
    }
}

// ===== Engine scenarios =====

#[tokio::test(start_paused = true)]
async fn test_links_follow_scope_and_depth() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(
                "http://a.test/",
                html(r#"<a href="/b">b</a> <a href="http://other.test/c">c</a>"#),
            )
            .page("http://a.test/b", html(r#"<a href="/d">too deep</a>"#)),
    );

    let mut config = crawler_config(&["http://a.test/"]);
    config.max_depth = 1;
    config.host_scope = HostScope::SameHostOnly;

    let crawl = Coordinator::new(config, fetcher.clone(), extractor())
        .unwrap()
        .start()
        .unwrap();
    let (results, report) = crawl.collect().await.unwrap();

    let mut crawled = urls(&results);
    crawled.sort();
    assert_eq!(crawled, vec!["http://a.test/", "http://a.test/b"]);

    let seed = results.iter().find(|r| r.depth == 0).unwrap();
    let seed_links: Vec<&str> = seed.discovered_links.iter().map(|u| u.as_str()).collect();
    assert_eq!(seed_links, vec!["http://a.test/b"]);

    assert_eq!(report.discovered, 2);
    assert_eq!(report.succeeded, 2);
    assert!(!report.stopped);
    assert!(!fetcher
        .fetched_urls()
        .iter()
        .any(|u| u.contains("other.test") || u.ends_with("/d")));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_links_are_fetched_once() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(
                "http://a.test/",
                html(
                    r#"<a href="/a">1</a>
                       <a href="/a#reviews">2</a>
                       <a href="/a?utm_source=news">3</a>
                       <a href="http://A.TEST:80/a">4</a>
                       <a href="/">self</a>"#,
                ),
            )
            .page("http://a.test/a", html(r#"<a href="/">home</a>"#)),
    );

    let crawl = Coordinator::new(crawler_config(&["http://a.test/"]), fetcher.clone(), extractor())
        .unwrap()
        .start()
        .unwrap();
    let (results, report) = crawl.collect().await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(report.discovered, 2);
    assert_eq!(fetcher.fetch_count("http://a.test/"), 1);
    assert_eq!(fetcher.fetch_count("http://a.test/a"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_requests_to_a_host_are_spaced() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(
                "http://a.test/",
                html(r#"<a href="/1">1</a> <a href="/2">2</a> <a href="/3">3</a>"#),
            )
            .page("http://a.test/1", html(""))
            .page("http://a.test/2", html(""))
            .page("http://a.test/3", html("")),
    );

    let mut config = crawler_config(&["http://a.test/"]);
    config.max_concurrency = 4;
    config.base_backoff_ms = 500;

    let crawl = Coordinator::new(config, fetcher.clone(), extractor())
        .unwrap()
        .start()
        .unwrap();
    let (results, _) = crawl.collect().await.unwrap();
    assert_eq!(results.len(), 4);

    let starts: Vec<Instant> = fetcher.fetches().into_iter().map(|(_, at)| at).collect();
    assert_eq!(starts.len(), 4);
    for pair in starts.windows(2) {
        assert!(
            pair[1] - pair[0] >= Duration::from_millis(500),
            "fetches only {:?} apart",
            pair[1] - pair[0]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_fetch_retries_then_succeeds() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page("http://a.test/", FetchResponse::new(429, ""))
            .page("http://a.test/", FetchResponse::new(429, ""))
            .page("http://a.test/", FetchResponse::new(429, ""))
            .page("http://a.test/", html(r#"<div class="prodbox">Tea</div>"#)),
    );

    let mut config = crawler_config(&["http://a.test/"]);
    config.max_retries = 5;
    config.base_backoff_ms = 1_000;
    config.max_backoff_ms = 60_000;

    let crawl = Coordinator::new(config, fetcher.clone(), extractor())
        .unwrap()
        .start()
        .unwrap();
    let frontier = Arc::clone(crawl.frontier());
    let (results, report) = crawl.collect().await.unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.status, CrawlStatus::Success);
    assert_eq!(result.attempts, 4);
    assert_eq!(result.status_code, Some(200));
    assert_eq!(result.extracted_records.len(), 1);
    assert_eq!(result.extracted_records[0].get("text"), Some("Tea"));
    assert_eq!(report.retries, 3);

    // Backoff doubled after each 429: 2s, 4s, 8s
    let starts: Vec<Instant> = fetcher.fetches().into_iter().map(|(_, at)| at).collect();
    assert_eq!(starts.len(), 4);
    assert!(starts[1] - starts[0] >= Duration::from_secs(2));
    assert!(starts[2] - starts[1] >= Duration::from_secs(4));
    assert!(starts[3] - starts[2] >= Duration::from_secs(8));

    let host = frontier.host_state("a.test").unwrap();
    assert_eq!(host.current_backoff, Duration::from_secs(1));
    assert_eq!(host.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhaust_once() {
    let fetcher =
        Arc::new(ScriptedFetcher::new().page("http://a.test/", FetchResponse::new(503, "")));

    let mut config = crawler_config(&["http://a.test/"]);
    config.max_retries = 2;

    let crawl = Coordinator::new(config, fetcher.clone(), extractor())
        .unwrap()
        .start()
        .unwrap();
    let (results, report) = crawl.collect().await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, CrawlStatus::Failed);
    assert_eq!(results[0].attempts, 3);
    assert_eq!(results[0].status_code, Some(503));
    assert_eq!(report.failed, 1);
    assert_eq!(report.retries, 2);
    assert_eq!(fetcher.fetch_count("http://a.test/"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_is_not_retried() {
    let fetcher = Arc::new(
        ScriptedFetcher::new().page("http://a.test/", html(r#"<a href="/missing">x</a>"#)),
    );

    let crawl = Coordinator::new(crawler_config(&["http://a.test/"]), fetcher.clone(), extractor())
        .unwrap()
        .start()
        .unwrap();
    let (results, report) = crawl.collect().await.unwrap();

    let missing = results
        .iter()
        .find(|r| r.url.as_str() == "http://a.test/missing")
        .unwrap();
    assert_eq!(missing.status, CrawlStatus::Failed);
    assert_eq!(missing.status_code, Some(404));
    assert_eq!(missing.attempts, 1);
    assert_eq!(report.retries, 0);
    assert_eq!(fetcher.fetch_count("http://a.test/missing"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_fetch_is_retried_then_fails() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page("http://a.test/", html(""))
            .delayed("http://a.test/", Duration::from_secs(60)),
    );

    let mut config = crawler_config(&["http://a.test/"]);
    config.per_request_timeout_ms = 1_000;
    config.max_retries = 2;

    let crawl = Coordinator::new(config, fetcher.clone(), extractor())
        .unwrap()
        .start()
        .unwrap();
    let (results, report) = crawl.collect().await.unwrap();

    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.status, CrawlStatus::Failed);
    assert_eq!(result.attempts, 3);
    assert_eq!(result.status_code, None);
    assert!(result.error.as_deref().unwrap_or("").contains("timeout"));
    assert_eq!(report.retries, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(fetcher.fetch_count("http://a.test/"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_redirect_is_skipped_and_target_crawled() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page(
                "http://a.test/old",
                FetchResponse::new(301, "").with_header("Location", "/new"),
            )
            .page("http://a.test/new", html(r#"<div class="prodbox">Tea</div>"#)),
    );

    // The target keeps the redirecting page's depth, so it is crawled even at depth 0
    let mut config = crawler_config(&["http://a.test/old"]);
    config.max_depth = 0;

    let crawl = Coordinator::new(config, fetcher.clone(), extractor())
        .unwrap()
        .start()
        .unwrap();
    let (results, report) = crawl.collect().await.unwrap();

    assert_eq!(results.len(), 2);
    let old = results
        .iter()
        .find(|r| r.url.as_str() == "http://a.test/old")
        .unwrap();
    assert_eq!(old.status, CrawlStatus::Skipped);
    assert_eq!(old.status_code, Some(301));
    let old_links: Vec<&str> = old.discovered_links.iter().map(|u| u.as_str()).collect();
    assert_eq!(old_links, vec!["http://a.test/new"]);

    let new = results
        .iter()
        .find(|r| r.url.as_str() == "http://a.test/new")
        .unwrap();
    assert_eq!(new.status, CrawlStatus::Success);
    assert_eq!(new.depth, 0);
    assert_eq!(new.extracted_records.len(), 1);

    assert_eq!(report.skipped, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(fetcher.fetch_count("http://a.test/old"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ordered_results_follow_discovery_order() {
    let build = || {
        Arc::new(
            ScriptedFetcher::new()
                .page(
                    "http://a.test/",
                    html(r#"<a href="http://b.test/">b</a> <a href="http://c.test/">c</a>"#),
                )
                .page("http://b.test/", html(""))
                .page("http://c.test/", html(""))
                .delayed("http://b.test/", Duration::from_secs(5)),
        )
    };

    let mut config = crawler_config(&["http://a.test/"]);
    config.host_scope = HostScope::Unrestricted;

    let crawl = Coordinator::new(config.clone(), build(), extractor())
        .unwrap()
        .start()
        .unwrap();
    let (results, _) = crawl.collect().await.unwrap();
    assert_eq!(
        urls(&results),
        vec!["http://a.test/", "http://c.test/", "http://b.test/"]
    );

    config.ordered_results = true;
    let crawl = Coordinator::new(config, build(), extractor())
        .unwrap()
        .start()
        .unwrap();
    let (results, _) = crawl.collect().await.unwrap();
    assert_eq!(
        urls(&results),
        vec!["http://a.test/", "http://b.test/", "http://c.test/"]
    );
}

#[tokio::test]
async fn test_stop_lets_in_flight_fetches_finish() {
    let fetcher = Arc::new(GatedFetcher::new(3));

    let mut config = crawler_config(&[
        "http://a.test/",
        "http://b.test/",
        "http://c.test/",
        "http://d.test/",
    ]);
    config.max_concurrency = 3;

    let mut crawl = Coordinator::new(config, fetcher.clone(), extractor())
        .unwrap()
        .start()
        .unwrap();
    let state = crawl.state_changes();
    assert_eq!(crawl.state(), CrawlState::Running);

    tokio::time::timeout(Duration::from_secs(5), fetcher.all_started.notified())
        .await
        .expect("three fetches should start");

    crawl.stop();
    fetcher.release();

    let mut results = Vec::new();
    while let Some(result) = crawl.next_result().await {
        results.push(result);
    }
    // The stream only ends once the crawl is done
    assert_eq!(*state.borrow(), CrawlState::Done);

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.status == CrawlStatus::Success));
    assert!(!urls(&results).contains(&"http://d.test/"));

    let report = crawl.wait().await.unwrap();
    assert!(report.stopped);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.unfinished, 1);

    let fetched = fetcher.log.lock().unwrap().clone();
    assert_eq!(fetched.len(), 3);
    assert!(!fetched.contains(&"http://d.test/".to_string()));
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    let fetcher = Arc::new(ScriptedFetcher::new());

    let mut config = crawler_config(&["http://a.test/"]);
    config.max_concurrency = 0;
    assert!(matches!(
        Coordinator::new(config, fetcher.clone(), extractor()),
        Err(CrawlError::Config(_))
    ));

    let config = crawler_config(&["ftp://a.test/", "not a url"]);
    let coordinator = Coordinator::new(config, fetcher, extractor()).unwrap();
    assert!(matches!(coordinator.start(), Err(CrawlError::Config(_))));
}

#[tokio::test(start_paused = true)]
async fn test_unusable_seed_is_dropped() {
    let fetcher = Arc::new(ScriptedFetcher::new().page("http://a.test/", html("")));

    let config = crawler_config(&["http://a.test/", "ftp://b.test/file"]);
    let crawl = Coordinator::new(config, fetcher.clone(), extractor())
        .unwrap()
        .start()
        .unwrap();
    let (results, report) = crawl.collect().await.unwrap();

    assert_eq!(urls(&results), vec!["http://a.test/"]);
    assert_eq!(results[0].status, CrawlStatus::Success);
    assert_eq!(report.discovered, 1);
    assert!(!fetcher.fetched_urls().iter().any(|u| u.contains("b.test")));
}

// ===== Persistence =====

#[tokio::test(start_paused = true)]
async fn test_interrupted_run_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");

    let site = || {
        ScriptedFetcher::new()
            .page(
                "http://a.test/",
                html(r#"<a href="/a">a</a> <a href="/b">b</a> <a href="/c">c</a>"#),
            )
            .page("http://a.test/a", html(r#"<div class="prodbox">Tea</div>"#))
            .page("http://a.test/b", html(""))
            .page("http://a.test/c", html(""))
    };

    let mut config = crawler_config(&["http://a.test/"]);
    config.max_concurrency = 1;

    // First run stops while /a is in flight
    let first = Arc::new(site().stop_during("http://a.test/a"));
    let crawl = Coordinator::new(config.clone(), first.clone(), extractor())
        .unwrap()
        .with_store(open_store(&db_path).unwrap(), "hash", false)
        .start()
        .unwrap();
    first.arm(crawl.stopper());
    let first_run = crawl.run_id().unwrap();

    let (results, report) = crawl.collect().await.unwrap();
    assert_eq!(urls(&results), vec!["http://a.test/", "http://a.test/a"]);
    assert!(report.stopped);
    assert_eq!(report.unfinished, 2);

    {
        let store = open_store(&db_path).unwrap();
        assert_eq!(store.get_run(first_run).unwrap().status, RunStatus::Interrupted);
        assert_eq!(store.count_by_status(first_run, EntryStatus::Queued).unwrap(), 2);
    }

    // Second run picks up the queued entries only
    let second = Arc::new(site());
    let crawl = Coordinator::new(config, second.clone(), extractor())
        .unwrap()
        .with_store(open_store(&db_path).unwrap(), "hash", false)
        .start()
        .unwrap();
    assert_eq!(crawl.run_id(), Some(first_run));

    let (results, report) = crawl.collect().await.unwrap();
    assert_eq!(urls(&results), vec!["http://a.test/b", "http://a.test/c"]);
    assert!(!report.stopped);
    assert_eq!(second.fetched_urls(), vec!["http://a.test/b", "http://a.test/c"]);

    let store = open_store(&db_path).unwrap();
    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.id, first_run);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(store.count_by_status(first_run, EntryStatus::Success).unwrap(), 4);
    assert_eq!(store.count_records(first_run).unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_run_ignores_previous_state() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");
    let config = crawler_config(&["http://a.test/"]);

    let mut previous = open_store(&db_path).unwrap();
    let previous_run = previous.create_run("hash").unwrap();
    drop(previous);

    let fetcher = Arc::new(ScriptedFetcher::new().page("http://a.test/", html("")));
    let crawl = Coordinator::new(config, fetcher.clone(), extractor())
        .unwrap()
        .with_store(open_store(&db_path).unwrap(), "hash", true)
        .start()
        .unwrap();
    let run_id = crawl.run_id().unwrap();
    assert_ne!(run_id, previous_run);

    let (results, _) = crawl.collect().await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(fetcher.fetch_count("http://a.test/"), 1);
}

// ===== HTTP adapter =====

#[tokio::test]
async fn test_full_crawl_over_http() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><body>
                    <div class="prodbox" data-sku="A1">Green   Tea</div>
                    <div class="prodbox">Coffee</div>
                    <a href="/item">Item</a>
                    <a href="/private/report">Private</a>
                    </body></html>"#,
                )
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;

    let user_agent = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    };

    let mut config = crawler_config(&[&format!("{}/", base_url)]);
    config.base_backoff_ms = 10;
    config.per_request_timeout_ms = 5_000;
    config.respect_robots = true;

    let fetcher = Arc::new(HttpFetcher::from_config(&user_agent, config.max_redirects).unwrap());
    let crawl = Coordinator::new(config, fetcher, extractor())
        .unwrap()
        .with_robots_agent("TestBot")
        .start()
        .unwrap();
    let (results, report) = crawl.collect().await.unwrap();

    assert_eq!(results.len(), 3);

    let home = results.iter().find(|r| r.depth == 0).unwrap();
    assert_eq!(home.status, CrawlStatus::Success);
    assert_eq!(home.extracted_records.len(), 2);
    assert_eq!(home.extracted_records[0].get("text"), Some("Green Tea"));
    assert_eq!(home.extracted_records[0].get("@data-sku"), Some("A1"));

    let item = results
        .iter()
        .find(|r| r.url.as_str().ends_with("/item"))
        .unwrap();
    assert_eq!(item.status, CrawlStatus::Failed);
    assert_eq!(item.status_code, Some(404));

    let private = results
        .iter()
        .find(|r| r.url.as_str().ends_with("/private/report"))
        .unwrap();
    assert_eq!(private.status, CrawlStatus::Skipped);

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.records, 2);
}

#[tokio::test]
async fn test_http_fetcher_classifies_server_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "7"))
        .mount(&mock_server)
        .await;

    let user_agent = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    };
    let fetcher = HttpFetcher::from_config(&user_agent, 0).unwrap();

    let url = Url::parse(&format!("{}/busy", mock_server.uri())).unwrap();
    let response = fetcher.fetch(&url, Duration::from_secs(5)).await.unwrap();

    assert_eq!(response.status, 503);
    assert_eq!(response.retry_after(), Some(Duration::from_secs(7)));
    assert_eq!(
        response.classify(),
        ripple_crawl::crawler::ResponseClass::Transient
    );
}
