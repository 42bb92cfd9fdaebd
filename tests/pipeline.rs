use anyhow::{anyhow, Result};
use async_trait::async_trait;
use otodom_scout::models::{ListingRecord, ListingLink};
use otodom_scout::observer::CrawlObserver;
use otodom_scout::scrapers::{FetchSettings, PageSession, SiteConfig};
use otodom_scout::{CrawlError, Phase, Pipeline, RunStatus, StopSignal};
use pretty_assertions::assert_eq;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BASE: &str = "https://fixture.test";

/// Serves canned HTML keyed by URL
#[derive(Default)]
struct FixtureSession {
    pages: HashMap<String, String>,
    /// URL -> number of remaining failures before it loads
    failures: Mutex<HashMap<String, usize>>,
    current: Mutex<Option<String>>,
    visited: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

impl FixtureSession {
    fn page(mut self, url: String, html: String) -> Self {
        self.pages.insert(url, html);
        self
    }

    fn failing(self, url: String, times: usize) -> Self {
        self.failures.lock().unwrap().insert(url, times);
        self
    }
}

#[async_trait]
impl PageSession for FixtureSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.visited.lock().unwrap().push(url.to_string());

        let mut failures = self.failures.lock().unwrap();
        if let Some(left) = failures.get_mut(url) {
            if *left > 0 {
                *left -= 1;
                return Err(anyhow!("connection reset"));
            }
        }

        let html = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("404 for {url}"))?;
        *self.current.lock().unwrap() = Some(html);
        Ok(())
    }

    async fn page_source(&self) -> Result<String> {
        self.current.lock().unwrap().clone().ok_or_else(|| anyhow!("nothing loaded"))
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "fixture"
    }
}

#[derive(Default)]
struct RecordingObserver {
    logs: Vec<String>,
    progress: Vec<f64>,
    snapshots: Vec<usize>,
}

impl CrawlObserver for RecordingObserver {
    fn report_progress(&mut self, fraction: f64) {
        self.progress.push(fraction);
    }

    fn report_log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn report_table_snapshot(&mut self, records: &[ListingRecord]) {
        self.snapshots.push(records.len());
    }
}

fn config() -> SiteConfig {
    SiteConfig {
        results_url_template: format!("{BASE}/wyniki?page={{page}}"),
        ..SiteConfig::default()
    }
}

fn settings() -> FetchSettings {
    FetchSettings {
        fetch_timeout: Duration::from_secs(2),
        ready_timeout: Duration::from_millis(20),
        poll_interval: Duration::from_millis(5),
        attempts: 1,
        retry_backoff: Duration::from_millis(1),
    }
}

fn results_url(page: u32) -> String {
    config().results_url(page)
}

fn listing_url(id: &str) -> String {
    format!("{BASE}/pl/oferta/{id}")
}

fn results_html(ids: &[&str]) -> String {
    let anchors: String = ids
        .iter()
        .map(|id| format!(r#"<a data-cy="listing-item-link" href="/pl/oferta/{id}">{id}</a>"#))
        .collect();
    format!("<html><body><h3>Wyniki</h3>{anchors}</body></html>")
}

fn no_results_html() -> String {
    "<html><body><h3>Nie znaleźliśmy żadnych ogłoszeń</h3></body></html>".to_string()
}

fn detail_html(occupancy: Option<&str>) -> String {
    let field = occupancy
        .map(|text| format!("<div><p>Dostępne lokale</p><p>{text}</p></div>"))
        .unwrap_or_default();
    format!("<html><body><h1>Inwestycja</h1>{field}</body></html>")
}

/// Pages 1..=n each with `per_page` fresh ids, followed by the no-results page
fn paged_site(pages: u32, per_page: usize) -> (FixtureSession, Vec<String>) {
    let mut session = FixtureSession::default();
    let mut ids = Vec::new();
    for page in 1..=pages {
        let page_ids: Vec<String> = (0..per_page).map(|i| format!("p{page}-{i}")).collect();
        let refs: Vec<&str> = page_ids.iter().map(String::as_str).collect();
        session = session.page(results_url(page), results_html(&refs));
        for id in &page_ids {
            session = session.page(listing_url(id), detail_html(Some("3 z 10")));
        }
        ids.extend(page_ids);
    }
    session = session.page(results_url(pages + 1), no_results_html());
    (session, ids)
}

#[tokio::test]
async fn stops_on_no_results_marker_and_extracts_every_link() {
    let (session, ids) = paged_site(3, 5);
    let visited = Arc::clone(&session.visited);
    let closes = Arc::clone(&session.closes);
    let mut observer = RecordingObserver::default();

    let report = Pipeline::new(config(), settings())
        .run(move || Ok(session), 10, &mut observer)
        .await;

    assert!(report.is_complete());
    assert_eq!(report.phase, Phase::Done);
    assert!(report.state.stopped_early());
    assert_eq!(report.state.current_page(), 4);
    assert_eq!(report.state.collected_links().len(), 15);
    assert_eq!(report.records.len(), 15);

    let urls: Vec<String> = report.records.iter().map(|r| r.url.to_string()).collect();
    let expected: Vec<String> = ids.iter().map(|id| listing_url(id)).collect();
    assert_eq!(urls, expected);
    assert!(report.records.iter().all(|r| r.available == Some(3) && r.total == Some(10)));

    assert!(!visited.lock().unwrap().contains(&results_url(5)));
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(observer.logs.iter().any(|l| l == "❌ No listings found on page 4. Stopping."));
    assert_eq!(observer.snapshots.last(), Some(&15));
    assert_eq!(observer.progress.last(), Some(&1.0));
}

#[tokio::test]
async fn single_page_run_ends_by_exhaustion() {
    let (session, _) = paged_site(3, 2);
    let visited = Arc::clone(&session.visited);
    let mut observer = RecordingObserver::default();

    let report = Pipeline::new(config(), settings())
        .run(move || Ok(session), 1, &mut observer)
        .await;

    assert!(report.is_complete());
    assert!(!report.state.stopped_early());
    assert_eq!(report.state.collected_links().len(), 2);

    let results_fetches = visited
        .lock()
        .unwrap()
        .iter()
        .filter(|url| url.contains("/wyniki"))
        .count();
    assert_eq!(results_fetches, 1);
}

#[tokio::test]
async fn links_repeated_across_pages_are_visited_once() {
    let session = FixtureSession::default()
        .page(results_url(1), results_html(&["a", "b", "c"]))
        .page(results_url(2), results_html(&["b", "a"]))
        .page(results_url(3), no_results_html())
        .page(listing_url("a"), detail_html(Some("1 z 2")))
        .page(listing_url("b"), detail_html(None))
        .page(listing_url("c"), detail_html(Some("5 z 5 z 5")));
    let visited = Arc::clone(&session.visited);
    let mut observer = RecordingObserver::default();

    let report = Pipeline::new(config(), settings())
        .run(move || Ok(session), 10, &mut observer)
        .await;

    assert!(report.is_complete());
    assert_eq!(report.state.collected_links().len(), 3);
    assert_eq!(report.records.len(), 3);

    let readings: Vec<(Option<u32>, Option<u32>)> =
        report.records.iter().map(|r| (r.available, r.total)).collect();
    assert_eq!(readings, vec![(Some(1), Some(2)), (None, None), (None, None)]);

    let detail_visits = visited
        .lock()
        .unwrap()
        .iter()
        .filter(|url| url.contains("/oferta/"))
        .count();
    assert_eq!(detail_visits, 3);
    assert!(observer.logs.iter().any(|l| l == "✅ Scraped 2 links from page 2"));
}

#[tokio::test]
async fn empty_page_without_marker_does_not_stop_collection() {
    let session = FixtureSession::default()
        .page(results_url(1), results_html(&[]))
        .page(results_url(2), results_html(&["x"]))
        .page(listing_url("x"), detail_html(Some("0 z 8")));

    let report = Pipeline::new(config(), settings())
        .run(move || Ok(session), 2, &mut RecordingObserver::default())
        .await;

    assert!(report.is_complete());
    assert!(!report.state.stopped_early());
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].available, Some(0));
}

#[tokio::test]
async fn collecting_twice_yields_the_same_set() {
    let mut sets: Vec<HashSet<ListingLink>> = Vec::new();
    for _ in 0..2 {
        let (session, _) = paged_site(2, 4);
        let report = Pipeline::new(config(), settings())
            .run(move || Ok(session), 5, &mut RecordingObserver::default())
            .await;
        sets.push(report.state.collected_links().as_set().clone());
    }
    assert_eq!(sets[0], sets[1]);
    assert_eq!(sets[0].len(), 8);
}

#[tokio::test]
async fn detail_fetch_failure_aborts_run_and_keeps_partial_records() {
    let session = FixtureSession::default()
        .page(results_url(1), results_html(&["a", "b", "c"]))
        .page(results_url(2), no_results_html())
        .page(listing_url("a"), detail_html(Some("1 z 2")))
        .page(listing_url("c"), detail_html(Some("1 z 2")));
    let closes = Arc::clone(&session.closes);
    let mut observer = RecordingObserver::default();

    let report = Pipeline::new(config(), settings())
        .run(move || Ok(session), 5, &mut observer)
        .await;

    assert_eq!(report.phase, Phase::ExtractingDetails);
    match &report.status {
        RunStatus::Failed(err) => {
            assert!(err.is_fetch_failure());
            assert!(err.to_string().contains("/pl/oferta/b"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(report.records.len(), 1);
    assert!(report.records.len() <= report.state.collected_links().len());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(observer.logs.last().unwrap().starts_with("❌ Scraping failed"));
}

#[tokio::test]
async fn results_page_failure_is_fatal_before_extraction() {
    let session = FixtureSession::default().page(results_url(1), results_html(&["a"]));
    let closes = Arc::clone(&session.closes);

    let report = Pipeline::new(config(), settings())
        .run(move || Ok(session), 3, &mut RecordingObserver::default())
        .await;

    assert_eq!(report.phase, Phase::CollectingLinks);
    assert!(matches!(report.status, RunStatus::Failed(CrawlError::Fetch { .. })));
    assert!(report.records.is_empty());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transient_failure_is_absorbed_by_retry() {
    let (session, _) = paged_site(1, 2);
    let session = session.failing(listing_url("p1-0"), 1);

    let retrying = FetchSettings {
        attempts: 2,
        ..settings()
    };
    let report = Pipeline::new(config(), retrying)
        .run(move || Ok(session), 3, &mut RecordingObserver::default())
        .await;

    assert!(report.is_complete());
    assert_eq!(report.records.len(), 2);
}

#[tokio::test]
async fn stop_signal_cancels_between_pages() {
    let (session, _) = paged_site(3, 2);
    let visited = Arc::clone(&session.visited);
    let closes = Arc::clone(&session.closes);
    let stop = StopSignal::new();
    stop.raise();

    let report = Pipeline::new(config(), settings())
        .with_stop_signal(stop)
        .run(move || Ok(session), 3, &mut RecordingObserver::default())
        .await;

    assert!(matches!(report.status, RunStatus::Cancelled));
    assert!(visited.lock().unwrap().is_empty());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn out_of_range_max_pages_is_rejected() {
    let (session, _) = paged_site(1, 1);
    let visited = Arc::clone(&session.visited);
    let opened = Arc::new(AtomicUsize::new(0));
    let opened_in_factory = Arc::clone(&opened);

    let report = Pipeline::new(config(), settings())
        .run(
            move || {
                opened_in_factory.fetch_add(1, Ordering::SeqCst);
                Ok(session)
            },
            0,
            &mut RecordingObserver::default(),
        )
        .await;

    assert_eq!(report.phase, Phase::Init);
    assert!(matches!(report.status, RunStatus::Failed(CrawlError::InvalidConfig(_))));
    assert_eq!(opened.load(Ordering::SeqCst), 0);
    assert!(visited.lock().unwrap().is_empty());
}

#[tokio::test]
async fn launch_failure_is_reported_as_failed_run() {
    let mut observer = RecordingObserver::default();

    let report = Pipeline::new(config(), settings())
        .run(
            || Err::<FixtureSession, _>(CrawlError::Launch("chrome binary not found".into())),
            3,
            &mut observer,
        )
        .await;

    assert_eq!(report.phase, Phase::Init);
    assert!(matches!(report.status, RunStatus::Failed(CrawlError::Launch(_))));
    assert!(report.records.is_empty());
    let last = observer.logs.last().unwrap();
    assert!(last.starts_with("❌ Scraping failed"), "{last}");
    assert!(last.contains("chrome binary not found"), "{last}");
}

/// Raises the stop signal once the table reaches `after` rows
struct StoppingObserver {
    inner: RecordingObserver,
    stop: StopSignal,
    after: usize,
}

impl CrawlObserver for StoppingObserver {
    fn report_progress(&mut self, fraction: f64) {
        self.inner.report_progress(fraction);
    }

    fn report_log(&mut self, message: &str) {
        self.inner.report_log(message);
    }

    fn report_table_snapshot(&mut self, records: &[ListingRecord]) {
        self.inner.report_table_snapshot(records);
        if records.len() >= self.after {
            self.stop.raise();
        }
    }
}

#[tokio::test]
async fn stop_during_extraction_keeps_partial_records() {
    let (session, ids) = paged_site(1, 3);
    let visited = Arc::clone(&session.visited);
    let closes = Arc::clone(&session.closes);
    let stop = StopSignal::new();
    let mut observer = StoppingObserver {
        inner: RecordingObserver::default(),
        stop: stop.clone(),
        after: 1,
    };

    let report = Pipeline::new(config(), settings())
        .with_stop_signal(stop)
        .run(move || Ok(session), 1, &mut observer)
        .await;

    assert!(matches!(report.status, RunStatus::Cancelled));
    assert_eq!(report.phase, Phase::ExtractingDetails);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].url.to_string(), listing_url(&ids[0]));
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    let details_visited = visited
        .lock()
        .unwrap()
        .iter()
        .filter(|url| url.contains("/pl/oferta/"))
        .count();
    assert_eq!(details_visited, 1);
    assert!(observer.inner.logs.last().unwrap().starts_with("⏹ Scraping stopped"));
}
