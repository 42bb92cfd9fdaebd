use crate::error::{CrawlError, CrawlResult};
use crate::models::{CrawlState, ListingRecord};
use crate::observer::CrawlObserver;
use crate::scrapers::details::DetailFetcher;
use crate::scrapers::listings::LinkCollector;
use crate::scrapers::traits::PageSession;
use crate::scrapers::types::{FetchSettings, SiteConfig, MAX_PAGES_RANGE};
use crate::stop::StopSignal;
use chrono::Local;
use std::fmt;
use tracing::{error, info, warn};

/// Stages of a run, entered in order and never revisited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    CollectingLinks,
    ExtractingDetails,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::CollectingLinks => "collecting links",
            Phase::ExtractingDetails => "extracting details",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum RunStatus {
    Completed,
    /// Stopped on request at a page or listing boundary
    Cancelled,
    Failed(CrawlError),
}

/// Everything a run produced, including partial results of a failed run
#[derive(Debug)]
pub struct CrawlReport {
    /// Last phase entered
    pub phase: Phase,
    pub state: CrawlState,
    pub records: Vec<ListingRecord>,
    pub status: RunStatus,
}

impl CrawlReport {
    pub fn is_complete(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }
}

/// Drives one crawl: link collection, then one detail visit per link.
///
/// Opens the browse session itself once `max_pages` checks out, and closes
/// it on every exit path.
pub struct Pipeline {
    config: SiteConfig,
    settings: FetchSettings,
    stop: StopSignal,
    phase: Phase,
}

impl Pipeline {
    pub fn new(config: SiteConfig, settings: FetchSettings) -> Self {
        Self {
            config,
            settings,
            stop: StopSignal::new(),
            phase: Phase::Init,
        }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Run the whole crawl with a session from `open`. The session is
    /// closed before this returns.
    pub async fn run<S, F>(mut self, open: F, max_pages: u32, observer: &mut dyn CrawlObserver) -> CrawlReport
    where
        S: PageSession,
        F: FnOnce() -> CrawlResult<S>,
    {
        let mut state = CrawlState::new(max_pages);
        let mut records = Vec::new();

        let outcome = match check_max_pages(max_pages).and_then(|()| open()) {
            Ok(session) => {
                info!("Opened {} session", session.backend_name());
                let outcome = self.drive(&session, &mut state, &mut records, observer).await;
                if let Err(e) = session.close().await {
                    warn!("Failed to close {} session: {:#}", session.backend_name(), e);
                }
                outcome
            }
            Err(e) => Err(e),
        };

        let status = match outcome {
            Ok(true) => {
                observer.report_log(&format!(
                    "✅ Scraping complete! {} properties collected.",
                    records.len()
                ));
                RunStatus::Completed
            }
            Ok(false) => {
                observer.report_log(&format!(
                    "⏹ Scraping stopped. {} properties collected.",
                    records.len()
                ));
                RunStatus::Cancelled
            }
            Err(e) => {
                error!("Run failed while {}: {}", self.phase, e);
                observer.report_log(&format!(
                    "❌ Scraping failed: {}. {} properties collected before the failure.",
                    e,
                    records.len()
                ));
                RunStatus::Failed(e)
            }
        };

        CrawlReport {
            phase: self.phase,
            state,
            records,
            status,
        }
    }

    fn enter(&mut self, phase: Phase) {
        info!("Pipeline: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Returns `Ok(false)` when stopped on request
    async fn drive<S: PageSession>(
        &mut self,
        session: &S,
        state: &mut CrawlState,
        records: &mut Vec<ListingRecord>,
        observer: &mut dyn CrawlObserver,
    ) -> CrawlResult<bool> {
        self.enter(Phase::CollectingLinks);
        let collector = LinkCollector::new(session, &self.config, &self.settings);
        if !collector.collect(state, observer, &self.stop).await? {
            return Ok(false);
        }
        info!(
            "Collected {} links over {} page(s), stopped early: {}",
            state.collected_links().len(),
            state.current_page(),
            state.stopped_early()
        );

        self.enter(Phase::ExtractingDetails);
        let fetcher = DetailFetcher::new(session, &self.config, &self.settings);
        let links = state.collected_links();
        let total = links.len();

        for (index, link) in links.iter().enumerate() {
            if self.stop.is_raised() {
                info!("Stop requested after {}/{} listings", index, total);
                return Ok(false);
            }

            let reading = fetcher.extract(link).await?;
            let extraction_timestamp = Local::now().naive_local();
            records.push(ListingRecord::new(extraction_timestamp, link.clone(), reading));
            observer.listing_extracted(index + 1, total, records);
        }

        self.enter(Phase::Done);
        Ok(true)
    }
}

fn check_max_pages(max_pages: u32) -> CrawlResult<()> {
    if MAX_PAGES_RANGE.contains(&max_pages) {
        Ok(())
    } else {
        Err(CrawlError::InvalidConfig(format!(
            "max_pages must be within {}..={}, got {}",
            MAX_PAGES_RANGE.start(),
            MAX_PAGES_RANGE.end(),
            max_pages
        )))
    }
}
