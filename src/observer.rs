use crate::models::ListingRecord;
use tracing::{debug, info};

/// Receives progress of a crawl run.
///
/// The pipeline only talks to these three methods; how progress is shown
/// is up to the implementor.
pub trait CrawlObserver {
    /// Fraction of the current phase done, in `0.0..=1.0`
    fn report_progress(&mut self, fraction: f64);

    fn report_log(&mut self, message: &str);

    /// Full table of records extracted so far
    fn report_table_snapshot(&mut self, records: &[ListingRecord]);

    /// A results page was scanned
    fn page_scanned(&mut self, page: u32, links_on_page: usize, fraction: f64) {
        self.report_log(&format!("✅ Scraped {} links from page {}", links_on_page, page));
        self.report_progress(fraction);
    }

    /// A listing was visited and its record appended
    fn listing_extracted(&mut self, index: usize, total: usize, records: &[ListingRecord]) {
        if let Some(record) = records.last() {
            self.report_log(&format!("📌 Scraped {}/{}: {}", index, total, record.url));
        }
        self.report_progress(fraction(index, total));
        self.report_table_snapshot(records);
    }
}

pub(crate) fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        (done as f64 / total as f64).clamp(0.0, 1.0)
    }
}

/// Run-scoped observer that logs through `tracing` and keeps the log of
/// the run
#[derive(Debug, Default)]
pub struct TracingObserver {
    lines: Vec<String>,
    progress: f64,
}

impl TracingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }
}

impl CrawlObserver for TracingObserver {
    fn report_progress(&mut self, fraction: f64) {
        self.progress = fraction;
        debug!("Progress {:.0}%", fraction * 100.0);
    }

    fn report_log(&mut self, message: &str) {
        info!("{}", message);
        self.lines.push(message.to_string());
    }

    fn report_table_snapshot(&mut self, records: &[ListingRecord]) {
        if let Some(last) = records.last() {
            debug!(
                "Table now has {} rows, last: {} ({:?} z {:?})",
                records.len(),
                last.url,
                last.available,
                last.total
            );
        }
    }
}
