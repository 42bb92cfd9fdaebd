use crate::error::CrawlResult;
use crate::models::{CrawlState, ListingLink};
use crate::observer::{fraction, CrawlObserver};
use crate::scrapers::page::{load_rendered, RenderedPage};
use crate::scrapers::traits::PageSession;
use crate::scrapers::types::{FetchSettings, SiteConfig};
use crate::stop::StopSignal;
use tracing::{debug, info};

/// What one results page contained
#[derive(Debug, Clone, PartialEq)]
pub enum ResultsPage {
    /// The "no listings" marker is shown
    NoResults,
    /// Distinct listing links in page order
    Links(Vec<ListingLink>),
}

/// Read a rendered results page
pub fn parse_results_page(config: &SiteConfig, url: &str, html: &str) -> CrawlResult<ResultsPage> {
    let page = RenderedPage::parse(url, html);

    if page.any_text_contains(&config.no_results_selector, &config.no_results_text)? {
        return Ok(ResultsPage::NoResults);
    }

    let mut links: Vec<ListingLink> = Vec::new();
    for element in page.query_elements(&config.listing_link_selector)? {
        let Some(href) = RenderedPage::element_attribute(element, &config.listing_link_attribute) else {
            continue;
        };
        if let Some(resolved) = page.resolve_link(href) {
            let link = ListingLink::new(resolved);
            if !links.contains(&link) {
                links.push(link);
            }
        }
    }

    Ok(ResultsPage::Links(links))
}

/// Walks results pages and gathers listing links
pub struct LinkCollector<'a, S: PageSession + ?Sized> {
    session: &'a S,
    config: &'a SiteConfig,
    settings: &'a FetchSettings,
}

impl<'a, S: PageSession + ?Sized> LinkCollector<'a, S> {
    pub fn new(session: &'a S, config: &'a SiteConfig, settings: &'a FetchSettings) -> Self {
        Self {
            session,
            config,
            settings,
        }
    }

    /// Visit pages `1..=state.max_pages()` until the no-results marker shows
    /// up, folding each page's links into `state`.
    ///
    /// Returns `Ok(false)` when `stop` was raised before all pages were seen.
    pub async fn collect(
        &self,
        state: &mut CrawlState,
        observer: &mut dyn CrawlObserver,
        stop: &StopSignal,
    ) -> CrawlResult<bool> {
        let max_pages = state.max_pages();

        for page in 1..=max_pages {
            if stop.is_raised() {
                info!("Stop requested before page {}", page);
                return Ok(false);
            }

            let url = self.config.results_url(page);
            debug!("Fetching results page {}: {}", page, url);

            let html = load_rendered(self.session, &url, &self.config.results_ready_selector, self.settings).await?;

            match parse_results_page(self.config, &url, &html)? {
                ResultsPage::NoResults => {
                    state.stop_early(page);
                    observer.report_log(&format!("❌ No listings found on page {}. Stopping.", page));
                    break;
                }
                ResultsPage::Links(links) => {
                    let found = links.len();
                    let added = state.record_page(page, links);
                    debug!("Page {}: {} links, {} new", page, found, added);
                    observer.page_scanned(page, found, fraction(page as usize, max_pages as usize));
                }
            }
        }

        observer.report_log(&format!(
            "🔗 Total unique property links collected: {}",
            state.collected_links().len()
        ));
        Ok(true)
    }
}
