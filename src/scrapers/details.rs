use crate::error::CrawlResult;
use crate::models::{ListingLink, OccupancyReading};
use crate::scrapers::page::{load_rendered, RenderedPage};
use crate::scrapers::traits::PageSession;
use crate::scrapers::types::{FetchSettings, SiteConfig};
use tracing::debug;

const SEPARATOR: &str = " z ";

/// Parse the "A z B" occupancy text.
///
/// Anything that is not exactly two unsigned integers around a single
/// `" z "` reads as absent.
pub fn extract_occupancy(text: &str) -> OccupancyReading {
    let parts: Vec<&str> = text.trim().split(SEPARATOR).collect();
    let [available, total] = parts.as_slice() else {
        return OccupancyReading::Absent;
    };

    match (available.trim().parse::<u32>(), total.trim().parse::<u32>()) {
        (Ok(available), Ok(total)) => OccupancyReading::Present { available, total },
        _ => OccupancyReading::Absent,
    }
}

/// Find and parse the occupancy value on a rendered detail page
pub fn parse_detail_page(config: &SiteConfig, url: &str, html: &str) -> CrawlResult<OccupancyReading> {
    let page = RenderedPage::parse(url, html);
    let text = page.text_after_label(
        &config.occupancy_label_selector,
        &config.occupancy_label_text,
        &config.occupancy_value_tag,
    )?;

    Ok(match text {
        Some(text) => {
            let reading = extract_occupancy(&text);
            if reading == OccupancyReading::Absent {
                debug!("Unrecognised occupancy text {:?} on {}", text, url);
            }
            reading
        }
        None => {
            debug!("No occupancy field on {}", url);
            OccupancyReading::Absent
        }
    })
}

/// Visits listing pages and reads their occupancy
pub struct DetailFetcher<'a, S: PageSession + ?Sized> {
    session: &'a S,
    config: &'a SiteConfig,
    settings: &'a FetchSettings,
}

impl<'a, S: PageSession + ?Sized> DetailFetcher<'a, S> {
    pub fn new(session: &'a S, config: &'a SiteConfig, settings: &'a FetchSettings) -> Self {
        Self {
            session,
            config,
            settings,
        }
    }

    pub async fn extract(&self, link: &ListingLink) -> CrawlResult<OccupancyReading> {
        let html = load_rendered(
            self.session,
            link.as_str(),
            &self.config.detail_ready_selector,
            self.settings,
        )
        .await?;
        parse_detail_page(self.config, link.as_str(), &html)
    }
}
