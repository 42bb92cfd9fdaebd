use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where to look on otodom and what to look for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Results page URL; `{page}` is replaced with the 1-based page index
    pub results_url_template: String,
    /// Anchors pointing at individual listings
    pub listing_link_selector: String,
    /// Attribute holding the listing URL
    pub listing_link_attribute: String,
    /// Element carrying the "no listings" text
    pub no_results_selector: String,
    pub no_results_text: String,
    /// Paragraph that labels the occupancy value
    pub occupancy_label_selector: String,
    pub occupancy_label_text: String,
    /// Tag of the sibling element holding the "A z B" text
    pub occupancy_value_tag: String,
    /// Selector whose presence means a results page has rendered
    pub results_ready_selector: String,
    /// Selector whose presence means a detail page has rendered
    pub detail_ready_selector: String,
}

impl SiteConfig {
    pub fn results_url(&self, page: u32) -> String {
        self.results_url_template.replace("{page}", &page.to_string())
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            results_url_template: "https://www.otodom.pl/pl/wyniki/sprzedaz/inwestycja/mazowieckie/warszawa/warszawa/warszawa?ownerTypeSingleSelect=ALL&viewType=listing&limit=72&page={page}".to_string(),
            listing_link_selector: "a[data-cy='listing-item-link']".to_string(),
            listing_link_attribute: "href".to_string(),
            no_results_selector: "h3".to_string(),
            no_results_text: "Nie znaleźliśmy żadnych ogłoszeń".to_string(),
            occupancy_label_selector: "p".to_string(),
            occupancy_label_text: "Dostępne lokale".to_string(),
            occupancy_value_tag: "p".to_string(),
            results_ready_selector: "a[data-cy='listing-item-link'], h3".to_string(),
            detail_ready_selector: "h1".to_string(),
        }
    }
}

/// Timing and retry policy for every page load
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Upper bound for navigate + settle of one page
    pub fetch_timeout: Duration,
    /// How long to poll for the ready selector before parsing anyway
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
    /// Total tries per page, at least one
    pub attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(60),
            ready_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            attempts: 1,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

/// Bounds accepted for `max_pages`
pub const MAX_PAGES_RANGE: std::ops::RangeInclusive<u32> = 1..=50;
