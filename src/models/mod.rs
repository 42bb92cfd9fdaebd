use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Normalized URL of one property listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListingLink(String);

impl ListingLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deduplicated links, iterated in first-discovery order
#[derive(Debug, Clone, Default)]
pub struct LinkSet {
    order: Vec<ListingLink>,
    seen: HashSet<ListingLink>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the link was not seen before.
    pub fn insert(&mut self, link: ListingLink) -> bool {
        if self.seen.contains(&link) {
            return false;
        }
        self.seen.insert(link.clone());
        self.order.push(link);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ListingLink> {
        self.order.iter()
    }

    pub fn as_set(&self) -> &HashSet<ListingLink> {
        &self.seen
    }
}

/// "Available units out of total units" shown on a listing page.
///
/// Both numbers are present or both are absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OccupancyReading {
    Present { available: u32, total: u32 },
    #[default]
    Absent,
}

impl OccupancyReading {
    pub fn available(&self) -> Option<u32> {
        match self {
            Self::Present { available, .. } => Some(*available),
            Self::Absent => None,
        }
    }

    pub fn total(&self) -> Option<u32> {
        match self {
            Self::Present { total, .. } => Some(*total),
            Self::Absent => None,
        }
    }

    pub fn as_pair(&self) -> (Option<u32>, Option<u32>) {
        (self.available(), self.total())
    }
}

/// One exported row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub extraction_timestamp: NaiveDateTime,
    pub url: ListingLink,
    pub available: Option<u32>,
    pub total: Option<u32>,
}

impl ListingRecord {
    pub fn new(extraction_timestamp: NaiveDateTime, url: ListingLink, reading: OccupancyReading) -> Self {
        let (available, total) = reading.as_pair();
        Self {
            extraction_timestamp,
            url,
            available,
            total,
        }
    }
}

/// Paging state of one link collection pass
#[derive(Debug, Clone)]
pub struct CrawlState {
    current_page: u32,
    max_pages: u32,
    collected_links: LinkSet,
    stopped_early: bool,
}

impl CrawlState {
    pub fn new(max_pages: u32) -> Self {
        Self {
            current_page: 0,
            max_pages,
            collected_links: LinkSet::new(),
            stopped_early: false,
        }
    }

    /// Folds one results page into the state and returns how many of its
    /// links were new to this run.
    pub fn record_page<I>(&mut self, page: u32, links: I) -> usize
    where
        I: IntoIterator<Item = ListingLink>,
    {
        self.current_page = page;
        links
            .into_iter()
            .filter(|link| self.collected_links.insert(link.clone()))
            .count()
    }

    pub fn stop_early(&mut self, page: u32) {
        self.current_page = page;
        self.stopped_early = true;
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn collected_links(&self) -> &LinkSet {
        &self.collected_links
    }

    pub fn stopped_early(&self) -> bool {
        self.stopped_early
    }
}
