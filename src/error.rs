use std::time::Duration;
use thiserror::Error;

/// Failures that end a crawl run
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The browse session could not be created.
    #[error("failed to open browse session: {0}")]
    Launch(String),

    /// Navigation or rendering failed for a page.
    #[error("failed to load {url} after {attempts} attempt(s): {reason}")]
    Fetch {
        url: String,
        attempts: u32,
        reason: String,
    },

    #[error("loading {url} did not finish within {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("failed to export records: {0}")]
    Export(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CrawlError {
    /// Network, render and timeout failures for a single page.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Timeout { .. })
    }
}

pub type CrawlResult<T> = Result<T, CrawlError>;
