use crate::error::{CrawlError, CrawlResult};
use crate::scrapers::traits::PageSession;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fetches server-rendered HTML without a browser
pub struct HttpSession {
    client: Client,
    current: Mutex<Option<String>>,
}

impl HttpSession {
    pub fn new(request_timeout: Duration) -> CrawlResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CrawlError::Launch(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            current: Mutex::new(None),
        })
    }

    fn set_current(&self, html: Option<String>) {
        let mut current = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = html;
    }
}

#[async_trait]
impl PageSession for HttpSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.set_current(None);
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        if !response.status().is_success() {
            warn!("{} returned status: {}", url, response.status());
            bail!("Failed to fetch {}: {}", url, response.status());
        }

        let html = response.text().await.context("Failed to read response body")?;
        debug!("Downloaded {} bytes of HTML", html.len());
        self.set_current(Some(html));
        Ok(())
    }

    async fn page_source(&self) -> Result<String> {
        let current = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        current.clone().context("No page has been loaded")
    }

    fn backend_name(&self) -> &'static str {
        "http"
    }
}
