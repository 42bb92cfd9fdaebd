use crate::error::{CrawlError, CrawlResult};
use crate::scrapers::traits::PageSession;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task;
use tracing::{debug, info, warn};

/// Runs blocking calls on the blocking pool, one at a time.
///
/// The lock is taken on the blocking thread, so a call whose awaiting
/// future was dropped (e.g. by a timeout) still holds the lane until it
/// actually returns.
#[derive(Debug, Clone, Default)]
pub struct BlockingLane {
    lock: Arc<Mutex<()>>,
}

impl BlockingLane {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let lock = Arc::clone(&self.lock);
        task::spawn_blocking(move || {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            call()
        })
        .await
        .map_err(|e| anyhow!("blocking task panicked: {e}"))?
    }
}

/// Headless Chrome with a single tab, kept open for a whole run.
///
/// The browser process is terminated when the session is dropped.
pub struct ChromeSession {
    // Held so the process lives as long as the tab
    _browser: Browser,
    tab: Arc<Tab>,
    lane: BlockingLane,
}

impl ChromeSession {
    /// Launch Chrome and open the tab used for every page of the run.
    ///
    /// Every CDP call on the tab gives up after `call_timeout`.
    pub fn launch(headless: bool, call_timeout: Duration) -> CrawlResult<Self> {
        Self::try_launch(headless, call_timeout).map_err(|e| CrawlError::Launch(format!("{e:#}")))
    }

    fn try_launch(headless: bool, call_timeout: Duration) -> Result<Self> {
        info!("Launching {} Chrome...", if headless { "headless" } else { "visible" });

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .idle_browser_timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(call_timeout);

        Ok(Self {
            _browser: browser,
            tab,
            lane: BlockingLane::new(),
        })
    }

    /// Run a blocking CDP call off the async runtime, never two at once
    async fn with_tab<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        self.lane.run(move || call(&tab)).await
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let url = url.to_string();
        debug!("Navigating to {}", url);
        self.with_tab(move |tab| {
            tab.navigate_to(&url)
                .with_context(|| format!("Failed to navigate to {url}"))?;
            tab.wait_until_navigated()
                .with_context(|| format!("Navigation to {url} did not complete"))?;
            Ok(())
        })
        .await
    }

    async fn page_source(&self) -> Result<String> {
        self.with_tab(|tab| {
            let html_result = tab.evaluate("document.documentElement.outerHTML", false)?;
            html_result
                .value
                .and_then(|value| value.as_str().map(str::to_string))
                .ok_or_else(|| anyhow!("Could not get HTML from page"))
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        info!("Closing browser tab");
        let closed = self.with_tab(|tab| tab.close(true)).await?;
        if !closed {
            warn!("Browser tab refused to close; the process is killed on drop");
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "chrome"
    }
}
