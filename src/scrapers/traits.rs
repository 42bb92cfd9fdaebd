use anyhow::Result;
use async_trait::async_trait;

/// A browse session that can load a URL and hand back the rendered HTML.
///
/// Implemented by headless Chrome and by a plain HTTP client, so the crawl
/// never depends on how pages get rendered.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Load `url`, replacing whatever page was open
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Current HTML of the open page
    async fn page_source(&self) -> Result<String>;

    /// Release the session; called once at the end of a run
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Get the name of the backend
    fn backend_name(&self) -> &'static str;
}
