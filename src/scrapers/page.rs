use crate::error::{CrawlError, CrawlResult};
use crate::scrapers::traits::PageSession;
use crate::scrapers::types::FetchSettings;
use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};
use url::Url;

/// Parse a CSS selector from configuration
pub fn selector(css: &str) -> CrawlResult<Selector> {
    Selector::parse(css).map_err(|e| CrawlError::InvalidConfig(format!("bad selector `{css}`: {e}")))
}

/// Snapshot of a rendered page, queried with CSS selectors
pub struct RenderedPage {
    url: String,
    document: Html,
}

impl RenderedPage {
    pub fn parse(url: &str, html: &str) -> Self {
        Self {
            url: url.to_string(),
            document: Html::parse_document(html),
        }
    }

    pub fn query_elements(&self, css: &str) -> CrawlResult<Vec<ElementRef<'_>>> {
        let selector = selector(css)?;
        Ok(self.document.select(&selector).collect())
    }

    pub fn matches(&self, selector: &Selector) -> bool {
        self.document.select(selector).next().is_some()
    }

    /// Visible text of an element, trimmed, with `&nbsp;` read as a space
    pub fn element_text(element: ElementRef<'_>) -> String {
        element.text().collect::<String>().replace('\u{a0}', " ").trim().to_string()
    }

    pub fn element_attribute<'a>(element: ElementRef<'a>, name: &str) -> Option<&'a str> {
        element.value().attr(name)
    }

    /// Whether any element matching `css` has text containing `needle`
    pub fn any_text_contains(&self, css: &str, needle: &str) -> CrawlResult<bool> {
        Ok(self
            .query_elements(css)?
            .into_iter()
            .any(|el| Self::element_text(el).contains(needle)))
    }

    /// Text of the first `sibling_tag` element following the first
    /// `label_css` element whose text contains `label_text`.
    pub fn text_after_label(
        &self,
        label_css: &str,
        label_text: &str,
        sibling_tag: &str,
    ) -> CrawlResult<Option<String>> {
        let label = self
            .query_elements(label_css)?
            .into_iter()
            .find(|el| Self::element_text(*el).contains(label_text));

        Ok(label.and_then(|label| {
            label
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|sibling| sibling.value().name() == sibling_tag)
                .map(Self::element_text)
        }))
    }

    /// Resolve an href found on this page into an absolute URL without fragment
    pub fn resolve_link(&self, href: &str) -> Option<String> {
        let base = Url::parse(&self.url).ok();
        let parsed = match base {
            Some(base) => base.join(href),
            None => Url::parse(href),
        };
        match parsed {
            Ok(mut url) => {
                url.set_fragment(None);
                Some(url.to_string())
            }
            Err(e) => {
                debug!("Skipping unparseable href {:?} on {}: {}", href, self.url, e);
                None
            }
        }
    }
}

/// Navigate to `url` and wait for it to settle, bounded by the fetch
/// timeout and retried up to `settings.attempts` times.
///
/// Returns the rendered HTML.
pub async fn load_rendered<S>(
    session: &S,
    url: &str,
    ready_css: &str,
    settings: &FetchSettings,
) -> CrawlResult<String>
where
    S: PageSession + ?Sized,
{
    let ready = selector(ready_css)?;
    let attempts = settings.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match timeout(settings.fetch_timeout, load_once(session, url, &ready, settings)).await {
            Ok(Ok(html)) => return Ok(html),
            Ok(Err(e)) => {
                warn!("Attempt {}/{} to load {} failed: {:#}", attempt, attempts, url, e);
                last_error = Some(CrawlError::Fetch {
                    url: url.to_string(),
                    attempts,
                    reason: format!("{e:#}"),
                });
            }
            Err(_) => {
                warn!(
                    "Attempt {}/{} to load {} timed out after {:?}",
                    attempt, attempts, url, settings.fetch_timeout
                );
                last_error = Some(CrawlError::Timeout {
                    url: url.to_string(),
                    timeout: settings.fetch_timeout,
                });
            }
        }

        if attempt < attempts {
            sleep(settings.retry_backoff).await;
        }
    }

    Err(last_error.unwrap_or_else(|| CrawlError::Fetch {
        url: url.to_string(),
        attempts,
        reason: "no attempt was made".to_string(),
    }))
}

async fn load_once<S>(session: &S, url: &str, ready: &Selector, settings: &FetchSettings) -> Result<String>
where
    S: PageSession + ?Sized,
{
    session.navigate(url).await?;
    wait_until_ready(session, url, ready, settings).await
}

/// Poll the page source until `ready` matches. Gives up quietly after
/// `ready_timeout` and returns whatever has rendered by then.
async fn wait_until_ready<S>(session: &S, url: &str, ready: &Selector, settings: &FetchSettings) -> Result<String>
where
    S: PageSession + ?Sized,
{
    let started = Instant::now();

    loop {
        let html = session.page_source().await?;
        let settled = RenderedPage::parse(url, &html).matches(ready);
        if settled {
            return Ok(html);
        }

        if started.elapsed() >= settings.ready_timeout {
            warn!(
                "Ready selector not found on {} within {:?}, parsing anyway",
                url, settings.ready_timeout
            );
            return Ok(html);
        }

        sleep(settings.poll_interval).await;
    }
}
